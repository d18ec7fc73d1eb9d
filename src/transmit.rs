//! Response transmission.
//!
//! Wraps a synthesized body in the correct envelope (or not) and writes it
//! to the exchange. The exchange is always terminated, whatever the outcome.

use tracing::{debug, trace, warn, Level};

use crate::exchange::{Exchange, MessageBodyHolder};

/// Response transmitter.
///
/// Stateless; a single shared instance serves all concurrent requests.
#[derive(Debug, Default)]
pub struct ResponseTransmitter;

impl ResponseTransmitter {
    /// Create a transmitter.
    pub fn new() -> Self {
        Self
    }

    /// Write the example (wrapped as the inbound body dictates) and end the
    /// exchange.
    ///
    /// An absent example is not an error: the exchange ends with an empty
    /// body and a warning.
    pub fn transmit(
        &self,
        exchange: &mut dyn Exchange,
        example: Option<&str>,
        body_holder: &MessageBodyHolder,
    ) {
        let Some(example) = example else {
            warn!(
                request = %exchange.description(),
                "No example to transmit; responding with an empty body"
            );
            exchange.end(None);
            return;
        };

        let body = match body_holder {
            MessageBodyHolder::SoapEnvelope { envelope_namespace } => {
                // Reply in the same SOAP version the request arrived in.
                wrap_in_envelope(example, envelope_namespace)
            }
            MessageBodyHolder::Raw => example.to_string(),
        };

        if tracing::enabled!(Level::TRACE) {
            trace!(
                request = %exchange.description(),
                status = exchange.status_code(),
                body = %body,
                "Transmitting response"
            );
        } else {
            debug!(
                request = %exchange.description(),
                status = exchange.status_code(),
                bytes = body.len(),
                "Transmitting response"
            );
        }

        exchange.end(Some(body));
    }
}

/// Wrap a body in a SOAP envelope under the given protocol namespace.
fn wrap_in_envelope(body: &str, envelope_namespace: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="{ns}">
<env:Header/>
<env:Body>
{body}
</env:Body>
</env:Envelope>"#,
        ns = envelope_namespace,
        body = body,
    )
}
