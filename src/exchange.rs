//! Request facts and the transport exchange boundary.
//!
//! The transport layer (out of scope here) hands the engine a read-only view
//! of the inbound request plus an exchange it can terminate with a body.

use std::collections::HashMap;

/// Read-only view of an inbound request.
///
/// Built once by the transport layer; the matcher never mutates it.
#[derive(Debug, Clone, Default)]
pub struct RequestFacts {
    /// HTTP method, as received
    pub method: String,
    /// Concrete request path
    pub path: String,
    /// Matched route template, when the router had one (absent under regex
    /// routes, for example)
    pub route_template: Option<String>,
    /// Path parameters extracted by the router
    pub path_params: HashMap<String, String>,
    /// Query parameters
    pub query_params: HashMap<String, String>,
    /// Request headers; keys are not guaranteed normalized
    pub headers: HashMap<String, String>,
    /// Request body, when one was read
    pub body: Option<String>,
}

/// How the inbound body was parsed, which determines response wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBodyHolder {
    /// Body arrived inside a SOAP envelope; replies reuse the same protocol
    /// namespace so the response speaks the same SOAP version.
    SoapEnvelope {
        /// Envelope namespace detected on the inbound request
        envelope_namespace: String,
    },
    /// Plain, unenveloped body
    Raw,
}

/// Transport exchange the transmitter writes to.
///
/// `end` terminates the exchange; the status code is set by the caller
/// before transmission.
pub trait Exchange {
    /// Status code already set on the response.
    fn status_code(&self) -> u16;

    /// Terminate the exchange with the given body (empty when `None`).
    fn end(&mut self, body: Option<String>);

    /// Short human-readable description of the request, used as a log key.
    fn description(&self) -> String;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Exchange double that records what was transmitted.
    #[derive(Debug, Default)]
    pub struct RecordingExchange {
        pub status: u16,
        pub body: Option<String>,
        pub ended: bool,
    }

    impl RecordingExchange {
        pub fn with_status(status: u16) -> Self {
            Self {
                status,
                body: None,
                ended: false,
            }
        }
    }

    impl Exchange for RecordingExchange {
        fn status_code(&self) -> u16 {
            self.status
        }

        fn end(&mut self, body: Option<String>) {
            self.body = body;
            self.ended = true;
        }

        fn description(&self) -> String {
            "test exchange".to_string()
        }
    }
}
