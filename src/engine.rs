//! Engine orchestration.
//!
//! Ties the matcher, synthesizer, and transmitter together the way a hosting
//! transport layer drives them: resolve the request to a resource, serve the
//! literal body when one is configured, otherwise synthesize a SOAP example
//! from the service schemas and transmit it.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::{resolve_resource_configs, EngineConfig, ResolvedResourceConfig, ResourceConfig};
use crate::error::EngineError;
use crate::exchange::{Exchange, MessageBodyHolder, RequestFacts};
use crate::matcher::ResourceMatcher;
use crate::synth::ExampleSynthesizer;
use crate::transmit::ResponseTransmitter;

/// The virtualization engine.
///
/// Holds the immutable configuration and the stateless matcher, synthesizer,
/// and transmitter services. One shared instance serves any number of
/// concurrent requests; nothing here carries per-call mutable state.
pub struct MockEngine {
    config: EngineConfig,
    candidates: Vec<ResolvedResourceConfig>,
    matcher: ResourceMatcher,
    synthesizer: ExampleSynthesizer,
    transmitter: ResponseTransmitter,
}

impl MockEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let candidates = resolve_resource_configs(&config.resources);

        info!(
            resources = config.resources.len(),
            services = config.services.len(),
            "Virtualization engine initialized"
        );

        Self {
            config,
            candidates,
            matcher: ResourceMatcher::new(),
            synthesizer: ExampleSynthesizer::new(),
            transmitter: ResponseTransmitter::new(),
        }
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        Ok(Self::new(config))
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve the request to a resource configuration, if any matches.
    pub fn select<'a>(&'a self, request: &RequestFacts) -> Option<&'a ResourceConfig> {
        let selected = self.matcher.select(&self.candidates, request);
        match &selected {
            Some(resource) if self.config.settings.log_matches => {
                info!(
                    method = %request.method,
                    path = %request.path,
                    resource = %resource.path,
                    "Request matched resource"
                );
            }
            None if self.config.settings.log_unmatched => {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    "No matching resource configuration"
                );
            }
            _ => {}
        }
        selected
    }

    /// Serve a SOAP request end to end.
    ///
    /// `service_name`/`operation_name` identify the operation the transport
    /// layer routed the request to. Unmatched requests and unknown operations
    /// fall through to an empty-body response; fatal synthesis errors are
    /// returned for the caller to map to a protocol-level error.
    pub fn serve_soap(
        &self,
        request: &RequestFacts,
        service_name: &str,
        operation_name: &str,
        body_holder: &MessageBodyHolder,
        exchange: &mut dyn Exchange,
    ) -> Result<(), EngineError> {
        let Some(resource) = self.select(request) else {
            self.transmitter.transmit(exchange, None, body_holder);
            return Ok(());
        };

        // A literal body always wins over synthesis.
        if let Some(body) = &resource.response.body {
            self.transmitter.transmit(exchange, Some(body), body_holder);
            return Ok(());
        }

        let example = self.synthesize_example(service_name, operation_name)?;
        self.transmitter
            .transmit(exchange, example.as_deref(), body_holder);
        Ok(())
    }

    /// Synthesize an example body for an operation, or `None` when the
    /// service/operation is not configured.
    pub fn synthesize_example(
        &self,
        service_name: &str,
        operation_name: &str,
    ) -> Result<Option<String>, EngineError> {
        let Some(service) = self.config.service(service_name) else {
            return Ok(None);
        };
        let Some(operation) = service.operation(operation_name) else {
            return Ok(None);
        };

        let fragments = match service.load_schema_fragments() {
            Ok(fragments) => fragments,
            Err(e) => {
                return Err(EngineError::compilation(vec![e.to_string()]));
            }
        };

        let example = self.synthesizer.synthesize(
            operation,
            &service.service_model(),
            &fragments,
            service.resolver_base_dir(),
        )?;
        Ok(Some(example))
    }

    /// Build the response headers for a matched resource, falling back to
    /// the configured default content type.
    pub fn response_headers(&self, resource: &ResourceConfig) -> HashMap<String, String> {
        let mut headers = resource.response.headers.clone();
        let has_content_type = headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            headers.insert(
                "Content-Type".to_string(),
                self.config.settings.default_content_type.clone(),
            );
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::test_support::RecordingExchange;
    use std::io::Write;

    fn engine_with_service(schema_dir: &std::path::Path) -> MockEngine {
        let yaml = format!(
            r#"
resources:
  - path: /soap/users
    method: POST

  - path: /users
    method: GET
    response:
      status: 200
      body: '{{"users": []}}'

services:
  - name: UserService
    target_namespace: urn:users
    schema_dir: {dir}
    schemas: [users.xsd]
    operations:
      - name: GetUser
        style: document
        output:
          kind: element
          element_name:
            namespace: urn:users
            local: UserElement
          element_type:
            namespace: urn:users
            local: UserType
"#,
            dir = schema_dir.display()
        );
        MockEngine::from_yaml(&yaml).unwrap()
    }

    fn write_users_schema(dir: &std::path::Path) {
        let mut file = std::fs::File::create(dir.join("users.xsd")).unwrap();
        write!(
            file,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
       xmlns:tns="urn:users" targetNamespace="urn:users"
       elementFormDefault="qualified">
  <xs:element name="UserElement" type="tns:UserType"/>
  <xs:complexType name="UserType">
    <xs:sequence>
      <xs:element name="id" type="xs:int"/>
      <xs:element name="name" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#
        )
        .unwrap();
    }

    fn soap_request(path: &str) -> RequestFacts {
        RequestFacts {
            method: "POST".to_string(),
            path: path.to_string(),
            ..RequestFacts::default()
        }
    }

    #[test]
    fn test_literal_body_wins_over_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        write_users_schema(dir.path());
        let engine = engine_with_service(dir.path());

        let request = RequestFacts {
            method: "GET".to_string(),
            path: "/users".to_string(),
            ..RequestFacts::default()
        };
        let mut exchange = RecordingExchange::with_status(200);
        engine
            .serve_soap(&request, "UserService", "GetUser", &MessageBodyHolder::Raw, &mut exchange)
            .unwrap();

        assert_eq!(exchange.body.as_deref(), Some(r#"{"users": []}"#));
    }

    #[test]
    fn test_synthesized_soap_response_is_enveloped() {
        let dir = tempfile::tempdir().unwrap();
        write_users_schema(dir.path());
        let engine = engine_with_service(dir.path());

        let holder = MessageBodyHolder::SoapEnvelope {
            envelope_namespace: "http://schemas.xmlsoap.org/soap/envelope/".to_string(),
        };
        let mut exchange = RecordingExchange::with_status(200);
        engine
            .serve_soap(&soap_request("/soap/users"), "UserService", "GetUser", &holder, &mut exchange)
            .unwrap();

        let body = exchange.body.unwrap();
        assert!(body.contains("env:Envelope"));
        assert!(body.contains("<UserElement"));
        assert!(body.contains("3</id>"));
    }

    #[test]
    fn test_unmatched_request_ends_with_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        write_users_schema(dir.path());
        let engine = engine_with_service(dir.path());

        let mut exchange = RecordingExchange::with_status(404);
        engine
            .serve_soap(&soap_request("/nowhere"), "UserService", "GetUser", &MessageBodyHolder::Raw, &mut exchange)
            .unwrap();

        assert!(exchange.ended);
        assert_eq!(exchange.body, None);
    }

    #[test]
    fn test_unknown_operation_transmits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_users_schema(dir.path());
        let engine = engine_with_service(dir.path());

        let mut exchange = RecordingExchange::with_status(200);
        engine
            .serve_soap(&soap_request("/soap/users"), "UserService", "NoSuchOp", &MessageBodyHolder::Raw, &mut exchange)
            .unwrap();

        assert!(exchange.ended);
        assert_eq!(exchange.body, None);
    }

    #[test]
    fn test_response_headers_default_content_type() {
        let dir = tempfile::tempdir().unwrap();
        write_users_schema(dir.path());
        let engine = engine_with_service(dir.path());

        let headers = engine.response_headers(&engine.config().resources[1]);
        assert_eq!(
            headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }
}
