//! API Virtualization Engine
//!
//! Serves mock responses for a declaratively described API. Given the
//! resource definitions of a service (paths, methods, parameter and body
//! constraints) and, for SOAP services, the operations and XML schemas of
//! its interface description, the engine decides which configured resource
//! applies to an inbound request and, when no literal example response is
//! supplied, synthesizes a structurally valid body straight from the schema.
//!
//! # Features
//!
//! - **Resource Matching**: resolve a request to the most specific matching
//!   configuration by path, method, parameters, headers, and body
//! - **Specificity Narrowing**: candidates that explicitly constrain a
//!   dimension displace those that do not
//! - **Schema Compilation**: compile XSD fragments (with imports/includes)
//!   into a queryable type system, accumulating every diagnostic
//! - **Example Synthesis**: generate sample response bodies for document and
//!   rpc operations across element, type, and composite message shapes
//! - **Envelope-Aware Transmission**: reply in the SOAP version the request
//!   arrived in, or raw when the request was unenveloped
//!
//! # Example Configuration
//!
//! ```yaml
//! resources:
//!   - path: /soap/pets
//!     method: POST
//!
//! services:
//!   - name: PetService
//!     target_namespace: urn:pets
//!     schema_dir: ./schemas
//!     schemas: [pets.xsd]
//!     operations:
//!       - name: getPet
//!         style: document
//!         output:
//!           kind: element
//!           element_name: {namespace: "urn:pets", local: getPetResponse}
//!           element_type: {namespace: "urn:pets", local: petType}
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod matcher;
pub mod sample;
pub mod schema;
pub mod synth;
pub mod transmit;
pub mod wsdl;

pub use config::{EngineConfig, ResolvedResourceConfig, ResourceConfig};
pub use engine::MockEngine;
pub use error::EngineError;
pub use exchange::{Exchange, MessageBodyHolder, RequestFacts};
pub use matcher::ResourceMatcher;
pub use synth::ExampleSynthesizer;
pub use transmit::ResponseTransmitter;
