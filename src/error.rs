//! Engine error taxonomy.
//!
//! All of these are fatal to the current request only; none corrupt shared
//! state and none should take the serving process down. Ambiguous matches and
//! unmatched requests are not errors and never appear here.

use std::io;

use crate::wsdl::QName;

/// Errors raised by the schema compiler, synthesizer, and transmitter.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Schema compilation produced one or more diagnostics. Every collected
    /// message is carried, newline-joined for display.
    #[error("schema compilation failed:\n{}", messages.join("\n"))]
    SchemaCompilation {
        /// All diagnostics accumulated during compilation
        messages: Vec<String>,
    },

    /// The combined schema fragment set was empty.
    #[error("no schemas found to compile")]
    NoSchemas,

    /// A global element expected after compilation was missing - indicates a
    /// mismatch between the interface description and its schemas.
    #[error("element not found in compiled schemas: {0}")]
    ElementNotFound(QName),

    /// Operation style not recognized by this engine.
    #[error("unsupported operation style: {0}")]
    UnsupportedStyle(String),

    /// Writing a generated document failed. Output goes to an in-memory
    /// buffer, so this indicates an internal fault rather than an I/O problem.
    #[error("failed to write generated XML: {0}")]
    XmlWrite(#[from] io::Error),
}

impl EngineError {
    /// Wrap schema diagnostics, preserving every message.
    pub fn compilation(messages: Vec<String>) -> Self {
        EngineError::SchemaCompilation { messages }
    }
}
