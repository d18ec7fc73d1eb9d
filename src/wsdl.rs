//! Interface-description model.
//!
//! Types produced by an external WSDL parser (or declared directly in the
//! engine configuration) and consumed by the example synthesizer. All of
//! these are built once per loaded service description and shared read-only
//! across requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// A qualified XML name: optional namespace URI plus local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QName {
    /// Namespace URI (None or empty = unqualified)
    #[serde(default)]
    pub namespace: Option<String>,
    /// Local part of the name
    pub local: String,
}

impl QName {
    /// Create a qualified name.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        let ns = namespace.into();
        Self {
            namespace: if ns.is_empty() { None } else { Some(ns) },
            local: local.into(),
        }
    }

    /// Create an unqualified name.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Namespace URI, treating None and empty as equivalent.
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => write!(f, "{{{}}}{}", ns, self.local),
            _ => write!(f, "{}", self.local),
        }
    }
}

/// SOAP calling convention of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStyle {
    /// Body shaped directly by the schema (`document` style)
    Document,
    /// Body wrapped in an operation-named element (`rpc` style)
    Rpc,
}

impl FromStr for BindingStyle {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(BindingStyle::Document),
            "rpc" => Ok(BindingStyle::Rpc),
            other => Err(EngineError::UnsupportedStyle(other.to_string())),
        }
    }
}

/// An output message part that references a global schema element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementPart {
    /// Qualified name of the global element
    pub element_name: QName,
    /// Qualified name of the element's type
    pub element_type: QName,
}

/// An output message part that references a schema type by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypePart {
    /// Message part name (becomes the element name in responses)
    pub part_name: String,
    /// Qualified name of the schema type
    pub type_name: QName,
}

/// One part of a composite output message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    /// Part referencing a global element
    Element(ElementPart),
    /// Part referencing a named type
    Type(TypePart),
}

/// Shape of an operation's reply body.
///
/// A closed set of variants; exhaustive matching replaces the open
/// "unrecognized subclass is fatal" fallback of looser designs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputMessage {
    /// Single global element
    Element(ElementPart),
    /// Single named type under a part name
    Type(TypePart),
    /// Ordered sequence of element/type parts
    Composite {
        /// Parts in declared order
        parts: Vec<MessagePart>,
    },
}

/// One operation of a SOAP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsdlOperation {
    /// Operation name
    pub name: String,
    /// Calling convention
    pub style: BindingStyle,
    /// Reply body shape
    pub output: OutputMessage,
}

/// A SOAP service as seen by the synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsdlService {
    /// Service name
    pub name: String,
    /// Target namespace of the service, if any
    #[serde(default)]
    pub target_namespace: Option<String>,
}

impl WsdlService {
    /// Target namespace, treating absent and blank as equivalent.
    pub fn target_namespace_or_empty(&self) -> &str {
        self.target_namespace.as_deref().unwrap_or("").trim()
    }
}

/// One XML schema fragment extracted from an interface description.
#[derive(Debug, Clone)]
pub struct SchemaFragment {
    /// Identifier used in diagnostics (file name or synthetic label)
    pub system_id: String,
    /// Schema document text
    pub source: String,
}

impl SchemaFragment {
    /// Create a fragment from an id and its XML text.
    pub fn new(system_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            source: source.into(),
        }
    }
}
