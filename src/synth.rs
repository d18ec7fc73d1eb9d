//! Schema-driven example synthesis.
//!
//! When a matched SOAP resource has no literal response body, the
//! synthesizer compiles the service's schema fragments (plus, where needed,
//! a generated wrapper fragment) and produces a structural sample of the
//! operation's output message. Dispatch covers both calling conventions and
//! every output-message shape: single element, single type, and composite
//! multi-part.

use std::io;
use std::path::Path;

use quick_xml::Writer;
use tracing::debug;

use crate::error::EngineError;
use crate::sample;
use crate::schema::{self, XSD_NAMESPACE};
use crate::wsdl::{
    BindingStyle, MessagePart, OutputMessage, QName, SchemaFragment, WsdlOperation, WsdlService,
};

/// Example synthesizer.
///
/// Stateless and reentrant; one shared instance serves all concurrent
/// requests. Each call compiles from scratch - repeated requests for the
/// same operation pay the compile cost again.
#[derive(Debug, Default)]
pub struct ExampleSynthesizer;

impl ExampleSynthesizer {
    /// Create a synthesizer.
    pub fn new() -> Self {
        Self
    }

    /// Synthesize an example response body for an operation.
    pub fn synthesize(
        &self,
        operation: &WsdlOperation,
        service: &WsdlService,
        base_fragments: &[SchemaFragment],
        wsdl_dir: &Path,
    ) -> Result<String, EngineError> {
        debug!(
            operation = %operation.name,
            style = ?operation.style,
            "Generating example from schema"
        );

        match operation.style {
            BindingStyle::Document => {
                self.synthesize_document(operation, base_fragments, wsdl_dir)
            }
            BindingStyle::Rpc => {
                self.synthesize_rpc(operation, service, base_fragments, wsdl_dir)
            }
        }
    }

    fn synthesize_document(
        &self,
        operation: &WsdlOperation,
        base_fragments: &[SchemaFragment],
        wsdl_dir: &Path,
    ) -> Result<String, EngineError> {
        match &operation.output {
            OutputMessage::Element(part) => self.document_element(
                &part.element_name,
                base_fragments,
                wsdl_dir,
            ),
            OutputMessage::Type(part) => self.document_type(
                &part.part_name,
                &part.type_name,
                base_fragments,
                wsdl_dir,
            ),
            OutputMessage::Composite { parts } => {
                // Each part is generated independently and the fragments are
                // concatenated; document-style multi-part responses carry no
                // enclosing root element by convention.
                let mut rendered = Vec::with_capacity(parts.len());
                for part in parts {
                    rendered.push(match part {
                        MessagePart::Element(p) => {
                            self.document_element(&p.element_name, base_fragments, wsdl_dir)?
                        }
                        MessagePart::Type(p) => self.document_type(
                            &p.part_name,
                            &p.type_name,
                            base_fragments,
                            wsdl_dir,
                        )?,
                    });
                }
                Ok(rendered.join("\n"))
            }
        }
    }

    /// Single global element: compile the fragments as-is and sample the
    /// named element.
    fn document_element(
        &self,
        element_name: &QName,
        base_fragments: &[SchemaFragment],
        wsdl_dir: &Path,
    ) -> Result<String, EngineError> {
        let type_system = schema::compile(base_fragments, None, wsdl_dir)?;
        let element = type_system
            .global_element(element_name)
            .ok_or_else(|| EngineError::ElementNotFound(element_name.clone()))?;
        sample::generate(&type_system, element)
    }

    /// Single named type: declare a one-element wrapper schema for the part
    /// and sample the generated element, located by local name.
    fn document_type(
        &self,
        part_name: &str,
        type_name: &QName,
        base_fragments: &[SchemaFragment],
        wsdl_dir: &Path,
    ) -> Result<String, EngineError> {
        let wrapper = type_wrapper_fragment(part_name, type_name)?;
        let type_system = schema::compile(base_fragments, Some(&wrapper), wsdl_dir)?;
        let element = type_system
            .global_element_by_local(part_name)
            .ok_or_else(|| EngineError::ElementNotFound(QName::local(part_name)))?;
        sample::generate(&type_system, element)
    }

    /// Rpc style: wrap the output parts in a `<operation>Response` element
    /// under the service's target namespace.
    fn synthesize_rpc(
        &self,
        operation: &WsdlOperation,
        service: &WsdlService,
        base_fragments: &[SchemaFragment],
        wsdl_dir: &Path,
    ) -> Result<String, EngineError> {
        let response_name = format!("{}Response", operation.name);
        let target_ns = service.target_namespace_or_empty();

        let children = rpc_children(&operation.output);
        let wrapper = rpc_wrapper_fragment(&response_name, target_ns, &children)?;
        let type_system = schema::compile(base_fragments, Some(&wrapper), wsdl_dir)?;

        let qualified = QName::new(target_ns, response_name);
        let element = type_system
            .global_element(&qualified)
            .ok_or_else(|| EngineError::ElementNotFound(qualified.clone()))?;
        sample::generate(&type_system, element)
    }
}

/// An ordered child of the rpc response wrapper.
enum RpcChild {
    /// Child element declared with a part name and a named type
    Named { name: String, type_name: QName },
    /// Reference to an existing global element (aliased, never redeclared,
    /// so the compiled set carries no duplicate definition)
    Ref { name: QName },
}

/// Walk the output message into the ordered part-name -> part-type mapping
/// of the rpc wrapper.
///
/// A bare element output maps the element's local name to its type directly;
/// only composite element parts get the reference treatment. The asymmetry
/// is the observed behavior of existing services and is kept as-is.
fn rpc_children(output: &OutputMessage) -> Vec<RpcChild> {
    match output {
        OutputMessage::Element(part) => vec![RpcChild::Named {
            name: part.element_name.local.clone(),
            type_name: part.element_type.clone(),
        }],
        OutputMessage::Type(part) => vec![RpcChild::Named {
            name: part.part_name.clone(),
            type_name: part.type_name.clone(),
        }],
        OutputMessage::Composite { parts } => parts
            .iter()
            .map(|part| match part {
                MessagePart::Element(p) => RpcChild::Ref {
                    name: p.element_name.clone(),
                },
                MessagePart::Type(p) => RpcChild::Named {
                    name: p.part_name.clone(),
                    type_name: p.type_name.clone(),
                },
            })
            .collect(),
    }
}

/// Wrapper schema declaring one global element for a type-referencing part.
///
/// The wrapper carries no target namespace; the element is located by local
/// name after compilation.
fn type_wrapper_fragment(part_name: &str, type_name: &QName) -> Result<SchemaFragment, EngineError> {
    let mut buf = Vec::with_capacity(256);
    write_type_wrapper(&mut buf, part_name, type_name).map_err(EngineError::XmlWrite)?;
    Ok(SchemaFragment::new(
        format!("generated-{}.xsd", part_name),
        String::from_utf8_lossy(&buf).into_owned(),
    ))
}

fn write_type_wrapper(buf: &mut Vec<u8>, part_name: &str, type_name: &QName) -> io::Result<()> {
    let mut writer = Writer::new(buf);
    writer
        .create_element("xs:schema")
        .with_attribute(("xmlns:xs", XSD_NAMESPACE))
        .write_inner_content(|w| {
            let element = w
                .create_element("xs:element")
                .with_attribute(("name", part_name));
            match type_name.namespace.as_deref().filter(|ns| !ns.is_empty()) {
                Some(ns) => {
                    element
                        .with_attribute(("type", format!("p0:{}", type_name.local).as_str()))
                        .with_attribute(("xmlns:p0", ns))
                        .write_empty()?;
                }
                None => {
                    element
                        .with_attribute(("type", type_name.local.as_str()))
                        .write_empty()?;
                }
            }
            Ok(())
        })?;
    Ok(())
}

/// Composite wrapper schema declaring the rpc response element with its
/// ordered children.
fn rpc_wrapper_fragment(
    response_name: &str,
    target_ns: &str,
    children: &[RpcChild],
) -> Result<SchemaFragment, EngineError> {
    let mut buf = Vec::with_capacity(512);
    write_rpc_wrapper(&mut buf, response_name, target_ns, children)
        .map_err(EngineError::XmlWrite)?;
    Ok(SchemaFragment::new(
        format!("generated-{}.xsd", response_name),
        String::from_utf8_lossy(&buf).into_owned(),
    ))
}

fn write_rpc_wrapper(
    buf: &mut Vec<u8>,
    response_name: &str,
    target_ns: &str,
    children: &[RpcChild],
) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    let mut schema = writer
        .create_element("xs:schema")
        .with_attribute(("xmlns:xs", XSD_NAMESPACE));
    if !target_ns.is_empty() {
        schema = schema
            .with_attribute(("targetNamespace", target_ns))
            .with_attribute(("xmlns:tns", target_ns))
            .with_attribute(("elementFormDefault", "qualified"));
    }

    schema.write_inner_content(|w| {
        w.create_element("xs:element")
            .with_attribute(("name", response_name))
            .write_inner_content(|w| {
                w.create_element("xs:complexType")
                    .write_inner_content(|w| {
                        w.create_element("xs:sequence")
                            .write_inner_content(|w| write_rpc_children(w, children))?;
                        Ok(())
                    })?;
                Ok(())
            })?;
        Ok(())
    })?;
    Ok(())
}

fn write_rpc_children<W: io::Write>(w: &mut Writer<W>, children: &[RpcChild]) -> io::Result<()> {
    for (i, child) in children.iter().enumerate() {
        let prefix = format!("p{}", i);
        match child {
            RpcChild::Named { name, type_name } => {
                let element = w
                    .create_element("xs:element")
                    .with_attribute(("name", name.as_str()));
                match type_name.namespace.as_deref().filter(|ns| !ns.is_empty()) {
                    Some(ns) => {
                        element
                            .with_attribute((
                                format!("xmlns:{}", prefix).as_str(),
                                ns,
                            ))
                            .with_attribute((
                                "type",
                                format!("{}:{}", prefix, type_name.local).as_str(),
                            ))
                            .write_empty()?;
                    }
                    None => {
                        element
                            .with_attribute(("type", type_name.local.as_str()))
                            .write_empty()?;
                    }
                }
            }
            RpcChild::Ref { name } => {
                let element = w.create_element("xs:element");
                match name.namespace.as_deref().filter(|ns| !ns.is_empty()) {
                    Some(ns) => {
                        element
                            .with_attribute((
                                format!("xmlns:{}", prefix).as_str(),
                                ns,
                            ))
                            .with_attribute((
                                "ref",
                                format!("{}:{}", prefix, name.local).as_str(),
                            ))
                            .write_empty()?;
                    }
                    None => {
                        element
                            .with_attribute(("ref", name.local.as_str()))
                            .write_empty()?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsdl::{ElementPart, TypePart};

    const USERS_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:tns="urn:users"
           targetNamespace="urn:users"
           elementFormDefault="qualified">
  <xs:element name="UserElement" type="tns:UserType"/>
  <xs:complexType name="UserType">
    <xs:sequence>
      <xs:element name="id" type="xs:int"/>
      <xs:element name="name" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    fn users_fragments() -> Vec<SchemaFragment> {
        vec![SchemaFragment::new("users.xsd", USERS_XSD)]
    }

    fn users_service() -> WsdlService {
        WsdlService {
            name: "UserService".to_string(),
            target_namespace: Some("urn:users".to_string()),
        }
    }

    fn user_element_part() -> ElementPart {
        ElementPart {
            element_name: QName::new("urn:users", "UserElement"),
            element_type: QName::new("urn:users", "UserType"),
        }
    }

    #[test]
    fn test_document_element_message() {
        let operation = WsdlOperation {
            name: "GetUser".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Element(user_element_part()),
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();

        assert!(example.contains("<UserElement"));
        assert!(example.contains("<id>3</id>"));
        assert!(example.contains("<name>string</name>"));
    }

    #[test]
    fn test_document_type_message_root_is_part_name() {
        let operation = WsdlOperation {
            name: "GetUser".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Type(TypePart {
                part_name: "result".to_string(),
                type_name: QName::new("urn:users", "UserType"),
            }),
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();

        assert!(example.starts_with("<result"));
        assert!(example.trim_end().ends_with("</result>"));
        // Children come from the type's own (qualified) namespace.
        assert!(example.contains("3</id>"));
        assert!(example.contains("string</name>"));
    }

    #[test]
    fn test_document_type_part_name_collision_uses_generated_wrapper() {
        // A base schema already declares a global element named like the
        // part; the generated wrapper must still drive the sample, so the
        // body carries the part type's structure rather than the base
        // element's.
        let colliding = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:other" targetNamespace="urn:other">
  <xs:element name="result" type="xs:string"/>
</xs:schema>"#;
        let fragments = vec![
            SchemaFragment::new("other.xsd", colliding),
            SchemaFragment::new("users.xsd", USERS_XSD),
        ];

        let operation = WsdlOperation {
            name: "GetUser".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Type(TypePart {
                part_name: "result".to_string(),
                type_name: QName::new("urn:users", "UserType"),
            }),
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &fragments, Path::new("."))
            .unwrap();

        assert!(example.starts_with("<result"));
        assert!(example.contains("3</id>"));
        assert!(example.contains("string</name>"));
        assert!(!example.starts_with("<result>string</result>"));
    }

    #[test]
    fn test_document_composite_joins_parts_with_newline() {
        let operation = WsdlOperation {
            name: "GetUserProfile".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Composite {
                parts: vec![
                    MessagePart::Element(user_element_part()),
                    MessagePart::Type(TypePart {
                        part_name: "revision".to_string(),
                        type_name: QName::new(XSD_NAMESPACE, "int"),
                    }),
                ],
            },
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();

        // Two part fragments, bare concatenation, no enclosing root.
        let (first, second) = example.split_once('\n').unwrap();
        assert!(first.starts_with("<UserElement"));
        assert!(second.contains("<revision>3</revision>"));
        assert!(!example.starts_with("<GetUserProfile"));
    }

    #[test]
    fn test_document_composite_empty_part_list_is_empty_string() {
        let operation = WsdlOperation {
            name: "Noop".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Composite { parts: vec![] },
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();
        assert_eq!(example, "");
    }

    #[test]
    fn test_rpc_wrapper_is_operation_name_response() {
        let operation = WsdlOperation {
            name: "getUser".to_string(),
            style: BindingStyle::Rpc,
            output: OutputMessage::Type(TypePart {
                part_name: "user".to_string(),
                type_name: QName::new("urn:users", "UserType"),
            }),
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();

        assert!(example.contains("<getUserResponse"));
        assert!(example.contains(r#"xmlns="urn:users""#));
        assert!(example.contains("<id>3</id>"));
    }

    #[test]
    fn test_rpc_bare_element_maps_local_name_to_type() {
        // A bare element output contributes a direct child declaration, not
        // a ref - composite element parts are the only ones aliased.
        let operation = WsdlOperation {
            name: "getUser".to_string(),
            style: BindingStyle::Rpc,
            output: OutputMessage::Element(user_element_part()),
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();

        assert!(example.contains("<getUserResponse"));
        assert!(example.contains("<UserElement"));
        assert!(example.contains("<name>string</name>"));
    }

    #[test]
    fn test_rpc_composite_element_part_is_referenced() {
        let operation = WsdlOperation {
            name: "getUserSummary".to_string(),
            style: BindingStyle::Rpc,
            output: OutputMessage::Composite {
                parts: vec![
                    MessagePart::Element(user_element_part()),
                    MessagePart::Type(TypePart {
                        part_name: "count".to_string(),
                        type_name: QName::new(XSD_NAMESPACE, "int"),
                    }),
                ],
            },
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap();

        assert!(example.contains("<getUserSummaryResponse"));
        assert!(example.contains("<UserElement"));
        assert!(example.contains("<count>3</count>"));
    }

    #[test]
    fn test_rpc_without_target_namespace_is_unqualified() {
        let operation = WsdlOperation {
            name: "ping".to_string(),
            style: BindingStyle::Rpc,
            output: OutputMessage::Type(TypePart {
                part_name: "status".to_string(),
                type_name: QName::new(XSD_NAMESPACE, "string"),
            }),
        };
        let service = WsdlService {
            name: "PlainService".to_string(),
            target_namespace: None,
        };

        let synthesizer = ExampleSynthesizer::new();
        let example = synthesizer
            .synthesize(&operation, &service, &users_fragments(), Path::new("."))
            .unwrap();

        assert!(example.contains("<pingResponse"));
        assert!(!example.contains("<pingResponse xmlns=\"urn:"));
    }

    #[test]
    fn test_missing_element_is_reported_with_qname() {
        let operation = WsdlOperation {
            name: "GetGhost".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Element(ElementPart {
                element_name: QName::new("urn:users", "GhostElement"),
                element_type: QName::new("urn:users", "UserType"),
            }),
        };

        let synthesizer = ExampleSynthesizer::new();
        let err = synthesizer
            .synthesize(&operation, &users_service(), &users_fragments(), Path::new("."))
            .unwrap_err();

        match err {
            EngineError::ElementNotFound(name) => {
                assert_eq!(name, QName::new("urn:users", "GhostElement"));
            }
            other => panic!("expected ElementNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_no_schemas_propagates() {
        let operation = WsdlOperation {
            name: "GetUser".to_string(),
            style: BindingStyle::Document,
            output: OutputMessage::Element(user_element_part()),
        };

        let synthesizer = ExampleSynthesizer::new();
        let err = synthesizer
            .synthesize(&operation, &users_service(), &[], Path::new("."))
            .unwrap_err();
        assert!(matches!(err, EngineError::NoSchemas));
    }
}
