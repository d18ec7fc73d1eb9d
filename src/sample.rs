//! Structural sample generation.
//!
//! Produces an XML instance document satisfying a compiled element's
//! structural constraints: every child present at least its minimum
//! occurrence count (optional children appear once), choice groups take
//! their first branch, required attributes populated, leaves filled with a
//! placeholder value appropriate to the schema type. The output is
//! schema-valid, not semantically meaningful.

use std::io;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::EngineError;
use crate::schema::{
    AttributeDecl, ComplexType, ElementDecl, GroupKind, Particle, SimpleTypeDef, TypeRef,
    TypeSystem, XSD_NAMESPACE,
};
use crate::wsdl::QName;

/// Recursion cap for self-referential types.
const MAX_DEPTH: usize = 16;

/// Generate a structural sample document for a compiled global element.
pub fn generate(type_system: &TypeSystem, element: &ElementDecl) -> Result<String, EngineError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);

    let generator = SampleGenerator { type_system };
    generator
        .write_element(
            &mut writer,
            &element.name.local,
            element.name.namespace.as_deref(),
            None,
            &element.type_ref,
            0,
        )
        .map_err(EngineError::XmlWrite)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

struct SampleGenerator<'a> {
    type_system: &'a TypeSystem,
}

impl SampleGenerator<'_> {
    fn write_element<W: io::Write>(
        &self,
        writer: &mut Writer<W>,
        name: &str,
        namespace: Option<&str>,
        inherited_ns: Option<&str>,
        type_ref: &TypeRef,
        depth: usize,
    ) -> io::Result<()> {
        let mut start = BytesStart::new(name);

        // Declare the element's namespace as the default when it differs
        // from the namespace already in scope.
        let effective_ns = namespace.filter(|ns| !ns.is_empty());
        if effective_ns != inherited_ns.filter(|ns| !ns.is_empty()) {
            start.push_attribute(("xmlns", effective_ns.unwrap_or("")));
        }

        if depth >= MAX_DEPTH {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        match self.resolve(type_ref) {
            ResolvedType::Complex(complex) => {
                for attr in &complex.attributes {
                    if attr.required {
                        let value = self.attribute_value(attr);
                        start.push_attribute((attr.name.as_str(), value.as_str()));
                    }
                }

                if let Some(base) = &complex.simple_content_base {
                    writer.write_event(Event::Start(start))?;
                    writer.write_event(Event::Text(BytesText::new(&self.named_leaf_value(base))))?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                } else if let Some(particle) = &complex.particle {
                    writer.write_event(Event::Start(start))?;
                    self.write_particle(writer, particle, effective_ns, depth + 1)?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                } else {
                    writer.write_event(Event::Empty(start))?;
                }
            }
            ResolvedType::Leaf(value) => {
                writer.write_event(Event::Start(start))?;
                writer.write_event(Event::Text(BytesText::new(&value)))?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            ResolvedType::Empty => {
                writer.write_event(Event::Empty(start))?;
            }
        }

        Ok(())
    }

    fn write_particle<W: io::Write>(
        &self,
        writer: &mut Writer<W>,
        particle: &Particle,
        scope_ns: Option<&str>,
        depth: usize,
    ) -> io::Result<()> {
        match particle {
            Particle::Group { kind, items } => match kind {
                GroupKind::Sequence | GroupKind::All => {
                    for item in items {
                        self.write_particle(writer, item, scope_ns, depth)?;
                    }
                    Ok(())
                }
                // A choice is satisfied by any single alternative; take the
                // first declared one.
                GroupKind::Choice => match items.first() {
                    Some(first) => self.write_particle(writer, first, scope_ns, depth),
                    None => Ok(()),
                },
            },
            Particle::Element(local) => {
                for _ in 0..occurrences(local.min_occurs) {
                    self.write_element(
                        writer,
                        &local.name,
                        local.namespace.as_deref(),
                        scope_ns,
                        &local.type_ref,
                        depth,
                    )?;
                }
                Ok(())
            }
            Particle::Ref { name, min_occurs } => {
                let Some(target) = self.type_system.global_element(name) else {
                    // Unresolved refs were already reported as compile
                    // diagnostics; nothing to emit here.
                    return Ok(());
                };
                for _ in 0..occurrences(*min_occurs) {
                    self.write_element(
                        writer,
                        &target.name.local,
                        target.name.namespace.as_deref(),
                        scope_ns,
                        &target.type_ref,
                        depth,
                    )?;
                }
                Ok(())
            }
        }
    }

    fn resolve<'a>(&'a self, type_ref: &'a TypeRef) -> ResolvedType<'a> {
        match type_ref {
            TypeRef::Named(name) => {
                if let Some(complex) = self.type_system.complex_type(name) {
                    ResolvedType::Complex(complex)
                } else {
                    ResolvedType::Leaf(self.named_leaf_value(name))
                }
            }
            TypeRef::Inline(complex) => ResolvedType::Complex(complex),
            TypeRef::InlineSimple(simple) => ResolvedType::Leaf(self.simple_leaf_value(simple)),
            TypeRef::Any => ResolvedType::Empty,
        }
    }

    /// Placeholder text for a named leaf type (a built-in or a compiled
    /// simple type).
    fn named_leaf_value(&self, name: &QName) -> String {
        if let Some(simple) = self.type_system.simple_type(name) {
            return self.simple_leaf_value(simple);
        }
        builtin_placeholder(&name.local).to_string()
    }

    fn simple_leaf_value(&self, simple: &SimpleTypeDef) -> String {
        // An enumeration's first value is always a valid literal.
        if let Some(first) = simple.enumeration.first() {
            return first.clone();
        }
        match &simple.base {
            Some(base) => self.named_leaf_value(base),
            None => builtin_placeholder("string").to_string(),
        }
    }

    fn attribute_value(&self, attr: &AttributeDecl) -> String {
        match &attr.type_name {
            Some(name) if name.namespace_or_empty() != XSD_NAMESPACE => {
                self.named_leaf_value(name)
            }
            Some(name) => builtin_placeholder(&name.local).to_string(),
            None => builtin_placeholder("string").to_string(),
        }
    }
}

enum ResolvedType<'a> {
    Complex(&'a ComplexType),
    Leaf(String),
    Empty,
}

/// Required children appear `minOccurs` times; optional ones appear once so
/// the sample stays representative.
fn occurrences(min_occurs: u32) -> u32 {
    min_occurs.max(1)
}

/// A valid literal for an XSD built-in type.
fn builtin_placeholder(local: &str) -> &'static str {
    match local {
        "int" | "integer" | "long" | "short" | "byte" | "unsignedInt" | "unsignedLong"
        | "unsignedShort" | "unsignedByte" | "nonNegativeInteger" | "positiveInteger"
        | "nonPositiveInteger" | "negativeInteger" => "3",
        "decimal" | "float" | "double" => "1.5",
        "boolean" => "true",
        "date" => sample_date(),
        "dateTime" => sample_date_time(),
        "time" => sample_time(),
        "anyURI" => "http://www.example.com/",
        "base64Binary" => "c3RyaW5n",
        "hexBinary" => "737472696E67",
        "duration" => "P1D",
        "gYear" => "2008",
        "gYearMonth" => "2008-09",
        _ => "string",
    }
}

// The placeholder calendar values are fixed so samples are deterministic;
// chrono keeps the literals well-formed.

fn sample_date() -> &'static str {
    static DATE: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    DATE.get_or_init(|| {
        NaiveDate::from_ymd_opt(2008, 9, 29)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "2008-09-29".to_string())
    })
}

fn sample_date_time() -> &'static str {
    static DATE_TIME: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    DATE_TIME.get_or_init(|| {
        NaiveDate::from_ymd_opt(2008, 9, 29)
            .and_then(|d| d.and_hms_opt(3, 49, 45))
            .map(|dt: NaiveDateTime| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| "2008-09-29T03:49:45".to_string())
    })
}

fn sample_time() -> &'static str {
    static TIME: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    TIME.get_or_init(|| {
        NaiveTime::from_hms_opt(3, 49, 45)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "03:49:45".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile;
    use crate::wsdl::SchemaFragment;
    use std::path::Path;

    fn compile_one(source: &str) -> TypeSystem {
        compile(
            &[SchemaFragment::new("test.xsd", source)],
            None,
            Path::new("."),
        )
        .unwrap()
    }

    #[test]
    fn test_sample_populates_required_children() {
        let ts = compile_one(
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
</xs:schema>"#,
        );

        let element = ts
            .global_element(&QName::new("urn:users", "UserElement"))
            .unwrap();
        let sample = generate(&ts, element).unwrap();

        assert!(sample.contains("<UserElement"));
        assert!(sample.contains("<id>3</id>"));
        assert!(sample.contains("<name>string</name>"));
    }

    #[test]
    fn test_sample_root_declares_namespace() {
        let ts = compile_one(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                 targetNamespace="urn:simple">
  <xs:element name="flag" type="xs:boolean"/>
</xs:schema>"#,
        );

        let element = ts.global_element(&QName::new("urn:simple", "flag")).unwrap();
        let sample = generate(&ts, element).unwrap();
        assert!(sample.contains(r#"xmlns="urn:simple""#));
        assert!(sample.contains(">true<"));
    }

    #[test]
    fn test_min_occurs_honored_and_optional_emitted_once() {
        let ts = compile_one(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="list">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="entry" type="xs:string" minOccurs="2" maxOccurs="unbounded"/>
        <xs:element name="note" type="xs:string" minOccurs="0"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        );

        let element = ts.global_element_by_local("list").unwrap();
        let sample = generate(&ts, element).unwrap();
        assert_eq!(sample.matches("<entry>").count(), 2);
        assert_eq!(sample.matches("<note>").count(), 1);
    }

    #[test]
    fn test_choice_takes_first_branch() {
        let ts = compile_one(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="payment">
    <xs:complexType>
      <xs:choice>
        <xs:element name="card" type="xs:string"/>
        <xs:element name="transfer" type="xs:string"/>
      </xs:choice>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        );

        let element = ts.global_element_by_local("payment").unwrap();
        let sample = generate(&ts, element).unwrap();
        assert!(sample.contains("<card>"));
        assert!(!sample.contains("<transfer>"));
    }

    #[test]
    fn test_required_attribute_populated() {
        let ts = compile_one(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="pet">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="name" type="xs:string"/>
      </xs:sequence>
      <xs:attribute name="species" type="xs:string" use="required"/>
      <xs:attribute name="color" type="xs:string"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        );

        let element = ts.global_element_by_local("pet").unwrap();
        let sample = generate(&ts, element).unwrap();
        assert!(sample.contains(r#"species="string""#));
        assert!(!sample.contains("color="));
    }

    #[test]
    fn test_enumeration_uses_first_value() {
        let ts = compile_one(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                 xmlns:tns="urn:x" targetNamespace="urn:x">
  <xs:simpleType name="statusType">
    <xs:restriction base="xs:string">
      <xs:enumeration value="open"/>
      <xs:enumeration value="closed"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="status" type="tns:statusType"/>
</xs:schema>"#,
        );

        let element = ts.global_element(&QName::new("urn:x", "status")).unwrap();
        let sample = generate(&ts, element).unwrap();
        assert!(sample.contains(">open<"));
    }

    #[test]
    fn test_recursive_type_is_depth_capped() {
        let ts = compile_one(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                 xmlns:tns="urn:tree" targetNamespace="urn:tree">
  <xs:element name="node" type="tns:nodeType"/>
  <xs:complexType name="nodeType">
    <xs:sequence>
      <xs:element name="child" type="tns:nodeType"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#,
        );

        let element = ts.global_element(&QName::new("urn:tree", "node")).unwrap();
        // Must terminate rather than recurse forever.
        let sample = generate(&ts, element).unwrap();
        assert!(sample.matches("<child").count() <= MAX_DEPTH);
    }

    #[test]
    fn test_date_placeholders_are_valid_literals() {
        assert_eq!(builtin_placeholder("date"), "2008-09-29");
        assert_eq!(builtin_placeholder("dateTime"), "2008-09-29T03:49:45");
        assert_eq!(builtin_placeholder("time"), "03:49:45");
    }
}
