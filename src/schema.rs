//! Schema compilation.
//!
//! Compiles a set of XML schema fragments (plus, optionally, a synthetically
//! generated wrapper fragment) into a queryable [`TypeSystem`]. Cross-fragment
//! `xs:import`/`xs:include` locations resolve relative to a base directory.
//!
//! The compiler accumulates every diagnostic it encounters instead of failing
//! on the first; any accumulated diagnostic surfaces as
//! [`EngineError::SchemaCompilation`] carrying the full message list.
//! Compilation is synchronous and CPU-bound.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::EngineError;
use crate::wsdl::{QName, SchemaFragment};

/// The XML Schema namespace.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Compiled, queryable representation of a set of schema fragments.
#[derive(Debug, Default)]
pub struct TypeSystem {
    global_elements: Vec<ElementDecl>,
    complex_types: HashMap<(String, String), ComplexType>,
    simple_types: HashMap<(String, String), SimpleTypeDef>,
}

impl TypeSystem {
    /// Look up a document-level global element by qualified name.
    ///
    /// An absent and an empty namespace are treated as the same (both mean
    /// "unqualified").
    pub fn global_element(&self, name: &QName) -> Option<&ElementDecl> {
        self.global_elements.iter().find(|e| {
            e.name.local == name.local
                && e.name.namespace_or_empty() == name.namespace_or_empty()
        })
    }

    /// Look up a global element by local name alone, ignoring namespaces.
    ///
    /// The latest declaration wins: a generated wrapper element, compiled
    /// after the base fragments, shadows any base element sharing its local
    /// name.
    pub fn global_element_by_local(&self, local: &str) -> Option<&ElementDecl> {
        self.global_elements
            .iter()
            .rev()
            .find(|e| e.name.local == local)
    }

    /// Resolve a named complex type.
    pub(crate) fn complex_type(&self, name: &QName) -> Option<&ComplexType> {
        self.complex_types
            .get(&(name.namespace_or_empty().to_string(), name.local.clone()))
    }

    /// Resolve a named simple type.
    pub(crate) fn simple_type(&self, name: &QName) -> Option<&SimpleTypeDef> {
        self.simple_types
            .get(&(name.namespace_or_empty().to_string(), name.local.clone()))
    }
}

/// A document-level global element declaration.
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Qualified element name
    pub name: QName,
    /// The element's type
    pub type_ref: TypeRef,
}

/// Reference to an element's type.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// Named type resolved through the type system (or an XSD built-in)
    Named(QName),
    /// Anonymous complex type declared inline
    Inline(Box<ComplexType>),
    /// Anonymous simple type declared inline
    InlineSimple(SimpleTypeDef),
    /// No declared type (`xs:anyType`)
    Any,
}

/// A compiled complex type.
#[derive(Debug, Clone, Default)]
pub struct ComplexType {
    /// Content particle (sequence/all/choice), when any
    pub particle: Option<Particle>,
    /// Declared attributes
    pub attributes: Vec<AttributeDecl>,
    /// Simple-content base type, for text-valued complex types
    pub simple_content_base: Option<QName>,
}

/// Kind of a model group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Ordered sequence; every item appears
    Sequence,
    /// Unordered; every item appears
    All,
    /// Exactly one alternative; samples take the first
    Choice,
}

/// A content-model particle.
#[derive(Debug, Clone)]
pub enum Particle {
    /// Model group with nested items
    Group {
        /// Group kind
        kind: GroupKind,
        /// Items in declared order
        items: Vec<Particle>,
    },
    /// Local element declaration
    Element(LocalElement),
    /// Reference to a global element
    Ref {
        /// Referenced global element name
        name: QName,
        /// Minimum occurrence count
        min_occurs: u32,
    },
}

/// A locally declared element.
#[derive(Debug, Clone)]
pub struct LocalElement {
    /// Local name
    pub name: String,
    /// Namespace, when the element form is qualified
    pub namespace: Option<String>,
    /// Element type
    pub type_ref: TypeRef,
    /// Minimum occurrence count
    pub min_occurs: u32,
}

/// A declared attribute.
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Attribute name
    pub name: String,
    /// Attribute type, when named
    pub type_name: Option<QName>,
    /// Whether `use="required"`
    pub required: bool,
}

/// A compiled simple type.
#[derive(Debug, Clone, Default)]
pub struct SimpleTypeDef {
    /// Restriction base, when any
    pub base: Option<QName>,
    /// Enumeration facet values, in declared order
    pub enumeration: Vec<String>,
}

/// Compile schema fragments into a type system.
///
/// `base_fragments` are concatenated with `extra_fragment` when present;
/// imports and includes resolve relative to `resolver_base_dir`. Fails with
/// [`EngineError::NoSchemas`] when the combined set is empty and with
/// [`EngineError::SchemaCompilation`] on any accumulated diagnostic.
pub fn compile(
    base_fragments: &[SchemaFragment],
    extra_fragment: Option<&SchemaFragment>,
    resolver_base_dir: &Path,
) -> Result<TypeSystem, EngineError> {
    let mut fragments: Vec<&SchemaFragment> = base_fragments.iter().collect();
    if let Some(extra) = extra_fragment {
        fragments.push(extra);
    }
    if fragments.is_empty() {
        return Err(EngineError::NoSchemas);
    }

    let mut compiler = Compiler {
        type_system: TypeSystem::default(),
        diagnostics: Vec::new(),
        base_dir: resolver_base_dir.to_path_buf(),
        loaded: HashSet::new(),
    };

    for fragment in fragments {
        compiler.compile_fragment(&fragment.source, &fragment.system_id);
    }
    compiler.check_references();

    if compiler.diagnostics.is_empty() {
        Ok(compiler.type_system)
    } else {
        Err(EngineError::compilation(compiler.diagnostics))
    }
}

struct Compiler {
    type_system: TypeSystem,
    diagnostics: Vec<String>,
    base_dir: PathBuf,
    loaded: HashSet<PathBuf>,
}

impl Compiler {
    fn compile_fragment(&mut self, source: &str, system_id: &str) {
        let root = match parse_document(source) {
            Ok(root) => root,
            Err(message) => {
                self.diagnostics.push(format!("{}: {}", system_id, message));
                return;
            }
        };

        if root.namespace.as_deref() != Some(XSD_NAMESPACE) || root.local != "schema" {
            self.diagnostics.push(format!(
                "{}: root element is not an XML schema document",
                system_id
            ));
            return;
        }

        let ctx = FragmentCtx {
            target_ns: root
                .attr("targetNamespace")
                .filter(|ns| !ns.is_empty())
                .map(String::from),
            qualified_elements: root.attr("elementFormDefault") == Some("qualified"),
            system_id: system_id.to_string(),
        };

        for child in root.children.clone() {
            if child.namespace.as_deref() != Some(XSD_NAMESPACE) {
                continue;
            }
            match child.local.as_str() {
                "element" => self.compile_global_element(&child, &ctx),
                "complexType" => self.compile_named_complex_type(&child, &ctx),
                "simpleType" => self.compile_named_simple_type(&child, &ctx),
                "import" | "include" => self.follow_location(&child, &ctx),
                // annotation, attribute groups etc. contribute nothing to
                // structural samples
                _ => {}
            }
        }
    }

    fn compile_global_element(&mut self, node: &XmlNode, ctx: &FragmentCtx) {
        let Some(name) = node.attr("name") else {
            self.diagnostics.push(format!(
                "{}: global element without a name",
                ctx.system_id
            ));
            return;
        };

        let type_ref = self.element_type_ref(node, ctx);
        self.type_system.global_elements.push(ElementDecl {
            name: QName {
                namespace: ctx.target_ns.clone(),
                local: name.to_string(),
            },
            type_ref,
        });
    }

    fn compile_named_complex_type(&mut self, node: &XmlNode, ctx: &FragmentCtx) {
        let Some(name) = node.attr("name") else {
            self.diagnostics.push(format!(
                "{}: top-level complexType without a name",
                ctx.system_id
            ));
            return;
        };
        let compiled = self.parse_complex_type(node, ctx);
        self.type_system.complex_types.insert(
            (
                ctx.target_ns.clone().unwrap_or_default(),
                name.to_string(),
            ),
            compiled,
        );
    }

    fn compile_named_simple_type(&mut self, node: &XmlNode, ctx: &FragmentCtx) {
        let Some(name) = node.attr("name") else {
            self.diagnostics.push(format!(
                "{}: top-level simpleType without a name",
                ctx.system_id
            ));
            return;
        };
        let compiled = self.parse_simple_type(node);
        self.type_system.simple_types.insert(
            (
                ctx.target_ns.clone().unwrap_or_default(),
                name.to_string(),
            ),
            compiled,
        );
    }

    fn follow_location(&mut self, node: &XmlNode, ctx: &FragmentCtx) {
        // Imports without a location rely on the fragment set already
        // containing the target namespace; nothing to fetch.
        let Some(location) = node.attr("schemaLocation") else {
            return;
        };

        let path = self.base_dir.join(location);
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !self.loaded.insert(canonical) {
            return;
        }

        match std::fs::read_to_string(&path) {
            Ok(source) => self.compile_fragment(&source, location),
            Err(e) => self.diagnostics.push(format!(
                "{}: failed to read schema location {}: {}",
                ctx.system_id,
                path.display(),
                e
            )),
        }
    }

    fn element_type_ref(&mut self, node: &XmlNode, ctx: &FragmentCtx) -> TypeRef {
        if let Some(type_attr) = node.attr("type") {
            return TypeRef::Named(node.resolve_qname(type_attr));
        }
        if let Some(inline) = node.child(XSD_NAMESPACE, "complexType") {
            return TypeRef::Inline(Box::new(self.parse_complex_type(&inline, ctx)));
        }
        if let Some(inline) = node.child(XSD_NAMESPACE, "simpleType") {
            return TypeRef::InlineSimple(self.parse_simple_type(&inline));
        }
        TypeRef::Any
    }

    fn parse_complex_type(&mut self, node: &XmlNode, ctx: &FragmentCtx) -> ComplexType {
        let mut compiled = ComplexType::default();

        for child in &node.children {
            if child.namespace.as_deref() != Some(XSD_NAMESPACE) {
                continue;
            }
            match child.local.as_str() {
                "sequence" | "all" | "choice" => {
                    compiled.particle = Some(self.parse_group(child, ctx));
                }
                "attribute" => {
                    if let Some(attr) = self.parse_attribute(child, ctx) {
                        compiled.attributes.push(attr);
                    }
                }
                "simpleContent" => {
                    self.parse_simple_content(child, ctx, &mut compiled);
                }
                "complexContent" => {
                    // Base-type inheritance is flattened: only the extension's
                    // own particle and attributes contribute to the sample.
                    if let Some(ext) = child
                        .child(XSD_NAMESPACE, "extension")
                        .or_else(|| child.child(XSD_NAMESPACE, "restriction"))
                    {
                        let nested = self.parse_complex_type(&ext, ctx);
                        compiled.particle = nested.particle;
                        compiled.attributes.extend(nested.attributes);
                    }
                }
                _ => {}
            }
        }

        compiled
    }

    fn parse_simple_content(&mut self, node: &XmlNode, ctx: &FragmentCtx, out: &mut ComplexType) {
        let Some(derivation) = node
            .child(XSD_NAMESPACE, "extension")
            .or_else(|| node.child(XSD_NAMESPACE, "restriction"))
        else {
            return;
        };
        out.simple_content_base = derivation
            .attr("base")
            .map(|b| derivation.resolve_qname(b));
        for child in &derivation.children {
            if child.namespace.as_deref() == Some(XSD_NAMESPACE) && child.local == "attribute" {
                if let Some(attr) = self.parse_attribute(child, ctx) {
                    out.attributes.push(attr);
                }
            }
        }
    }

    fn parse_group(&mut self, node: &XmlNode, ctx: &FragmentCtx) -> Particle {
        let kind = match node.local.as_str() {
            "all" => GroupKind::All,
            "choice" => GroupKind::Choice,
            _ => GroupKind::Sequence,
        };

        let mut items = Vec::new();
        for child in &node.children {
            if child.namespace.as_deref() != Some(XSD_NAMESPACE) {
                continue;
            }
            match child.local.as_str() {
                "element" => {
                    if let Some(particle) = self.parse_local_element(child, ctx) {
                        items.push(particle);
                    }
                }
                "sequence" | "all" | "choice" => {
                    items.push(self.parse_group(child, ctx));
                }
                // wildcards contribute nothing concrete to a sample
                "any" => {}
                _ => {}
            }
        }

        Particle::Group { kind, items }
    }

    fn parse_local_element(&mut self, node: &XmlNode, ctx: &FragmentCtx) -> Option<Particle> {
        let min_occurs = node
            .attr("minOccurs")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        if let Some(reference) = node.attr("ref") {
            return Some(Particle::Ref {
                name: node.resolve_qname(reference),
                min_occurs,
            });
        }

        let Some(name) = node.attr("name") else {
            self.diagnostics.push(format!(
                "{}: local element without a name or ref",
                ctx.system_id
            ));
            return None;
        };

        let qualified = match node.attr("form") {
            Some("qualified") => true,
            Some("unqualified") => false,
            _ => ctx.qualified_elements,
        };

        Some(Particle::Element(LocalElement {
            name: name.to_string(),
            namespace: if qualified { ctx.target_ns.clone() } else { None },
            type_ref: self.element_type_ref(node, ctx),
            min_occurs,
        }))
    }

    fn parse_attribute(&mut self, node: &XmlNode, ctx: &FragmentCtx) -> Option<AttributeDecl> {
        let Some(name) = node.attr("name") else {
            // ref-form attributes are rare in mock schemas; skip quietly
            if node.attr("ref").is_none() {
                self.diagnostics.push(format!(
                    "{}: attribute without a name",
                    ctx.system_id
                ));
            }
            return None;
        };

        Some(AttributeDecl {
            name: name.to_string(),
            type_name: node.attr("type").map(|t| node.resolve_qname(t)),
            required: node.attr("use") == Some("required"),
        })
    }

    fn parse_simple_type(&mut self, node: &XmlNode) -> SimpleTypeDef {
        let mut def = SimpleTypeDef::default();
        if let Some(restriction) = node.child(XSD_NAMESPACE, "restriction") {
            def.base = restriction.attr("base").map(|b| restriction.resolve_qname(b));
            for facet in &restriction.children {
                if facet.namespace.as_deref() == Some(XSD_NAMESPACE)
                    && facet.local == "enumeration"
                {
                    if let Some(value) = facet.attr("value") {
                        def.enumeration.push(value.to_string());
                    }
                }
            }
        }
        def
    }

    /// Post-compilation reference check: every named type must resolve to a
    /// built-in or a compiled type, and every element ref to a global element.
    fn check_references(&mut self) {
        let mut type_refs: Vec<QName> = Vec::new();
        let mut element_refs: Vec<QName> = Vec::new();

        for element in &self.type_system.global_elements {
            collect_type_refs(&element.type_ref, &mut type_refs, &mut element_refs);
        }
        for complex in self.type_system.complex_types.values() {
            collect_complex_refs(complex, &mut type_refs, &mut element_refs);
        }
        for simple in self.type_system.simple_types.values() {
            if let Some(base) = &simple.base {
                type_refs.push(base.clone());
            }
        }

        for name in type_refs {
            if name.namespace_or_empty() == XSD_NAMESPACE {
                continue;
            }
            if self.type_system.complex_type(&name).is_none()
                && self.type_system.simple_type(&name).is_none()
            {
                self.diagnostics
                    .push(format!("unresolved type reference: {}", name));
            }
        }
        for name in element_refs {
            if self.type_system.global_element(&name).is_none() {
                self.diagnostics
                    .push(format!("unresolved element reference: {}", name));
            }
        }
    }
}

fn collect_type_refs(type_ref: &TypeRef, types: &mut Vec<QName>, elements: &mut Vec<QName>) {
    match type_ref {
        TypeRef::Named(name) => types.push(name.clone()),
        TypeRef::Inline(complex) => collect_complex_refs(complex, types, elements),
        TypeRef::InlineSimple(simple) => {
            if let Some(base) = &simple.base {
                types.push(base.clone());
            }
        }
        TypeRef::Any => {}
    }
}

fn collect_complex_refs(complex: &ComplexType, types: &mut Vec<QName>, elements: &mut Vec<QName>) {
    if let Some(base) = &complex.simple_content_base {
        types.push(base.clone());
    }
    for attr in &complex.attributes {
        if let Some(name) = &attr.type_name {
            types.push(name.clone());
        }
    }
    if let Some(particle) = &complex.particle {
        collect_particle_refs(particle, types, elements);
    }
}

fn collect_particle_refs(particle: &Particle, types: &mut Vec<QName>, elements: &mut Vec<QName>) {
    match particle {
        Particle::Group { items, .. } => {
            for item in items {
                collect_particle_refs(item, types, elements);
            }
        }
        Particle::Element(local) => collect_type_refs(&local.type_ref, types, elements),
        Particle::Ref { name, .. } => elements.push(name.clone()),
    }
}

struct FragmentCtx {
    target_ns: Option<String>,
    qualified_elements: bool,
    system_id: String,
}

// ---------------------------------------------------------------------------
// Minimal namespace-aware XML tree, parsed with quick-xml
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct XmlNode {
    local: String,
    namespace: Option<String>,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
    default_ns: Option<String>,
    prefixes: HashMap<String, String>,
}

impl XmlNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, namespace: &str, local: &str) -> Option<XmlNode> {
        self.children
            .iter()
            .find(|c| c.namespace.as_deref() == Some(namespace) && c.local == local)
            .cloned()
    }

    /// Resolve a prefixed name (e.g. `xs:string`) against the in-scope
    /// namespace bindings of this node.
    fn resolve_qname(&self, value: &str) -> QName {
        match value.split_once(':') {
            Some((prefix, local)) => QName {
                namespace: self.prefixes.get(prefix).cloned(),
                local: local.to_string(),
            },
            None => QName {
                namespace: self.default_ns.clone(),
                local: value.to_string(),
            },
        }
    }
}

/// Parse an XML document into a tree, resolving namespace bindings per node.
fn parse_document(source: &str) -> Result<XmlNode, String> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let node = build_node(&e, stack.last())?;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = build_node(&e, stack.last())?;
                attach(node, &mut stack, &mut root);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| "unbalanced end tag".to_string())?;
                attach(node, &mut stack, &mut root);
            }
            Event::Eof => break,
            // text, comments, declarations and PIs carry no schema structure
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document inside an element".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(node: XmlNode, stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn build_node(
    start: &quick_xml::events::BytesStart<'_>,
    parent: Option<&XmlNode>,
) -> Result<XmlNode, String> {
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();

    let mut default_ns = parent.and_then(|p| p.default_ns.clone());
    let mut prefixes = parent.map(|p| p.prefixes.clone()).unwrap_or_default();
    let mut attrs = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();

        if key == "xmlns" {
            default_ns = if value.is_empty() { None } else { Some(value) };
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            prefixes.insert(prefix.to_string(), value);
        } else {
            attrs.push((key, value));
        }
    }

    let (namespace, local) = match raw_name.split_once(':') {
        Some((prefix, local)) => (prefixes.get(prefix).cloned(), local.to_string()),
        None => (default_ns.clone(), raw_name),
    };

    Ok(XmlNode {
        local,
        namespace,
        attrs,
        children: Vec::new(),
        default_ns,
        prefixes,
    })
}
