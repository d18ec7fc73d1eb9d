//! Configuration for the virtualization engine.
//!
//! Defines resource match criteria, literal responses, and declarative SOAP
//! service descriptions. Everything here is constructed once at load time and
//! read-only thereafter; matching and synthesis never mutate it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::wsdl::{SchemaFragment, WsdlOperation, WsdlService};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Configured resources, in declaration order (order is the ambiguity
    /// tie-break, so this is always an ordered list)
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// SOAP services available for example synthesis
    #[serde(default)]
    pub services: Vec<SoapServiceConfig>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, resource) in self.resources.iter().enumerate() {
            resource
                .validate()
                .map_err(|e| anyhow::anyhow!("Resource {}: {}", i, e))?;
        }
        for (i, service) in self.services.iter().enumerate() {
            service
                .validate()
                .map_err(|e| anyhow::anyhow!("Service {}: {}", i, e))?;
        }
        Ok(())
    }

    /// Find a configured service by name.
    pub fn service(&self, name: &str) -> Option<&SoapServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Match criteria and response specification for one configured resource.
///
/// An empty map on any of the param/header dimensions means "no constraint,
/// matches anything".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Literal or templated path (e.g. `/pets/{id}`)
    pub path: String,

    /// HTTP method to match (case-exact); absent = any method
    #[serde(default)]
    pub method: Option<String>,

    /// Path parameter constraints
    #[serde(default)]
    pub path_params: HashMap<String, String>,

    /// Query parameter constraints
    #[serde(default)]
    pub query_params: HashMap<String, String>,

    /// Header constraints (keys compared case-insensitively)
    #[serde(default)]
    pub request_headers: HashMap<String, String>,

    /// Body predicate, if any
    #[serde(default)]
    pub request_body: Option<BodyPredicate>,

    /// Response to serve when this resource matches
    #[serde(default)]
    pub response: ResponseConfig,
}

impl ResourceConfig {
    /// Validate the resource configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.path.is_empty() {
            anyhow::bail!("resource path cannot be empty");
        }
        self.response.validate()?;
        Ok(())
    }

    /// True when a literal response body is configured; when false and the
    /// operation is SOAP, the body is synthesized from schemas.
    pub fn has_literal_body(&self) -> bool {
        self.response.body.is_some()
    }
}

/// JSON-path predicate over the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodyPredicate {
    /// Path expression evaluated against the body; empty/absent = wildcard
    #[serde(default)]
    pub json_path: Option<String>,

    /// Expected value at the path (null matches an unresolvable path)
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Literal response specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Literal body
    #[serde(default)]
    pub body: Option<String>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

impl ResponseConfig {
    /// Validate the response configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }
}

/// A resource configuration paired with its pre-extracted constraint maps.
///
/// One per configured resource; the list of these is the matcher's candidate
/// set. The maps share the "empty = no constraint" invariant with
/// [`ResourceConfig`].
#[derive(Debug, Clone)]
pub struct ResolvedResourceConfig {
    config: ResourceConfig,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, String>,
    request_headers: HashMap<String, String>,
}

impl ResolvedResourceConfig {
    /// Resolve a single resource configuration.
    pub fn resolve(config: &ResourceConfig) -> Self {
        Self {
            config: config.clone(),
            path_params: config.path_params.clone(),
            query_params: config.query_params.clone(),
            request_headers: config.request_headers.clone(),
        }
    }

    /// The underlying resource configuration.
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Configured path parameter constraints.
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Configured query parameter constraints.
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Configured header constraints.
    pub fn request_headers(&self) -> &HashMap<String, String> {
        &self.request_headers
    }
}

/// Extract the resolved resource configurations from the configured resources.
pub fn resolve_resource_configs(resources: &[ResourceConfig]) -> Vec<ResolvedResourceConfig> {
    resources.iter().map(ResolvedResourceConfig::resolve).collect()
}

/// Declarative description of one SOAP service.
///
/// Stands in for the output of a WSDL parser: the operations and schema file
/// list are stated directly rather than derived from a wire-format interface
/// description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoapServiceConfig {
    /// Service name
    pub name: String,

    /// Target namespace of the service
    #[serde(default)]
    pub target_namespace: Option<String>,

    /// Directory schema files and their relative imports resolve against
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Schema files, relative to `schema_dir`
    #[serde(default)]
    pub schemas: Vec<PathBuf>,

    /// Operations exposed by this service
    #[serde(default)]
    pub operations: Vec<WsdlOperation>,
}

impl SoapServiceConfig {
    /// Validate the service configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("service name cannot be empty");
        }
        for op in &self.operations {
            if op.name.is_empty() {
                anyhow::bail!("operation name cannot be empty in service {}", self.name);
            }
        }
        Ok(())
    }

    /// The service model consumed by the synthesizer.
    pub fn service_model(&self) -> WsdlService {
        WsdlService {
            name: self.name.clone(),
            target_namespace: self.target_namespace.clone(),
        }
    }

    /// Find an operation by name.
    pub fn operation(&self, name: &str) -> Option<&WsdlOperation> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Directory relative imports resolve against.
    pub fn resolver_base_dir(&self) -> &Path {
        self.schema_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }

    /// Load the schema fragments for this service from disk.
    pub fn load_schema_fragments(&self) -> anyhow::Result<Vec<SchemaFragment>> {
        let base = self.resolver_base_dir();
        let mut fragments = Vec::with_capacity(self.schemas.len());
        for file in &self.schemas {
            let path = base.join(file);
            let source = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read schema {}: {}", path.display(), e))?;
            fragments.push(SchemaFragment::new(file.display().to_string(), source));
        }
        Ok(fragments)
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every matched resource
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Default content type for responses
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
}

fn default_true() -> bool {
    true
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            default_content_type: default_content_type(),
        }
    }
}
