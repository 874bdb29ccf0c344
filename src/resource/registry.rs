//! Resource Registry - Load resource descriptors from JSON
//!
//! This module loads all Redmine resource descriptors from embedded JSON files
//! and provides lookup functions for the rest of the crate. Descriptors are
//! parsed once and never mutated afterwards.

use super::version::ApiVersion;
use crate::api::http::param_string;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/projects.json"),
    include_str!("../resources/issues.json"),
    include_str!("../resources/users.json"),
    include_str!("../resources/catalog.json"),
];

/// Operations a resource type may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    All,
    Filter,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Get => "get",
            Operation::All => "all",
            Operation::Filter => "filter",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Path template overrides; `{id}` and `{param}` placeholders are filled per call
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PathDef {
    #[serde(default)]
    pub one: Option<String>,
    #[serde(default)]
    pub all: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub create: Option<String>,
    #[serde(default)]
    pub update: Option<String>,
    #[serde(default)]
    pub delete: Option<String>,
}

/// Relation definition: a lazy result set of `resource` filtered by `filter` = owner id
#[derive(Debug, Clone, Deserialize)]
pub struct RelationDef {
    pub resource: String,
    pub filter: String,
}

/// Resource descriptor from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDescriptor {
    /// Registry key, filled in from the map key at load time
    #[serde(skip)]
    pub resource_name: String,
    pub class_name: String,
    /// Collection key in list responses; may be dotted or templated
    pub container_key: String,
    /// Object key in single-resource payloads (defaults to the resource name)
    #[serde(default)]
    pub container_one: Option<String>,
    pub operations: BTreeSet<Operation>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub required_create_fields: BTreeSet<String>,
    #[serde(default)]
    pub queryable_filters: BTreeSet<String>,
    /// Unknown filters fall back to `all()` instead of failing
    #[serde(default)]
    pub filter_optional: bool,
    #[serde(default)]
    pub minimum_api_version: Option<ApiVersion>,
    #[serde(default)]
    pub paths: PathDef,
    /// Fixed query parameters merged into every collection request
    #[serde(default)]
    pub filter_params: Map<String, Value>,
    /// Embedded field name -> resource type
    #[serde(default)]
    pub nested: BTreeMap<String, String>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDef>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl ResourceDescriptor {
    pub fn supports(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Key wrapping a single object in request and response bodies
    pub fn single_key(&self) -> &str {
        self.container_one.as_deref().unwrap_or(&self.resource_name)
    }

    /// Path template for an operation, derived from the container key unless overridden
    pub fn path_template(&self, operation: Operation) -> String {
        let collection = || format!("/{}.json", self.container_key);
        let member = || format!("/{}/{{id}}.json", self.container_key);
        let paths = &self.paths;

        match operation {
            Operation::Get => paths.one.clone().unwrap_or_else(member),
            Operation::All => paths.all.clone().unwrap_or_else(collection),
            Operation::Filter => paths
                .filter
                .clone()
                .or_else(|| paths.all.clone())
                .unwrap_or_else(collection),
            Operation::Create => paths
                .create
                .clone()
                .or_else(|| paths.all.clone())
                .unwrap_or_else(collection),
            Operation::Update => paths
                .update
                .clone()
                .or_else(|| paths.one.clone())
                .unwrap_or_else(member),
            Operation::Delete => paths
                .delete
                .clone()
                .or_else(|| paths.one.clone())
                .unwrap_or_else(member),
        }
    }
}

/// A rendered template and the parameter names it consumed
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub value: String,
    pub consumed: Vec<String>,
}

/// Fill `{name}` placeholders from `params` (and `{id}` from `id`).
///
/// Path segments are percent-encoded when `encode` is set. Returns the name of
/// the first placeholder that could not be filled.
pub fn render_template(
    template: &str,
    params: &Map<String, Value>,
    id: Option<&str>,
    encode: bool,
) -> Result<Rendered, String> {
    let mut value = String::with_capacity(template.len());
    let mut consumed = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        value.push_str(&rest[..start]);
        let name = &rest[start + 1..start + len];

        let raw = if name == "id" {
            id.map(str::to_string)
        } else {
            params.get(name).filter(|v| !v.is_null()).map(param_string)
        };
        let Some(raw) = raw else {
            return Err(name.to_string());
        };

        if encode {
            value.push_str(&urlencoding::encode(&raw));
        } else {
            value.push_str(&raw);
        }
        if name != "id" {
            consumed.push(name.to_string());
        }
        rest = &rest[start + len + 1..];
    }
    value.push_str(rest);

    Ok(Rendered { value, consumed })
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDescriptor>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        for (name, descriptor) in final_config.resources.iter_mut() {
            descriptor.resource_name = name.clone();
        }

        final_config
    })
}

/// Get a resource descriptor by name
pub fn get_descriptor(name: &str) -> Option<&'static ResourceDescriptor> {
    get_registry().resources.get(name)
}

/// Get all resource names, sorted
pub fn get_all_resource_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    names.sort_unstable();
    names
}
