//! Resource objects
//!
//! A [`Resource`] is one remote entity: the attribute map exactly as the server
//! sent it, tagged with its descriptor. It keeps only a weak handle on the
//! client session, so building one from a raw mapping is cheap and never
//! creates a reference cycle.

use super::manager::ResourceManager;
use super::registry::{get_descriptor, Operation, ResourceDescriptor};
use super::resultset::ResultSet;
use crate::api::client::Session;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};

/// Identifier of a remote entity: numeric id or string key (project identifier, wiki title)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Int(i64),
    Str(String),
}

impl ResourceId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ResourceId::Int),
            Value::String(s) => Some(ResourceId::Str(s.clone())),
            _ => None,
        }
    }

    /// Compare against a raw attribute; `2` matches both `2` and `"2"`
    pub fn matches(&self, value: &Value) -> bool {
        ResourceId::from_value(value).is_some_and(|other| other.to_string() == self.to_string())
    }

    pub fn to_value(&self) -> Value {
        match self {
            ResourceId::Int(n) => Value::from(*n),
            ResourceId::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(n) => write!(f, "{}", n),
            ResourceId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        ResourceId::Int(value)
    }
}

impl From<i32> for ResourceId {
    fn from(value: i32) -> Self {
        ResourceId::Int(value.into())
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        ResourceId::Int(value.into())
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId::Str(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId::Str(value)
    }
}

/// One remote entity
#[derive(Clone)]
pub struct Resource {
    descriptor: &'static ResourceDescriptor,
    attributes: Map<String, Value>,
    changed: BTreeSet<String>,
    /// Path scope the resource was fetched under, e.g. `project_id` for wiki pages
    path_params: Map<String, Value>,
    session: Weak<Session>,
}

impl Resource {
    pub(crate) fn new(
        descriptor: &'static ResourceDescriptor,
        attributes: Map<String, Value>,
        path_params: Map<String, Value>,
        session: Weak<Session>,
    ) -> Self {
        Self {
            descriptor,
            attributes,
            changed: BTreeSet::new(),
            path_params,
            session,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.descriptor.resource_name
    }

    pub fn class_name(&self) -> &str {
        &self.descriptor.class_name
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    /// Identifier taken from the descriptor's id field (`id`, or `title` for wiki pages)
    pub fn id(&self) -> Option<ResourceId> {
        self.attributes
            .get(&self.descriptor.id_field)
            .and_then(ResourceId::from_value)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(Value::as_str)
    }

    pub fn int_attr(&self, name: &str) -> Option<i64> {
        self.attr(name).and_then(Value::as_i64)
    }

    /// Date attribute in `YYYY-MM-DD` form (`start_date`, `due_date`, `spent_on`)
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.str_attr(name)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// RFC 3339 timestamp attribute (`created_on`, `updated_on`)
    pub fn datetime(&self, name: &str) -> Option<DateTime<FixedOffset>> {
        self.str_attr(name)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    pub fn path_params(&self) -> &Map<String, Value> {
        &self.path_params
    }

    /// Set a path parameter used by `save` and `delete` (e.g. `project_id`)
    pub fn set_path_param(&mut self, name: &str, value: impl Into<Value>) {
        self.path_params.insert(name.to_string(), value.into());
    }

    /// Change an attribute locally; nothing is sent until [`Resource::save`]
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
        self.changed.insert(name.to_string());
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    /// Embedded resource (e.g. `issue.project`) built from the payload, no network
    pub fn nested(&self, name: &str) -> Result<Option<Resource>> {
        let Some(target) = self.descriptor.nested.get(name) else {
            return Err(self.unknown_relation(name));
        };
        let descriptor = get_descriptor(target).ok_or_else(|| Error::UnknownResourceType {
            name: target.clone(),
        })?;

        let attributes = match self.attributes.get(name) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(map)) => map.clone(),
            Some(scalar) => {
                let mut map = Map::new();
                map.insert(descriptor.id_field.clone(), scalar.clone());
                map
            }
        };

        Ok(Some(Resource::new(
            descriptor,
            attributes,
            Map::new(),
            self.session.clone(),
        )))
    }

    /// Fetch the full record behind an embedded resource
    pub async fn resolve(&self, name: &str) -> Result<Option<Resource>> {
        let Some(stub) = self.nested(name)? else {
            return Ok(None);
        };
        let Some(id) = stub.id() else {
            return Err(Error::UnexpectedResponse {
                resource: stub.resource_type().to_string(),
                reason: format!("embedded '{}' has no identifier", name),
            });
        };

        let manager = self.manager_for(stub.resource_type())?;
        manager.get(id, Map::new()).await.map(Some)
    }

    /// Lazy result set of related resources (e.g. `project.issues`)
    pub fn relation(&self, name: &str) -> Result<ResultSet> {
        let Some(relation) = self.descriptor.relations.get(name) else {
            return Err(self.unknown_relation(name));
        };
        let id = self.require_id()?;

        let mut filters = Map::new();
        filters.insert(relation.filter.clone(), id.to_value());
        self.manager_for(&relation.resource)?.filter(filters)
    }

    /// Persist local changes: update changed fields, or create when there is no id yet
    pub async fn save(&mut self) -> Result<()> {
        let manager = self.manager_for(self.resource_type())?;

        match self.id() {
            Some(id) => {
                if self.changed.is_empty() {
                    return Ok(());
                }
                let mut fields: Map<String, Value> = self
                    .changed
                    .iter()
                    .filter_map(|k| self.attributes.get(k).map(|v| (k.clone(), v.clone())))
                    .collect();
                for (k, v) in self.scope_for(Operation::Update) {
                    fields.entry(k).or_insert(v);
                }
                manager.update(id, fields).await?;
            }
            None => {
                let mut fields = self.attributes.clone();
                for (k, v) in self.scope_for(Operation::Create) {
                    fields.entry(k).or_insert(v);
                }
                let created = manager.create(fields).await?;
                self.attributes = created.attributes;
                self.path_params = created.path_params;
            }
        }

        self.changed.clear();
        Ok(())
    }

    pub async fn delete(&self) -> Result<bool> {
        let id = self.require_id()?;
        self.manager_for(self.resource_type())?
            .delete(id, self.scope_for(Operation::Delete))
            .await
    }

    /// Path parameters the template for `operation` actually uses
    fn scope_for(&self, operation: Operation) -> Map<String, Value> {
        let template = self.descriptor.path_template(operation);
        self.path_params
            .iter()
            .filter(|(k, _)| template.contains(&format!("{{{}}}", k)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn require_id(&self) -> Result<ResourceId> {
        self.id().ok_or_else(|| {
            Error::local_validation(
                self.resource_type(),
                format!("resource has no '{}'", self.descriptor.id_field),
            )
        })
    }

    fn manager_for(&self, resource: &str) -> Result<ResourceManager> {
        let session: Arc<Session> = self.session.upgrade().ok_or_else(|| Error::SessionClosed {
            resource: self.resource_type().to_string(),
        })?;
        ResourceManager::open(session, resource)
    }

    fn unknown_relation(&self, name: &str) -> Error {
        Error::UnknownRelation {
            resource: self.resource_type().to_string(),
            name: name.to_string(),
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type() == other.resource_type() && self.attributes == other.attributes
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_type", &self.resource_type())
            .field("attributes", &self.attributes)
            .field("changed", &self.changed)
            .finish()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<rmine::{}", self.class_name())?;
        if let Some(id) = self.id() {
            write!(f, " #{}", id)?;
        }
        let label = ["name", "subject", "title", "login"]
            .iter()
            .find_map(|key| self.str_attr(key));
        if let Some(label) = label {
            write!(f, " \"{}\"", label)?;
        }
        f.write_str(">")
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}
