//! Resource Manager
//!
//! One generic manager serves every resource type. What a type supports, which
//! filters it accepts and where its endpoints live all come from its
//! [`ResourceDescriptor`]; the manager only validates calls against that table
//! and turns raw payloads into [`Resource`]s and [`ResultSet`]s.
//!
//! Pre-conditions are checked in a fixed order before any request is sent:
//! operation support, then argument count, then filter keys / required fields
//! / path parameters.

use super::object::{Resource, ResourceId};
use super::registry::{get_descriptor, render_template, Operation, Rendered, ResourceDescriptor};
use super::resultset::ResultSet;
use crate::api::client::Session;
use crate::api::http::{query_pairs, ApiResponse};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Keyword arguments for filters, fields and extra query parameters
pub type Params = Map<String, Value>;

/// A deferred collection request
#[derive(Debug, Clone)]
pub(crate) struct Query {
    pub path: String,
    /// Possibly dotted key locating the item array in the response body
    pub container: String,
    pub params: Params,
    /// Values the path and container templates consumed
    pub path_params: Params,
}

/// Extract items from a response body using a dotted container path
fn extract_items(body: Value, path: &str) -> Vec<Value> {
    let mut current = body;

    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current {
            Value::Object(mut map) => match map.remove(part) {
                Some(v) => v,
                None => return vec![],
            },
            _ => return vec![],
        };
    }

    match current {
        Value::Array(items) => items,
        _ => vec![],
    }
}

/// Collect server-side error messages from an `errors` payload
fn error_messages(body: Option<&Value>) -> Vec<String> {
    let Some(errors) = body.and_then(|b| b.get("errors")) else {
        return vec![];
    };

    match errors {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Array(pair) => pair
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
                other => other.to_string(),
            })
            .collect(),
        Value::Object(fields) => fields
            .iter()
            .map(|(field, msg)| match msg {
                Value::String(s) => format!("{} {}", field, s),
                other => format!("{} {}", field, other),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => vec![],
    }
}

fn only(params: &Params, consumed: &[String]) -> Params {
    params
        .iter()
        .filter(|(k, _)| consumed.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn without(params: &Params, consumed: &[String]) -> Params {
    params
        .iter()
        .filter(|(k, _)| !consumed.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Manager for one resource type
#[derive(Clone)]
pub struct ResourceManager {
    descriptor: &'static ResourceDescriptor,
    session: Arc<Session>,
}

impl ResourceManager {
    /// Look up a descriptor and check it against the connected server version
    pub(crate) fn open(session: Arc<Session>, resource: &str) -> Result<Self> {
        let descriptor = get_descriptor(resource).ok_or_else(|| Error::UnknownResourceType {
            name: resource.to_string(),
        })?;

        if let (Some(actual), Some(required)) =
            (session.version.as_ref(), descriptor.minimum_api_version.as_ref())
        {
            if actual < required {
                return Err(Error::ResourceVersionMismatch {
                    resource: resource.to_string(),
                    required: required.clone(),
                    actual: actual.clone(),
                });
            }
        }

        Ok(Self {
            descriptor,
            session,
        })
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    pub fn resource_name(&self) -> &str {
        &self.descriptor.resource_name
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Fetch a single resource by id (or string identifier)
    pub async fn get(&self, id: impl Into<ResourceId>, params: Params) -> Result<Resource> {
        self.ensure(Operation::Get)?;
        let id = id.into();
        let path = self.render_path(Operation::Get, &params, Some(&id))?;
        let query = query_pairs(&without(&params, &path.consumed));

        tracing::debug!("{}: get {}", self.resource_name(), id);
        let response = self.session.transport.get(&path.value, &query).await?;

        if response.status == 404 {
            return Err(self.not_found(&id));
        }
        self.check(&response)?;

        let Some(raw) = self.extract_single(response) else {
            return Err(Error::UnexpectedResponse {
                resource: self.resource_name().to_string(),
                reason: format!("response has no '{}' object", self.descriptor.single_key()),
            });
        };
        self.scoped_resource(raw, only(&params, &path.consumed))
    }

    /// Lazy result set over the whole collection
    pub fn all(&self, params: Params) -> Result<ResultSet> {
        self.ensure(Operation::All)?;
        let template = self.descriptor.path_template(Operation::All);

        let path = render_template(&template, &params, None, true)
            .map_err(|missing| self.missing_param(&missing))?;
        let container = render_template(&self.descriptor.container_key, &params, None, false)
            .map_err(|missing| self.missing_param(&missing))?;

        Ok(ResultSet::remote(self.clone(), self.query(path, container, &params)))
    }

    /// Lazy result set restricted by `filters`
    pub fn filter(&self, filters: Params) -> Result<ResultSet> {
        self.ensure(Operation::Filter)?;

        if filters.is_empty() {
            return Err(Error::NoFiltersProvided {
                resource: self.resource_name().to_string(),
            });
        }

        if let Some(unknown) = filters
            .keys()
            .find(|k| !self.descriptor.queryable_filters.contains(*k))
        {
            return self.fall_back_or(self.filter_error(unknown));
        }

        let template = self.descriptor.path_template(Operation::Filter);
        let path = match render_template(&template, &filters, None, true) {
            Ok(path) => path,
            Err(missing) => return self.fall_back_or(self.filter_error(&missing)),
        };
        let container = match render_template(&self.descriptor.container_key, &filters, None, false)
        {
            Ok(container) => container,
            Err(missing) => return self.fall_back_or(self.filter_error(&missing)),
        };

        Ok(ResultSet::remote(self.clone(), self.query(path, container, &filters)))
    }

    /// Create a resource; `uploads` entries with a `path` are uploaded first
    pub async fn create(&self, fields: Params) -> Result<Resource> {
        self.ensure(Operation::Create)?;

        if fields.is_empty() {
            return Err(Error::NoFieldsProvided {
                resource: self.resource_name().to_string(),
            });
        }

        let missing: Vec<String> = self
            .descriptor
            .required_create_fields
            .iter()
            .filter(|f| fields.get(*f).map_or(true, Value::is_null))
            .map(|f| format!("{} is required", f))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation {
                resource: self.resource_name().to_string(),
                status: None,
                messages: missing,
            });
        }

        let path = self.render_path(Operation::Create, &fields, None)?;
        let mut path_params = only(&fields, &path.consumed);
        path_params.remove(&self.descriptor.id_field);
        let body = self.resolve_uploads(without(&fields, &path.consumed)).await?;
        let payload = self.payload(body);

        tracing::info!("{}: create via {}", self.resource_name(), path.value);
        let mut response = self.session.transport.post(&path.value, &payload).await?;

        // Some endpoints (wiki pages) only accept creation through PUT
        if matches!(response.status, 404 | 405) {
            tracing::warn!(
                "{}: POST {} returned {}, retrying with PUT",
                self.resource_name(),
                path.value,
                response.status
            );
            response = self.session.transport.put(&path.value, &payload).await?;
            if matches!(response.status, 404 | 405) {
                return Err(Error::Validation {
                    resource: self.resource_name().to_string(),
                    status: Some(response.status),
                    messages: vec![format!("{} rejected both POST and PUT", path.value)],
                });
            }
        }
        self.check(&response)?;

        let status = response.status;
        match self.extract_single(response) {
            Some(raw) => self.scoped_resource(raw, path_params),
            None => Err(Error::Validation {
                resource: self.resource_name().to_string(),
                status: Some(status),
                messages: vec!["server did not return the created resource".to_string()],
            }),
        }
    }

    /// Update fields of an existing resource
    pub async fn update(&self, id: impl Into<ResourceId>, fields: Params) -> Result<bool> {
        self.ensure(Operation::Update)?;
        let id = id.into();

        if fields.is_empty() {
            return Err(Error::NoFieldsProvided {
                resource: self.resource_name().to_string(),
            });
        }

        let path = self.render_path(Operation::Update, &fields, Some(&id))?;
        let body = self.resolve_uploads(without(&fields, &path.consumed)).await?;
        let payload = self.payload(body);

        tracing::info!("{}: update {}", self.resource_name(), id);
        let response = self.session.transport.put(&path.value, &payload).await?;

        if response.status == 404 {
            return Err(self.not_found(&id));
        }
        self.check(&response)?;
        Ok(true)
    }

    /// Delete a resource; `params` fill path placeholders such as `project_id`
    pub async fn delete(&self, id: impl Into<ResourceId>, params: Params) -> Result<bool> {
        self.ensure(Operation::Delete)?;
        let id = id.into();
        let path = self.render_path(Operation::Delete, &params, Some(&id))?;
        let query = query_pairs(&without(&params, &path.consumed));

        tracing::info!("{}: delete {}", self.resource_name(), id);
        let response = self.session.transport.delete(&path.value, &query).await?;

        if response.status == 404 {
            return Err(self.not_found(&id));
        }
        self.check(&response)?;
        Ok(true)
    }

    /// Wrap a raw mapping as a resource of this type, without network access
    pub fn to_resource(&self, raw: Value) -> Result<Resource> {
        self.scoped_resource(raw, Params::new())
    }

    /// Like [`ResourceManager::to_resource`], remembering the path parameters
    /// (e.g. `project_id`) later needed to save or delete the resource
    pub fn scoped_resource(&self, raw: Value, path_params: Params) -> Result<Resource> {
        match raw {
            Value::Object(attributes) => Ok(Resource::new(
                self.descriptor,
                attributes,
                path_params,
                Arc::downgrade(&self.session),
            )),
            other => Err(Error::UnexpectedResponse {
                resource: self.resource_name().to_string(),
                reason: format!("expected an object, got {}", other),
            }),
        }
    }

    /// Wrap pre-fetched mappings as an already materialized result set
    pub fn to_resource_set(&self, raw: Vec<Value>) -> Result<ResultSet> {
        let items = raw
            .into_iter()
            .map(|r| self.to_resource(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultSet::materialized(self.clone(), items))
    }

    // =========================================================================
    // Collection fetching (driven by ResultSet)
    // =========================================================================

    /// Fetch one window of a collection
    pub(crate) async fn fetch_page(
        &self,
        query: &Query,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Resource>> {
        let mut pairs = query_pairs(&query.params);
        if offset > 0 || limit.is_some() {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }

        tracing::debug!(
            "{}: fetching {} (offset={}, limit={:?})",
            self.resource_name(),
            query.path,
            offset,
            limit
        );
        let response = self.session.transport.get(&query.path, &pairs).await?;
        self.check(&response)?;

        let Some(body) = response.body else {
            return Ok(vec![]);
        };

        extract_items(body, &query.container)
            .into_iter()
            .map(|raw| self.scoped_resource(raw, query.path_params.clone()))
            .collect()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure(&self, operation: Operation) -> Result<()> {
        if self.descriptor.supports(operation) {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation {
                resource: self.resource_name().to_string(),
                operation,
            })
        }
    }

    fn render_path(
        &self,
        operation: Operation,
        params: &Params,
        id: Option<&ResourceId>,
    ) -> Result<Rendered> {
        let template = self.descriptor.path_template(operation);
        let id = id.map(ResourceId::to_string);
        render_template(&template, params, id.as_deref(), true)
            .map_err(|missing| self.missing_param(&missing))
    }

    fn query(&self, path: Rendered, container: Rendered, params: &Params) -> Query {
        let mut consumed = path.consumed;
        consumed.extend(container.consumed);

        let path_params = only(params, &consumed);
        let mut params = without(params, &consumed);
        for (k, v) in &self.descriptor.filter_params {
            params.entry(k.clone()).or_insert_with(|| v.clone());
        }

        Query {
            path: path.value,
            container: container.value,
            params,
            path_params,
        }
    }

    fn fall_back_or(&self, error: Error) -> Result<ResultSet> {
        if self.descriptor.filter_optional {
            tracing::warn!("{}; falling back to all()", error);
            return self.all(Params::new());
        }
        Err(error)
    }

    fn payload(&self, fields: Params) -> Value {
        let mut payload = Map::new();
        payload.insert(self.descriptor.single_key().to_string(), Value::Object(fields));
        Value::Object(payload)
    }

    /// Replace `{"path": ...}` upload entries with server tokens
    async fn resolve_uploads(&self, mut fields: Params) -> Result<Params> {
        let Some(Value::Array(uploads)) = fields.remove("uploads") else {
            return Ok(fields);
        };

        let mut resolved = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let Value::Object(mut entry) = upload else {
                resolved.push(upload);
                continue;
            };
            let Some(Value::String(path)) = entry.remove("path") else {
                resolved.push(Value::Object(entry));
                continue;
            };

            let token = self.session.upload(Path::new(&path)).await?;
            entry.insert("token".to_string(), Value::String(token));
            if !entry.contains_key("filename") {
                if let Some(name) = Path::new(&path).file_name() {
                    entry.insert(
                        "filename".to_string(),
                        Value::String(name.to_string_lossy().into_owned()),
                    );
                }
            }
            resolved.push(Value::Object(entry));
        }

        fields.insert("uploads".to_string(), Value::Array(resolved));
        Ok(fields)
    }

    /// Turn server failures into errors; 2xx bodies may still carry `errors`
    fn check(&self, response: &ApiResponse) -> Result<()> {
        let messages = error_messages(response.body.as_ref());

        if response.status == 422 || (response.is_success() && !messages.is_empty()) {
            let messages = if messages.is_empty() {
                vec!["rejected by server".to_string()]
            } else {
                messages
            };
            return Err(Error::Validation {
                resource: self.resource_name().to_string(),
                status: Some(response.status),
                messages,
            });
        }

        if !response.is_success() {
            return Err(Error::Http {
                resource: self.resource_name().to_string(),
                status: response.status,
            });
        }

        Ok(())
    }

    fn extract_single(&self, response: ApiResponse) -> Option<Value> {
        match response.body {
            Some(Value::Object(mut body)) => body
                .remove(self.descriptor.single_key())
                .filter(Value::is_object),
            _ => None,
        }
    }

    fn not_found(&self, id: &ResourceId) -> Error {
        Error::Validation {
            resource: self.resource_name().to_string(),
            status: Some(404),
            messages: vec![format!("{} {} not found", self.resource_name(), id)],
        }
    }

    fn missing_param(&self, name: &str) -> Error {
        Error::local_validation(
            self.resource_name(),
            format!("missing required parameter '{}'", name),
        )
    }

    fn filter_error(&self, filter: &str) -> Error {
        Error::Filter {
            resource: self.resource_name().to_string(),
            filter: filter.to_string(),
        }
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resource", &self.resource_name())
            .finish()
    }
}
