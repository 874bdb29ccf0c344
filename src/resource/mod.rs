//! Resource abstraction layer
//!
//! This module provides a data-driven approach to Redmine resources.
//! Resource descriptors are loaded from JSON files at compile time, so a new
//! resource type is a table entry rather than new code.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource descriptors from embedded JSON
//! - [`manager`] - Validates and dispatches get/all/filter/create/update/delete
//! - [`resultset`] - Lazy, sliceable, paginated views over collections
//! - [`object`] - Attribute-bearing resources with nested/relation traversal
//!
//! # Resource Definitions
//!
//! Descriptors live in JSON files under `src/resources/`:
//! - `projects.json` - projects and project-scoped types (versions, wiki pages, ...)
//! - `issues.json` - issues, journals, relations, time entries, attachments, queries
//! - `users.json` - users, groups, roles
//! - `catalog.json` - enumerations, statuses, trackers, custom fields
//!
//! # Example
//!
//! ```ignore
//! use rmine::api::Redmine;
//! use serde_json::json;
//!
//! async fn open_issues(client: &Redmine) -> rmine::Result<usize> {
//!     let filters = json!({"project_id": "foo", "status_id": "open"});
//!     let issues = client
//!         .manager("issue")?
//!         .filter(filters.as_object().cloned().unwrap_or_default())?;
//!     issues.len().await
//! }
//! ```

pub mod manager;
pub mod object;
mod registry;
pub mod resultset;
mod version;

pub use manager::{Params, ResourceManager};
pub use object::{Resource, ResourceId};
pub use registry::*;
pub use resultset::{ResultSet, MAX_PAGE_SIZE};
pub use version::ApiVersion;
