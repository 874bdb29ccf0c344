//! `rmine` is a client for the Redmine REST API.
//!
//! Resource types (project, issue, user, ...) are rows in an embedded
//! descriptor table rather than Rust types. A single generic
//! [`ResourceManager`] validates calls against that table, and collections come
//! back as lazy [`ResultSet`]s that only hit the network when they are read.
//!
//! ```ignore
//! use rmine::{Auth, Redmine};
//!
//! # async fn run() -> rmine::Result<()> {
//! let client = Redmine::new("https://redmine.example.com", Auth::ApiKey("secret".into()))?;
//! let projects = client.manager("project")?.all(Default::default())?;
//! let first_page = projects.slice(..25);
//! for project in first_page.iter().await? {
//!     println!("{project}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod resource;

pub use api::{Auth, Redmine, Transport};
pub use config::Config;
pub use error::{Error, Result};
pub use resource::{ApiVersion, Params, Resource, ResourceId, ResourceManager, ResultSet};
