//! Redmine API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - The [`Redmine`](client::Redmine) client handing out resource managers
//! - [`http`] - The [`Transport`](http::Transport) seam and its reqwest implementation
//!
//! # Example
//!
//! ```ignore
//! use rmine::api::{Auth, Redmine};
//!
//! async fn example() -> rmine::Result<()> {
//!     let client = Redmine::new("https://redmine.example.com", Auth::ApiKey("secret".into()))?;
//!     let projects = client.manager("project")?.all(Default::default())?;
//!     for project in projects.slice(..10).iter().await? {
//!         println!("{}", project.str_attr("name").unwrap_or("-"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use client::Redmine;
pub use http::{ApiResponse, Auth, HttpTransport, Transport};
