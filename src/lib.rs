//! Proteus binds controllers onto an async HTTP server.
//!
//! A controller is a plain type whose `impl` block is marked with
//! `#[controller]`; each of its public methods carrying a verb marker
//! becomes a route.  Method parameters are pulled out of the request by the
//! extractors in [`extract`], according to their markers and types, and the
//! return value is written back as raw bytes, JSON, or a [`Response`].
//! Proteus is based on hyper and Tokio.
//!
//! # Examples
//! ```rust,no_run
//! use proteus::{controller, BadInput, Server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct User {
//!     id: i64,
//! }
//!
//! struct Users;
//!
//! #[controller(path = "/users")]
//! impl Users {
//!     #[get]
//!     #[path("/{id}")]
//!     pub async fn get_user(&self, #[path_param] id: i64) -> User {
//!         User { id }
//!     }
//!
//!     #[post]
//!     pub fn create(&self, user: User) -> Result<User, BadInput> {
//!         Ok(user)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anyhow::Error> {
//!     let mut server = Server::new(ServerConfig::default());
//!     server.mount(Arc::new(Users))?;
//!     server.listen().await?;
//!     Ok(())
//! }
//! ```
#![deny(clippy::correctness)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
extern crate async_trait;
extern crate self as proteus;

mod codec;
mod config;
mod data;
mod endpoint;
pub mod endpoints;
mod entity;
mod error;
mod exchange;
pub mod extract;
pub mod handler;
pub mod metadata;
pub mod middleware;
mod request;
mod response;
mod router;
mod server;

pub use self::codec::Codec;
pub use self::config::ServerConfig;
pub use self::data::{DataStream, DataTransfer};
pub use self::endpoint::Endpoint;
pub use self::entity::HttpEntity;
pub use self::error::{BadInput, BindError, HandlerError, ProteusError};
pub use self::exchange::{BodyAttachment, Exchange, FormData, FormValue, UploadedFile};
pub use self::extract::FileBytes;
pub use self::handler::{Controller, Reply};
pub use self::metadata::Verb;
pub use self::middleware::Middleware;
pub use self::request::{Fragment, Request};
pub use self::response::{IntoResponse, Response};
pub use self::router::Router;
pub use self::server::Server;

#[cfg(feature = "derive")]
pub use proteus_derive::controller;

#[must_use]
#[inline]
/// This creates a new HTTP router.  This is a shortcut for [`Router::default`].
pub fn http() -> Router {
    Router::default()
}
