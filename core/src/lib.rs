//! Async client SDK for the shop REST API.
//!
//! # Overview
//! Every remote call returns an `Outcome<T>` (`Result<T, ApiError>`); nothing
//! panics on a bad response. A `Session` owns the configuration, the
//! persisted authentication token and the request executor. `global` offers
//! an optional process-wide session.
//!
//! # Design
//! - `endpoint` is a static table describing each remote operation.
//! - `executor` builds requests from that table, sends them through a
//!   `Transport`, and unwraps the response envelope with an explicit decoder.
//! - `session` exposes one thin async method per operation.
//! - `token_store` keeps zero or one token behind a mutex, persisted to a
//!   JSON file by default.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.
//!
//! ```rust,ignore
//! use shop_core::{Config, Session};
//!
//! let session = Session::new(Config::new("https://api.shop.example.com/api/v1/"))?;
//! session.login("a@b.com", "pw").await?;
//! let products = session.get_products(None).await?;
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod global;
pub mod http;
pub mod query;
pub mod session;
pub mod token_store;
pub mod transport;
pub mod types;

pub use config::{Config, TokenStorage};
pub use endpoint::{Endpoint, ResponseShape};
pub use error::{ApiError, ConfigError, Outcome, StorageError, UninitializedError};
pub use executor::{decode, Decode, RequestExecutor, RequestParts};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{OrderFilter, ProductFilter, QueryFilter, TransactionFilter};
pub use session::Session;
pub use token_store::{FileStore, KeyValueStore, MemoryStore, TokenStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::*;
