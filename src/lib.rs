//! Bookstore inventory client.
//!
//! Typed access to the bookstore REST API with per-kind list state:
//! paging, filtering, search-as-you-type, and mutations that keep the
//! visible page consistent with the server. Also ships an in-memory
//! development backend serving the same API.
//!
//! # Example
//!
//! ```no_run
//! use bookkeep::{Config, Session};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let session = Session::new(&Config::default())?;
//! session.books().refresh().await;
//!
//! for book in session.books().state().items {
//!     println!("{} ({})", book.title, book.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod mutation;
pub mod normalize;
pub mod session;

#[cfg(test)]
mod testing;

pub use ai::AiClient;
pub use catalog::{Catalog, MemoryCatalog};
pub use client::{ApiResult, Http, ResourceApi, ResourceClient};
pub use config::Config;
pub use controller::{FetchOutcome, ListController, ListState, Query, Status};
pub use debounce::{DebouncedSearch, Debouncer};
pub use mutation::MutationCoordinator;
pub use session::Session;
