//! REST API client module for the FEC open data API.
//!
//! This module provides the `FecClient` for read-only GET requests against
//! api.open.fec.gov, the `RemoteSource` seam the cached query layer fetches
//! through, and the fixed endpoint set the dashboard uses.
//!
//! Authentication is a plain API key passed as a query parameter.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::{FecClient, RemoteSource, DEFAULT_BASE_URL};
pub use endpoints::ApiQuery;
pub use error::ApiError;
