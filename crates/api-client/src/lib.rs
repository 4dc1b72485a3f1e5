//! Client for the file service API.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Covers the chunk upload endpoint and the file listing, metadata,
//! download and delete endpoints.

pub mod client;
pub mod disposition;

pub use client::{Client, Error};
pub use disposition::filename_from_disposition;
