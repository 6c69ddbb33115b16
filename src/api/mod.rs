//! REST client module for the managed event store.
//!
//! This module provides the `StoreClient` for reading events and writing
//! events/registrations through the hosted backend's REST interface.
//!
//! The store authenticates every request with the project's publishable
//! key, sent as both the `apikey` header and a bearer token.

pub mod client;
pub mod error;

pub use client::{StoreClient, StoreConfig};
pub use error::ApiError;
