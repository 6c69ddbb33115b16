//! Offline asset caching.
//!
//! This module provides the `AssetCache`, a versioned local mirror of the
//! registration site's fixed asset manifest with two request policies:
//!
//! - navigations: network first, cache fallback, root-document fallback
//! - assets: cache first, network fallback (not stored)
//!
//! The cache layer shares no state with the event controller.

pub mod manager;

pub use manager::{AssetCache, ASSET_MANIFEST, CACHE_NAME};
