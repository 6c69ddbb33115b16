//! Versioned offline mirror of the registration site's fixed asset set.
//!
//! Each cache version is a directory under the platform cache dir; entries
//! are files keyed by a sanitized request path. Bumping `CACHE_NAME` is the
//! sole invalidation mechanism: `activate` deletes every namespace whose
//! name differs from the current one.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current cache version. Bump on any change to the mirrored site shell.
pub const CACHE_NAME: &str = "fetecache-v2";

/// Fixed manifest of site assets fetched on install.
pub const ASSET_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/style.css",
    "/app.js",
    "/supabase.js",
    "/manifest.json",
    "/favicon-32.png",
    "/icon-192.png",
    "/icon-512.png",
];

/// Fallback document for navigations that miss both network and cache
const ROOT_DOCUMENT: &str = "/index.html";

/// Install stamp file name inside the cache namespace
const STAMP_FILE: &str = ".installed.json";

/// Maximum concurrent fetches during install.
/// The manifest is small; 4 keeps install quick without hammering the host.
const MAX_CONCURRENT_FETCHES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstallStamp {
    installed_at: DateTime<Utc>,
    entries: usize,
}

/// Map a request path to a file name within the cache namespace.
/// The root path gets a reserved name; separators and anything else
/// unsafe in a file name collapse to underscores.
fn cache_key(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return "__root__".to_string();
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct AssetCache {
    /// Parent directory holding all versioned namespaces
    root: PathBuf,
    /// Name of the namespace this instance reads and writes
    name: String,
}

impl AssetCache {
    pub fn new(root: PathBuf) -> Result<Self> {
        Self::with_name(root, CACHE_NAME)
    }

    pub fn with_name(root: PathBuf, name: &str) -> Result<Self> {
        let cache = Self {
            root,
            name: name.to_string(),
        };
        std::fs::create_dir_all(cache.dir())
            .with_context(|| format!("Failed to create cache namespace {}", name))?;
        Ok(cache)
    }

    fn dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn entry_path(&self, path: &str) -> PathBuf {
        self.dir().join(cache_key(path))
    }

    /// Store a response body under the given request path
    pub fn store(&self, path: &str, body: &[u8]) -> Result<()> {
        std::fs::write(self.entry_path(path), body)
            .with_context(|| format!("Failed to cache {}", path))
    }

    /// Cached body for a request path, if present.
    /// Read errors degrade to a miss.
    pub fn lookup(&self, path: &str) -> Option<Vec<u8>> {
        let entry = self.entry_path(path);
        if !entry.exists() {
            return None;
        }
        match std::fs::read(&entry) {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(path, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    async fn fetch(client: &Client, origin: &str, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}", origin.trim_end_matches('/'), path);
        let response = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            bail!("{} returned {}", url, response.status());
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Populate the namespace from the fixed manifest.
    /// Failure to fetch any listed asset fails the whole installation and
    /// writes nothing; the namespace is usable as soon as this returns.
    pub async fn install(&self, client: &Client, origin: &str) -> Result<usize> {
        let results: Vec<Result<(&str, Vec<u8>)>> = stream::iter(ASSET_MANIFEST.iter().copied())
            .map(|path| {
                let client = client.clone();
                let origin = origin.to_string();
                async move {
                    let body = Self::fetch(&client, &origin, path)
                        .await
                        .with_context(|| format!("Install failed on manifest asset {}", path))?;
                    Ok((path, body))
                }
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut bodies = Vec::with_capacity(results.len());
        for result in results {
            bodies.push(result?);
        }
        for (path, body) in &bodies {
            self.store(path, body)?;
        }

        let stamp = InstallStamp {
            installed_at: Utc::now(),
            entries: ASSET_MANIFEST.len(),
        };
        std::fs::write(
            self.dir().join(STAMP_FILE),
            serde_json::to_string_pretty(&stamp)?,
        )?;

        debug!(entries = ASSET_MANIFEST.len(), cache = %self.name, "Asset cache installed");
        Ok(ASSET_MANIFEST.len())
    }

    /// Delete every sibling namespace whose name differs from the current
    /// version. Takes effect immediately for subsequent requests.
    pub fn activate(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        for entry in std::fs::read_dir(&self.root).context("Failed to enumerate cache root")? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name != self.name {
                std::fs::remove_dir_all(entry.path())
                    .with_context(|| format!("Failed to delete stale cache {}", name))?;
                debug!(cache = %name, "Stale cache deleted");
                removed.push(name);
            }
        }

        Ok(removed)
    }

    /// Page-load policy: network first. A fresh response is stored under
    /// the exact request path before being returned; on transport failure
    /// the cached match is served, then the cached root document, and only
    /// when all three miss does the original error surface.
    pub async fn fetch_navigation(
        &self,
        client: &Client,
        origin: &str,
        path: &str,
    ) -> Result<Vec<u8>> {
        match Self::fetch(client, origin, path).await {
            Ok(body) => {
                if let Err(e) = self.store(path, &body) {
                    warn!(path, error = %e, "Failed to update cached copy");
                }
                Ok(body)
            }
            Err(e) => {
                debug!(path, error = %e, "Navigation fetch failed, trying cache");
                self.lookup(path)
                    .or_else(|| self.lookup(ROOT_DOCUMENT))
                    .ok_or_else(|| e.context("Offline with no cached copy"))
            }
        }
    }

    /// Asset policy: cache first. Misses fall through to the network and
    /// the result is not stored.
    pub async fn fetch_asset(&self, client: &Client, origin: &str, path: &str) -> Result<Vec<u8>> {
        if let Some(cached) = self.lookup(path) {
            return Ok(cached);
        }
        Self::fetch(client, origin, path).await
    }

    /// Age of the last completed install, for display
    pub fn installed_age(&self) -> Option<String> {
        let contents = std::fs::read_to_string(self.dir().join(STAMP_FILE)).ok()?;
        let stamp: InstallStamp = serde_json::from_str(&contents).ok()?;
        Some(age_display(stamp.installed_at))
    }
}

/// Human-readable age of a timestamp: "just now", "5m ago", "2h ago", "3d ago"
pub fn age_display(at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - at).num_minutes();
    if minutes < 1 {
        // Covers clock skew too
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}
