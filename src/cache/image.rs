//! Image payload cache
//!
//! Keyed by the short token taken from the request (`meos` for the built-in
//! logo, a decimal id for an image stored in the event), so both kinds share
//! one lookup path.

use std::collections::HashMap;
use std::sync::Arc;

/// Cache of raw image bytes, loaded once per token
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<String, Arc<[u8]>>,
    loads: u64,
}

impl ImageCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bytes for `token`, calling `load` on a miss
    ///
    /// Failed loads are not cached.
    pub fn get_or_load<E, F>(&mut self, token: &str, load: F) -> Result<Arc<[u8]>, E>
    where
        F: FnOnce(&str) -> Result<Vec<u8>, E>,
    {
        if let Some(bytes) = self.images.get(token) {
            return Ok(Arc::clone(bytes));
        }
        self.loads += 1;
        let bytes: Arc<[u8]> = load(token)?.into();
        self.images.insert(token.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Whether `token` is cached
    pub fn contains(&self, token: &str) -> bool {
        self.images.contains_key(token)
    }

    /// Number of loader invocations so far
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// Number of cached images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Drop all cached images
    pub fn clear(&mut self) {
        self.images.clear();
    }
}
