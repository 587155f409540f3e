use log::debug;

use crate::errors::CoreError;
use crate::models::price::ResponseCache;

use super::format;

/// Persists the provider response cache between runs.
pub struct CacheStore;

impl CacheStore {
    /// Serialize a cache to PTRC bytes.
    ///
    /// Flow: ResponseCache → bincode → PTRC header + payload
    pub fn save_to_bytes(cache: &ResponseCache) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(cache)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize cache: {e}")))?;
        Ok(format::write_file(format::CURRENT_VERSION, &payload))
    }

    /// Deserialize a cache from PTRC bytes.
    pub fn load_from_bytes(data: &[u8]) -> Result<ResponseCache, CoreError> {
        let (_header, payload) = format::read_file(data)?;
        bincode::deserialize(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize cache: {e}")))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(cache: &ResponseCache, path: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(cache)?;
        std::fs::write(path, bytes)?;
        debug!("Saved {} cached responses to {path}", cache.total_entries());
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<ResponseCache, CoreError> {
        let bytes = std::fs::read(path)?;
        let cache = Self::load_from_bytes(&bytes)?;
        debug!("Loaded {} cached responses from {path}", cache.total_entries());
        Ok(cache)
    }

    /// Load the cache at `path`, or start empty when it is missing or unreadable.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_or_default(path: &str) -> ResponseCache {
        match Self::load_from_file(path) {
            Ok(cache) => cache,
            Err(e) => {
                debug!("Starting with an empty cache ({path}: {e})");
                ResponseCache::new()
            }
        }
    }
}
