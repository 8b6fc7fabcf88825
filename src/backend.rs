//! Cache Backend Module
//!
//! Defines the capability contract every wrapped cache must satisfy, plus a
//! minimal in-memory reference backend used by the test suite.

use std::collections::{BTreeMap, HashMap};

use crate::error::{CacheError, Result};

// == Default Version ==
/// Key version applied when the caller passes `None`.
pub const DEFAULT_VERSION: u32 = 1;

// == Cache Backend Trait ==
/// The capability contract for a wrapped cache.
///
/// Absence is always an explicit marker (`None` / empty mapping entry), never
/// a reused falsy sentinel: a stored `"0"` or `""` is `Some(..)` and must be
/// distinguishable from a missing key.
///
/// `ttl` is a time-to-live in seconds; `version` namespaces keys so the same
/// logical key can hold independent values per version.
pub trait CacheBackend {
    /// Stores `value` under `key` only if the key is absent.
    ///
    /// Returns `true` if the value was stored, `false` if the key existed.
    fn add(
        &mut self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<bool>;

    /// Retrieves the value stored under `key`, or `None` if absent.
    fn get(&mut self, key: &str, version: Option<u32>) -> Result<Option<String>>;

    /// Stores `value` under `key`, overwriting any existing value.
    fn set(
        &mut self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<()>;

    /// Removes `key`. Returns `true` if a value was removed.
    fn delete(&mut self, key: &str, version: Option<u32>) -> Result<bool>;

    /// Retrieves several keys at once.
    ///
    /// The result contains one entry per requested key, mapped to the stored
    /// value or `None` if that key is absent.
    fn get_many(
        &mut self,
        keys: &[String],
        version: Option<u32>,
    ) -> Result<BTreeMap<String, Option<String>>>;

    /// Stores several key-value pairs at once.
    fn set_many(
        &mut self,
        entries: &[(String, String)],
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<()>;

    /// Removes several keys at once. Absent keys are ignored.
    fn delete_many(&mut self, keys: &[String], version: Option<u32>) -> Result<()>;

    /// Returns `true` if `key` currently holds a value.
    fn has_key(&mut self, key: &str, version: Option<u32>) -> Result<bool>;

    /// Increments the numeric value under `key` by `delta`.
    ///
    /// Fails with [`CacheError::NotFound`] if the key is absent and
    /// [`CacheError::InvalidValue`] if the stored value is not an integer.
    fn incr(&mut self, key: &str, delta: i64, version: Option<u32>) -> Result<i64>;

    /// Decrements the numeric value under `key` by `delta`.
    fn decr(&mut self, key: &str, delta: i64, version: Option<u32>) -> Result<i64>;

    /// Removes every entry.
    fn clear(&mut self) -> Result<()>;
}

// == Memory Cache ==
/// Minimal in-memory backend.
///
/// Exists so the observation layer can be exercised without a real cache
/// deployment; it implements the full contract over a HashMap but has no
/// eviction policy and ignores `ttl`. Not intended for production storage.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, String>,
}

impl MemoryCache {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of stored entries, across all versions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Versioned storage key, mirroring how versioned cache clients
    // namespace the raw key.
    fn versioned(key: &str, version: Option<u32>) -> String {
        format!("{}:{}", version.unwrap_or(DEFAULT_VERSION), key)
    }

    fn numeric(&mut self, key: &str, version: Option<u32>) -> Result<i64> {
        let storage_key = Self::versioned(key, version);
        let raw = self
            .entries
            .get(&storage_key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        raw.parse::<i64>().map_err(|e| CacheError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl CacheBackend for MemoryCache {
    fn add(
        &mut self,
        key: &str,
        value: String,
        _ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<bool> {
        let storage_key = Self::versioned(key, version);
        if self.entries.contains_key(&storage_key) {
            return Ok(false);
        }
        self.entries.insert(storage_key, value);
        Ok(true)
    }

    fn get(&mut self, key: &str, version: Option<u32>) -> Result<Option<String>> {
        Ok(self.entries.get(&Self::versioned(key, version)).cloned())
    }

    fn set(
        &mut self,
        key: &str,
        value: String,
        _ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<()> {
        self.entries.insert(Self::versioned(key, version), value);
        Ok(())
    }

    fn delete(&mut self, key: &str, version: Option<u32>) -> Result<bool> {
        Ok(self.entries.remove(&Self::versioned(key, version)).is_some())
    }

    fn get_many(
        &mut self,
        keys: &[String],
        version: Option<u32>,
    ) -> Result<BTreeMap<String, Option<String>>> {
        let mut found = BTreeMap::new();
        for key in keys {
            let value = self.entries.get(&Self::versioned(key, version)).cloned();
            found.insert(key.clone(), value);
        }
        Ok(found)
    }

    fn set_many(
        &mut self,
        entries: &[(String, String)],
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value.clone(), ttl, version)?;
        }
        Ok(())
    }

    fn delete_many(&mut self, keys: &[String], version: Option<u32>) -> Result<()> {
        for key in keys {
            self.entries.remove(&Self::versioned(key, version));
        }
        Ok(())
    }

    fn has_key(&mut self, key: &str, version: Option<u32>) -> Result<bool> {
        Ok(self.entries.contains_key(&Self::versioned(key, version)))
    }

    fn incr(&mut self, key: &str, delta: i64, version: Option<u32>) -> Result<i64> {
        let next = self.numeric(key, version)? + delta;
        self.entries
            .insert(Self::versioned(key, version), next.to_string());
        Ok(next)
    }

    fn decr(&mut self, key: &str, delta: i64, version: Option<u32>) -> Result<i64> {
        self.incr(key, -delta, version)
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
