// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory [`KeyValueStore`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;

use super::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local store. Expired entries are dropped when next looked up.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use homegate::store::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set("greeting", "hello", Some(Duration::from_secs(60))).unwrap();
/// assert_eq!(store.get::<String>("greeting").unwrap().as_deref(), Some("hello"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub(crate) fn get_value_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub(crate) fn set_value_at(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl
            .map(|ttl| {
                chrono::Duration::from_std(ttl)
                    .map(|ttl| now + ttl)
                    .map_err(|e| StoreError::Backend(format!("invalid ttl: {e}")))
            })
            .transpose()?;

        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_value(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get_value_at(key, Utc::now()))
    }

    fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.set_value_at(key, value, ttl, Utc::now())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().clear();
        Ok(())
    }
}
