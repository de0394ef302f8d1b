// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence above the live pipeline.
//!
//! The streaming core never touches storage. [`DeviceRepository`] is the
//! layer that keeps discovery results and the user's added devices across
//! restarts, on top of any [`KeyValueStore`].

mod memory;
mod repository;

pub use memory::MemoryStore;
pub use repository::{ADDED_DEVICES_KEY, DeviceRepository, LAST_SNAPSHOT_KEY, LAST_SNAPSHOT_TTL};

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;

/// A key-value store with optional per-entry expiry.
///
/// Implementations store JSON values; the typed helpers
/// [`get`](Self::get) and [`set`](Self::set) convert through `serde`.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value for `key`, or `None` if missing or expired.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn get_value(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `value` under `key`. With a `ttl` the entry expires after it.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn clear(&self) -> Result<(), StoreError>;

    /// Returns `true` if `key` holds an unexpired value.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_value(key)?.is_some())
    }

    /// Returns the value for `key` decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the stored value is not a `T`.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        Self: Sized,
    {
        self.get_value(key)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if `value` cannot be encoded.
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.set_value(key, serde_json::to_value(value)?, ttl)
    }
}
