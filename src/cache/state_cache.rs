// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Latest-value-wins device state store.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::DeviceState;

/// Per-device state store.
///
/// `upsert` overwrites unconditionally: records are ordered by arrival, not
/// by their timestamps, so a late out-of-order message replaces a newer one.
#[derive(Debug, Default)]
pub struct StateCache {
    entries: RwLock<HashMap<String, DeviceState>>,
}

impl StateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `state`, replacing any previous state for the same device.
    pub fn upsert(&self, state: DeviceState) {
        self.entries.write().insert(state.device_id.clone(), state);
    }

    /// Returns the current state of a device.
    #[must_use]
    pub fn read(&self, device_id: &str) -> Option<DeviceState> {
        self.entries.read().get(device_id).cloned()
    }

    /// Returns the state of every known device.
    #[must_use]
    pub fn read_all(&self) -> Vec<DeviceState> {
        self.entries.read().values().cloned().collect()
    }

    /// Forgets a device. Returns `true` if it was known.
    pub fn remove(&self, device_id: &str) -> bool {
        self.entries.write().remove(device_id).is_some()
    }

    /// Forgets every device.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no device is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceType;

    #[test]
    fn read_unknown_is_none() {
        let cache = StateCache::new();
        assert!(cache.read("nope").is_none());
    }

    #[test]
    fn upsert_then_read() {
        let cache = StateCache::new();
        cache.upsert(DeviceState::new("a", DeviceType::SmartPlug, true));
        let state = cache.read("a").unwrap();
        assert!(state.is_online);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn last_write_wins_regardless_of_timestamp() {
        let cache = StateCache::new();
        let newer = DeviceState::new("a", DeviceType::SmartPlug, true);
        let mut older = DeviceState::new("a", DeviceType::SmartPlug, false);
        older.last_update = newer.last_update - chrono::Duration::seconds(60);

        cache.upsert(newer);
        cache.upsert(older);

        assert!(!cache.read("a").unwrap().is_online);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entries_are_independent() {
        let cache = StateCache::new();
        cache.upsert(DeviceState::new("a", DeviceType::SmartPlug, true));
        cache.upsert(DeviceState::new("b", DeviceType::SmartLock, false));

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(cache.read("b").is_some());
        assert_eq!(cache.read_all().len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
