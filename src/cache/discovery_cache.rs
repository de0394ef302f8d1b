// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TTL-bounded store of discovered devices.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::model::DiscoveredDevice;

/// Age after which a discovered device is forgotten.
pub const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(300);

/// Maximum number of discovered devices kept.
pub const DEFAULT_DISCOVERY_CAPACITY: usize = 256;

/// Store of discovered devices, de-duplicated by id.
///
/// Entries keep their insertion order; replacing an entry keeps its
/// position. Expired entries (older than the TTL) are swept lazily on every
/// insert and every read, there is no background timer.
///
/// # Examples
///
/// ```
/// use homegate::cache::DiscoveryCache;
/// use homegate::model::{DeviceType, DiscoveredDevice};
///
/// let cache = DiscoveryCache::new();
/// cache.upsert(DiscoveredDevice::new("lamp", "Lamp", DeviceType::SmartLight));
/// cache.upsert(DiscoveredDevice::new("lamp", "Desk Lamp", DeviceType::SmartLight));
///
/// let devices = cache.read_all();
/// assert_eq!(devices.len(), 1);
/// assert_eq!(devices[0].name, "Desk Lamp");
/// ```
#[derive(Debug)]
pub struct DiscoveryCache {
    ttl: chrono::Duration,
    capacity: usize,
    entries: Mutex<Vec<DiscoveredDevice>>,
}

impl DiscoveryCache {
    /// Creates a cache with the default TTL and capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_DISCOVERY_TTL, DEFAULT_DISCOVERY_CAPACITY)
    }

    /// Creates a cache with a custom TTL and capacity.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            capacity: capacity.max(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Inserts or replaces a device and returns the resulting snapshot.
    ///
    /// A device with a known id replaces the existing entry in place; a new
    /// id is appended. Expired entries are then evicted, and if the cache is
    /// still over capacity the oldest entries are dropped.
    pub fn upsert(&self, device: DiscoveredDevice) -> Vec<DiscoveredDevice> {
        self.upsert_at(device, Utc::now())
    }

    pub(crate) fn upsert_at(
        &self,
        device: DiscoveredDevice,
        now: DateTime<Utc>,
    ) -> Vec<DiscoveredDevice> {
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.iter_mut().find(|d| d.id == device.id) {
            *existing = device;
        } else {
            entries.push(device);
        }

        self.evict_expired(&mut entries, now);
        self.enforce_capacity(&mut entries);
        entries.clone()
    }

    /// Returns every device that has not expired.
    #[must_use]
    pub fn read_all(&self) -> Vec<DiscoveredDevice> {
        self.read_all_at(Utc::now())
    }

    pub(crate) fn read_all_at(&self, now: DateTime<Utc>) -> Vec<DiscoveredDevice> {
        let mut entries = self.entries.lock();
        self.evict_expired(&mut entries, now);
        entries.clone()
    }

    /// Removes a device by id and returns the remaining snapshot.
    ///
    /// Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> Vec<DiscoveredDevice> {
        let mut entries = self.entries.lock();
        entries.retain(|d| d.id != id);
        self.evict_expired(&mut entries, Utc::now());
        entries.clone()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn evict_expired(&self, entries: &mut Vec<DiscoveredDevice>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|d| d.age(now) <= self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired discovered devices");
        }
    }

    fn enforce_capacity(&self, entries: &mut Vec<DiscoveredDevice>) {
        while entries.len() > self.capacity {
            let Some(oldest) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, d)| d.discovered_at)
                .map(|(i, _)| i)
            else {
                break;
            };
            let dropped = entries.remove(oldest);
            tracing::debug!(device = %dropped.id, "Discovery cache full, dropped oldest device");
        }
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new()
    }
}
