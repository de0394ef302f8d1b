// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted discovery results and added devices.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::StoreError;
use crate::model::DiscoveredDevice;

use super::KeyValueStore;

/// Key of the last discovery snapshot.
pub const LAST_SNAPSHOT_KEY: &str = "discovery.last_snapshot";

/// Key of the devices the user added.
pub const ADDED_DEVICES_KEY: &str = "devices.added";

/// How long a discovery snapshot stays usable.
pub const LAST_SNAPSHOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Repository of discovered and added devices.
///
/// # Examples
///
/// ```
/// use homegate::model::{DeviceType, DiscoveredDevice};
/// use homegate::store::{DeviceRepository, MemoryStore};
///
/// let repository = DeviceRepository::new(MemoryStore::new());
/// let lamp = DiscoveredDevice::new("lamp", "Lamp", DeviceType::SmartLight);
///
/// repository.add_device(&lamp).unwrap();
/// let marked = repository.mark_added(vec![lamp]).unwrap();
/// assert!(marked[0].is_already_added);
/// ```
#[derive(Debug)]
pub struct DeviceRepository<S> {
    store: S,
}

impl<S: KeyValueStore> DeviceRepository<S> {
    /// Creates a repository on top of `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a discovery snapshot, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn save_discovery_snapshot(&self, devices: &[DiscoveredDevice]) -> Result<(), StoreError> {
        self.store
            .set(LAST_SNAPSHOT_KEY, devices, Some(LAST_SNAPSHOT_TTL))?;
        tracing::debug!(devices = devices.len(), "Saved discovery snapshot");
        Ok(())
    }

    /// Returns the last persisted snapshot with `is_already_added` refreshed.
    ///
    /// Empty when no snapshot was saved or it expired.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds an undecodable snapshot.
    pub fn last_discovery_snapshot(&self) -> Result<Vec<DiscoveredDevice>, StoreError> {
        let devices = self
            .store
            .get::<Vec<DiscoveredDevice>>(LAST_SNAPSHOT_KEY)?
            .unwrap_or_default();
        self.mark_added(devices)
    }

    /// Returns the devices the user added.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or holds an undecodable list.
    pub fn added_devices(&self) -> Result<Vec<DiscoveredDevice>, StoreError> {
        Ok(self.store.get(ADDED_DEVICES_KEY)?.unwrap_or_default())
    }

    /// Records `device` as added, replacing an earlier record with the same id.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn add_device(&self, device: &DiscoveredDevice) -> Result<(), StoreError> {
        let mut added = self.added_devices()?;
        let mut device = device.clone();
        device.is_already_added = true;

        match added.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device,
            None => added.push(device),
        }

        self.store.set(ADDED_DEVICES_KEY, &added, None)
    }

    /// Forgets an added device. Returns `false` if it was not added.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn remove_device(&self, device_id: &str) -> Result<bool, StoreError> {
        let mut added = self.added_devices()?;
        let before = added.len();
        added.retain(|d| d.id != device_id);
        if added.len() == before {
            return Ok(false);
        }
        self.store.set(ADDED_DEVICES_KEY, &added, None)?;
        Ok(true)
    }

    /// Returns `true` if the device was added.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn is_added(&self, device_id: &str) -> Result<bool, StoreError> {
        Ok(self.added_devices()?.iter().any(|d| d.id == device_id))
    }

    /// Sets `is_already_added` on each device from the added list.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn mark_added(&self, mut devices: Vec<DiscoveredDevice>) -> Result<Vec<DiscoveredDevice>, StoreError> {
        let added: HashSet<String> = self.added_devices()?.into_iter().map(|d| d.id).collect();
        for device in &mut devices {
            device.is_already_added = added.contains(&device.id);
        }
        Ok(devices)
    }

    /// Drops the snapshot and the added list.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(LAST_SNAPSHOT_KEY)?;
        self.store.remove(ADDED_DEVICES_KEY)
    }
}
