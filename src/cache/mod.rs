// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory caches for discovered devices and device state.
//!
//! Each cache guards its own entries with its own lock so the discovery and
//! state pipelines never contend with each other.

mod discovery_cache;
mod state_cache;

pub use discovery_cache::{DEFAULT_DISCOVERY_CAPACITY, DEFAULT_DISCOVERY_TTL, DiscoveryCache};
pub use state_cache::StateCache;
