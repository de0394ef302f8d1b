// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handles for topic subscriptions.
//!
//! [`ConnectionManager::subscribe`](crate::protocol::ConnectionManager::subscribe)
//! returns a [`SubscriptionHandle`]. The component that registered the
//! subscription owns the handle and passes it back to
//! [`ConnectionManager::unsubscribe`](crate::protocol::ConnectionManager::unsubscribe)
//! when it shuts down.

use std::fmt;
use std::sync::Arc;

use crate::protocol::MqttMessage;

/// Callback invoked for every message whose topic matches a subscription.
pub type MessageHandler = Arc<dyn Fn(&MqttMessage) + Send + Sync>;

/// Unique identifier for a handler registration.
///
/// IDs are unique within a connection manager's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Token identifying one handler registration for a topic pattern.
///
/// Registering another handler for the same pattern replaces this one; the
/// stale handle then no longer unsubscribes anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pattern: String,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub(crate) fn new(pattern: impl Into<String>, id: SubscriptionId) -> Self {
        Self {
            pattern: pattern.into(),
            id,
        }
    }

    /// Returns the subscribed topic pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the registration id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.pattern)
    }
}
