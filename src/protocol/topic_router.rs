// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handler table and inbound message dispatch.
//!
//! # Architecture
//!
//! ```text
//! MQTT Message: devices/123/status → {"online":true}
//!                     ↓
//!             TopicRouter.route()
//!                     ↓
//!     Exact handler for "devices/123/status"?
//!          yes ↙              ↘ no
//!   invoke it alone     invoke every "+"-pattern that matches
//!                     ↓
//!        nothing matched → debug log, drop
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::config::DispatchPolicy;
use crate::subscription::{MessageHandler, SubscriptionHandle, SubscriptionId};
use crate::topic::matches;

use super::MqttMessage;

struct Registration {
    id: SubscriptionId,
    handler: MessageHandler,
}

/// Routes inbound messages to handlers registered by topic pattern.
///
/// One handler is kept per exact pattern string; registering a pattern again
/// replaces the previous handler.
pub struct TopicRouter {
    policy: DispatchPolicy,
    next_id: AtomicU64,
    handlers: RwLock<HashMap<String, Registration>>,
}

impl TopicRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `handler` for `pattern`, replacing any previous handler.
    pub fn register(&self, pattern: impl Into<String>, handler: MessageHandler) -> SubscriptionHandle {
        let pattern = pattern.into();
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let replaced = self
            .handlers
            .write()
            .insert(pattern.clone(), Registration { id, handler })
            .is_some();

        tracing::debug!(pattern = %pattern, %id, replaced, "Registered topic handler");
        SubscriptionHandle::new(pattern, id)
    }

    /// Removes the handler registered by `handle`.
    ///
    /// Returns `false` if the pattern is unknown or its handler was replaced
    /// by a later registration.
    pub fn unregister(&self, handle: &SubscriptionHandle) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.get(handle.pattern()) {
            Some(registration) if registration.id == handle.id() => {
                handlers.remove(handle.pattern());
                tracing::debug!(pattern = %handle.pattern(), "Unregistered topic handler");
                true
            }
            _ => false,
        }
    }

    /// Dispatches a message and returns how many handlers ran.
    ///
    /// Handlers are invoked after the table lock is released, so a handler
    /// may register further subscriptions.
    pub fn route(&self, message: &MqttMessage) -> usize {
        let matched = self.matching_handlers(&message.topic);

        if matched.is_empty() {
            tracing::debug!(topic = %message.topic, "No handler for topic, dropping message");
            return 0;
        }

        for handler in &matched {
            handler(message);
        }
        matched.len()
    }

    fn matching_handlers(&self, topic: &str) -> Vec<MessageHandler> {
        let handlers = self.handlers.read();

        if self.policy == DispatchPolicy::ExactFirst
            && let Some(exact) = handlers.get(topic)
        {
            return vec![exact.handler.clone()];
        }

        handlers
            .iter()
            .filter(|(pattern, _)| pattern.as_str() == topic || matches(pattern, topic))
            .map(|(_, registration)| registration.handler.clone())
            .collect()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Returns the registered patterns.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Returns `true` if a handler is registered for exactly `pattern`.
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.handlers.read().contains_key(pattern)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl std::fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRouter")
            .field("policy", &self.policy)
            .field("patterns", &self.patterns())
            .finish()
    }
}
