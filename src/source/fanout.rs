// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delivery of one pipeline's output to every open stream.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Live consumers of a pipeline.
///
/// Closed consumers are pruned on the next emission.
#[derive(Debug)]
pub(crate) struct Consumers<T> {
    senders: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Consumers<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Adds a consumer and returns its stream.
    pub(crate) fn attach(&self) -> UnboundedReceiverStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        UnboundedReceiverStream::new(rx)
    }

    /// Sends `value` to every live consumer and returns how many received it.
    pub(crate) fn emit(&self, value: &T) -> usize {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(value.clone()).is_ok());
        senders.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }
}
