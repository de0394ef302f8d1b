// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live device streams built on the broker connection.
//!
//! # Architecture
//!
//! ```text
//! ConnectionManager ──route──▶ handler (one per topic pattern)
//!                                 │ parse
//!                                 ▼
//!                      DiscoveryCache / StateCache
//!                                 │ emit
//!                                 ▼
//!                   every open stream of that pipeline
//! ```
//!
//! Dropping a stream does not unsubscribe: the handlers keep updating the
//! caches until [`DeviceDataSource::disconnect`] or
//! [`DeviceDataSource::unsubscribe_all`] is called. Dropping the
//! [`DeviceDataSource`] releases its handlers and ends every stream it
//! returned.

mod data_source;
mod fanout;

pub use data_source::{DeviceDataSource, DeviceStream};
