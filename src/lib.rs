// Copyright 2022 Ryan Seipp
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `maestro`: a small HTTP/1.1 static-file server built around an edge-triggered readiness
//! monitor, a timer-wheel idle-connection reaper, and a fixed-size worker pool, plus a
//! standalone RFC 1951 DEFLATE decoder used to expand deflate-encoded payloads.
//!
//! The concurrent connection core — [`poll`], [`timer`], [`pool`], [`connection`], and
//! [`dispatcher`] — is the part of this crate worth reading closely. [`http`] is a thin,
//! deliberately unexciting external collaborator: request parsing, response formatting, and
//! static file resolution, with nothing the core depends on beyond the `Connection::task`
//! entry point.

pub mod buffer;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod http;
pub mod inflate;
pub mod net;
pub mod pool;
pub mod poll;
pub mod timer;

pub use config::Config;
pub use dispatcher::Dispatcher;
