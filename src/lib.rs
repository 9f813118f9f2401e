// Copyright 2025 Google LLC
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

//! # Async Request Batcher
//!
//! An asynchronous **request-batching coalescer** built on top of [`tokio`],
//! plus the HTTP reverse proxy that fronts it.
//!
//! Many concurrent callers submit individual requests; the batcher groups
//! them into bounded batches, dispatches each batch to a user-supplied batch
//! handler, and routes each element of the handler's response back to the
//! caller that submitted the corresponding input.
//!
//! ## Core Concepts
//!
//! - A [`batcher::RequestBatcher<R, S>`](batcher::RequestBatcher) accepts
//!   single requests of type `R` and resolves each submission to a response
//!   of type `S`.
//! - A batch is sent when it reaches `max_batch_size` or when `batch_timeout`
//!   has elapsed since its first submission, whichever comes first.
//! - The [`batcher::SendFn`] handler is invoked once per batch with the
//!   ordered payload sequence and must return one response per input, in
//!   order. Dispatch runs on its own task, so the next batch accumulates
//!   while the previous one is in flight.
//! - The [`server`] module exposes the batcher over HTTP: one JSON value per
//!   POST in, that caller's JSON value back out. The [`transport`] module
//!   ships each batch to the backend as a single JSON array.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_request_batcher::batcher::{BatchingConfig, RequestBatcher};
//! use futures::FutureExt;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // A handler that echoes each batch back unchanged.
//!     let config = BatchingConfig {
//!         max_batch_size: 32,
//!         batch_timeout: Duration::from_millis(10),
//!         send: Arc::new(|batch: Vec<String>| {
//!             async move { Ok::<_, anyhow::Error>(batch) }.boxed()
//!         }),
//!     };
//!
//!     let batcher = RequestBatcher::new(CancellationToken::new(), config)?;
//!
//!     // Submit a single request; it resolves once its batch completes.
//!     let response = batcher
//!         .submit("hello".to_string(), Duration::from_secs(1))
//!         .await?;
//!
//!     println!("Response: {response}");
//!     Ok(())
//! }
//! ```
//!
//! ## When to Use
//!
//! - Fronting a backend that is much cheaper per item when called with
//!   **batches** (model inference, bulk lookups) behind a per-request API
//! - Coalescing chatty concurrent producers onto a bounded number of
//!   downstream calls without losing per-caller request/response semantics
//!
//! ## Limitations
//!
//! - Responses map to requests **by position only**; the backend must
//!   preserve order and length.
//! - No retries across batches: a failed batch fails every caller in it.
//!
//! ## License
//!
//! Licensed under [Apache 2.0](https://www.apache.org/licenses/LICENSE-2.0).
mod constants;

pub mod args;
pub mod batcher;
pub mod error;
pub mod server;
pub mod transport;
