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

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = SubmitError> = std::result::Result<T, E>;

/// Errors surfaced to callers of
/// [`RequestBatcher::submit`](crate::batcher::RequestBatcher::submit).
///
/// Handler failures are shared across every subscriber of the failed batch,
/// hence the `Arc` and the `Clone` impl.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    /// The submission was rejected before it was registered into a batch.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller's deadline elapsed before a response was published.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The batch handler returned an error.
    #[error("batch handler failed: {0}")]
    Handler(Arc<anyhow::Error>),

    /// The batch handler returned the wrong number of responses.
    #[error("batch handler returned {got} responses for a batch of {want}")]
    ProtocolMismatch { want: usize, got: usize },

    /// The batcher was stopped while the request was registering or waiting.
    #[error("request batcher has been stopped")]
    Stopped,
}
