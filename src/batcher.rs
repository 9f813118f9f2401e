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

use crate::error::{Result, SubmitError};
use futures::future::BoxFuture;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handler invoked once per batch with the ordered payload sequence.
///
/// Must return one response per input, in the same order. The handler may
/// block for as long as it needs; it never runs under the batcher's mutex,
/// so new submissions keep accumulating while a batch is in flight.
pub type SendFn<R, S> =
    Arc<dyn Fn(Vec<R>) -> BoxFuture<'static, anyhow::Result<Vec<S>>> + Send + Sync>;

/// Determines how batching is done in a [`RequestBatcher`].
pub struct BatchingConfig<R, S> {
    /// Maximum number of submissions per batch.
    pub max_batch_size: usize,

    /// Maximum time a batch may remain open after its first submission.
    pub batch_timeout: Duration,

    /// User-supplied handler for sending a batch request.
    pub send: SendFn<R, S>,
}

type Slot<S> = oneshot::Sender<Result<S>>;

/// A batch awaiting more submissions before the handler is applied to its
/// contents. `body` and `subscribers` are parallel sequences: the caller at
/// index `i` receives the handler's output at index `i`.
struct OpenBatch<R, S> {
    id: u64,
    body: Vec<R>,
    subscribers: Vec<Slot<S>>,
    timer: JoinHandle<()>,
}

struct State<R, S> {
    running: bool,
    cur_batch: Option<OpenBatch<R, S>>,
    next_batch_id: u64,
}

struct Inner<R, S> {
    config: BatchingConfig<R, S>,
    state: Mutex<State<R, S>>,
}

/// Merges concurrent single-request submissions into bounded batches and
/// routes each element of the handler's response back to the caller that
/// submitted the corresponding input.
///
/// A `RequestBatcher` is a cheap handle; clone it freely and call
/// [`submit`](Self::submit) from as many tasks as needed.
pub struct RequestBatcher<R, S> {
    inner: Arc<Inner<R, S>>,
}

impl<R, S> Clone for RequestBatcher<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, S> RequestBatcher<R, S>
where
    R: Send + 'static,
    S: Send + 'static,
{
    /// Creates a new `RequestBatcher` bound to a cancellation scope.
    ///
    /// When `shutdown` fires, the batcher stops: the open batch's timer is
    /// cancelled and its waiting callers unblock with
    /// [`SubmitError::Stopped`]. Batches already handed to the handler are
    /// allowed to complete naturally.
    pub fn new(shutdown: CancellationToken, config: BatchingConfig<R, S>) -> anyhow::Result<Self> {
        anyhow::ensure!(config.max_batch_size >= 1, "max batch size must be at least 1");

        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(State {
                running: true,
                cur_batch: None,
                next_batch_id: 0,
            }),
        });

        tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                shutdown.cancelled().await;
                info!("parent scope cancelled");
                inner.stop();
            }
        });

        Ok(Self { inner })
    }

    /// Submits a single request and waits for its response.
    ///
    /// Blocks until the response for this submission is published, `timeout`
    /// elapses, or the batcher is stopped. `timeout` must exceed the batch
    /// timeout; a caller that cannot outwait the batch window could never
    /// receive a response.
    pub async fn submit(&self, payload: R, timeout: Duration) -> Result<S> {
        if timeout <= self.inner.config.batch_timeout {
            return Err(SubmitError::InvalidArgument(format!(
                "timeout must exceed the batch timeout of {:?}",
                self.inner.config.batch_timeout
            )));
        }

        let rx = self.inner.register(payload)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // Slot closed without a value: the batcher dropped it on shutdown.
            Ok(Err(_)) => Err(SubmitError::Stopped),
            Err(_) => Err(SubmitError::Timeout(timeout)),
        }
    }
}

impl<R, S> Inner<R, S>
where
    R: Send + 'static,
    S: Send + 'static,
{
    /// Appends the request to the current batch, or opens a new batch for it.
    /// A batch that reaches `max_batch_size` is detached and dispatched
    /// before the mutex is released.
    fn register(self: &Arc<Self>, payload: R) -> Result<oneshot::Receiver<Result<S>>> {
        let (tx, rx) = oneshot::channel();

        let mut state = self.state.lock();
        if !state.running {
            return Err(SubmitError::Stopped);
        }

        match state.cur_batch.take() {
            Some(mut batch) => {
                batch.body.push(payload);
                batch.subscribers.push(tx);
                state.cur_batch = Some(batch);
            }
            None => {
                let id = state.next_batch_id;
                state.next_batch_id += 1;
                state.cur_batch = Some(OpenBatch {
                    id,
                    body: vec![payload],
                    subscribers: vec![tx],
                    timer: self.spawn_timer(id),
                });
            }
        }

        let full = state
            .cur_batch
            .as_ref()
            .is_some_and(|batch| batch.body.len() >= self.config.max_batch_size);
        if full {
            if let Some(batch) = state.cur_batch.take() {
                batch.timer.abort();
                self.dispatch(batch);
            }
        }

        Ok(rx)
    }

    fn spawn_timer(self: &Arc<Self>, batch_id: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let delay = self.config.batch_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush_expired(batch_id);
        })
    }

    /// Timer callback. Dispatches the open batch unless it was already
    /// detached by a size trigger or by shutdown, in which case the stale
    /// fire is a no-op.
    fn flush_expired(self: &Arc<Self>, batch_id: u64) {
        let expired = {
            let mut state = self.state.lock();
            if state
                .cur_batch
                .as_ref()
                .is_some_and(|batch| batch.id == batch_id)
            {
                state.cur_batch.take()
            } else {
                debug!("stale timer fire for batch {batch_id}");
                None
            }
        };

        if let Some(batch) = expired {
            self.dispatch(batch);
        }
    }

    /// Applies the handler to a detached batch on its own task and publishes
    /// one response or error per subscriber. Slots are single-use and
    /// buffered, so publishing never blocks on callers that stopped
    /// listening.
    fn dispatch(self: &Arc<Self>, batch: OpenBatch<R, S>) {
        let send = Arc::clone(&self.config.send);

        tokio::spawn(async move {
            let OpenBatch {
                body, subscribers, ..
            } = batch;
            let want = body.len();

            match (send)(body).await {
                Err(e) => {
                    error!("batch handler failed: {e:#}");
                    let shared = Arc::new(e);
                    for sub in subscribers {
                        let _ = sub.send(Err(SubmitError::Handler(Arc::clone(&shared))));
                    }
                }
                Ok(responses) if responses.len() != want => {
                    error!(
                        "batch handler returned {} responses for a batch of {want}",
                        responses.len()
                    );
                    let got = responses.len();
                    for sub in subscribers {
                        let _ = sub.send(Err(SubmitError::ProtocolMismatch { want, got }));
                    }
                }
                Ok(responses) => {
                    for (sub, res) in subscribers.into_iter().zip(responses) {
                        let _ = sub.send(Ok(res));
                    }
                }
            }
        });
    }

    /// Safely releases all batcher resources. No new submissions are
    /// accepted afterwards.
    fn stop(&self) {
        let mut state = self.state.lock();
        info!("stopping batcher");

        state.running = false;
        if let Some(batch) = state.cur_batch.take() {
            batch.timer.abort();
            // Dropping the subscribers closes every response slot without a
            // value; waiting callers surface `Stopped`.
            drop(batch.subscribers);
        }

        info!("batcher stopped");
    }
}
