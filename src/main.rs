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

use anyhow::ensure;
use async_request_batcher::args::UserArgs;
use async_request_batcher::batcher::{BatchingConfig, RequestBatcher};
use async_request_batcher::server::{self, AppState};
use async_request_batcher::transport;
use env_logger::Env;
use log::info;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = UserArgs::parse_with_env();

    let batch_timeout = Duration::from_millis(args.batch_timeout_millis);
    let idle_timeout = Duration::from_millis(args.idle_timeout_millis);
    ensure!(
        batch_timeout < idle_timeout,
        "batch timeout should be shorter than idle timeout"
    );

    info!("service listening on {}", args.bind);
    info!("batches will be sent to {}", args.backend);
    info!("maximum batch size: {}", args.max_batch_size);
    info!("batch timeout: {batch_timeout:?}");
    info!("idle timeout: {idle_timeout:?}");
    info!("maximum concurrent connections: {}", args.max_concurrent_conns);

    let shutdown = CancellationToken::new();

    let send = transport::backend_send_fn(reqwest::Client::new(), args.backend.clone());
    let batcher = RequestBatcher::new(
        shutdown.clone(),
        BatchingConfig {
            max_batch_size: args.max_batch_size,
            batch_timeout,
            send,
        },
    )?;

    let state = AppState {
        batcher,
        backend: args.backend,
        idle_timeout,
    };

    let listener = TcpListener::bind(args.bind).await?;

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received: preparing to gracefully shutdown");
                shutdown.cancel();
            }
        }
    });

    server::serve(
        listener,
        server::router(state),
        args.max_concurrent_conns,
        shutdown,
    )
    .await
}
