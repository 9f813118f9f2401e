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

//! HTTP front end. One route accepts a JSON value per POST, feeds it into
//! the batcher, and writes the caller's own response bytes back.

use crate::batcher::RequestBatcher;
use crate::error::SubmitError;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use http::{Method, StatusCode, header};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub batcher: RequestBatcher<Bytes, Bytes>,
    pub backend: String,
    pub idle_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/", any(root)).with_state(state)
}

async fn root(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return format!("batcher for {}", state.backend).into_response();
    }

    // Re-serializing through `Value` guarantees the batch splice receives
    // exactly one well-formed JSON value per submission.
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                "Expecting request body in JSON format",
            )
                .into_response();
        }
    };
    let payload = match serde_json::to_vec(&value) {
        Ok(payload) => Bytes::from(payload),
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                "Error converting request body into bytes",
            )
                .into_response();
        }
    };

    match state.batcher.submit(payload, state.idle_timeout).await {
        Ok(res) => ([(header::CONTENT_TYPE, "application/json")], res).into_response(),
        Err(e @ SubmitError::Timeout(_)) => {
            (StatusCode::REQUEST_TIMEOUT, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Accepts connections until the shutdown token fires, keeping at most
/// `max_conns` connections open at a time.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    max_conns: usize,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let conn_limit = Arc::new(Semaphore::new(max_conns));

    loop {
        let permit = tokio::select! {
            permit = Arc::clone(&conn_limit).acquire_owned() => permit?,
            _ = shutdown.cancelled() => break,
        };

        let (stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("listener accept failed: {e}");
                    continue;
                }
            },
            _ = shutdown.cancelled() => break,
        };

        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!("connection from {remote_addr} failed: {e:?}");
            }
            drop(permit);
        });
    }

    info!("listener shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::{BatchingConfig, RequestBatcher, SendFn};
    use axum::body::Body;
    use futures::FutureExt;
    use http::Request;
    use tower::ServiceExt;

    fn echo_send() -> SendFn<Bytes, Bytes> {
        Arc::new(|batch: Vec<Bytes>| async move { Ok::<_, anyhow::Error>(batch) }.boxed())
    }

    fn state_with(send: SendFn<Bytes, Bytes>, idle_timeout: Duration) -> AppState {
        let batcher = RequestBatcher::new(
            CancellationToken::new(),
            BatchingConfig {
                max_batch_size: 32,
                batch_timeout: Duration::from_millis(1),
                send,
            },
        )
        .expect("valid config");

        AppState {
            batcher,
            backend: "http://backend:9000".to_string(),
            idle_timeout,
        }
    }

    async fn body_bytes(res: Response) -> Bytes {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("response body")
    }

    fn post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn non_post_gets_informational_body() {
        let app = router(state_with(echo_send(), Duration::from_secs(1)));

        let res = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_bytes(res).await,
            Bytes::from_static(b"batcher for http://backend:9000")
        );
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let app = router(state_with(echo_send(), Duration::from_secs(1)));

        let res = app.oneshot(post("{oops")).await.expect("response");

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_bytes(res).await,
            Bytes::from_static(b"Expecting request body in JSON format")
        );
    }

    #[tokio::test]
    async fn valid_json_round_trips() {
        let app = router(state_with(echo_send(), Duration::from_secs(1)));

        let res = app.oneshot(post(" [1, 2, 3] ")).await.expect("response");

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_bytes(res).await, Bytes::from_static(b"[1,2,3]"));
    }

    #[tokio::test]
    async fn scalar_payloads_are_preserved() {
        let app = router(state_with(echo_send(), Duration::from_secs(1)));

        let res = app.oneshot(post(r#""hello""#)).await.expect("response");

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_bytes(res).await, Bytes::from_static(br#""hello""#));
    }

    #[tokio::test]
    async fn handler_failure_maps_to_bad_request() {
        let send: SendFn<Bytes, Bytes> = Arc::new(|_batch: Vec<Bytes>| {
            async move { Err(anyhow::anyhow!("backend unavailable")) }.boxed()
        });
        let app = router(state_with(send, Duration::from_secs(1)));

        let res = app.oneshot(post("1")).await.expect("response");

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_bytes(res).await;
        assert!(String::from_utf8_lossy(&body).contains("batch handler failed"));
    }

    #[tokio::test]
    async fn idle_timeout_maps_to_request_timeout() {
        let send: SendFn<Bytes, Bytes> =
            Arc::new(|_batch: Vec<Bytes>| futures::future::pending().boxed());
        let app = router(state_with(send, Duration::from_millis(50)));

        let res = app.oneshot(post("1")).await.expect("response");

        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
