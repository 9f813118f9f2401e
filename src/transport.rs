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

//! Wire format between the batcher and the backend: a dispatched batch is
//! POSTed as one JSON array, and the backend answers with a JSON array of
//! equal length whose elements map back to the batch by position.

use crate::batcher::SendFn;
use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use futures::FutureExt;
use http::header::CONTENT_TYPE;
use log::debug;
use std::sync::Arc;

/// Splices raw JSON payloads into one array body without re-encoding them.
fn encode_batch(batch: &[Bytes]) -> Bytes {
    let len: usize = batch.iter().map(|item| item.len() + 1).sum();
    let mut buf = BytesMut::with_capacity(len + 1);

    buf.put_u8(b'[');
    for (i, item) in batch.iter().enumerate() {
        if i > 0 {
            buf.put_u8(b',');
        }
        buf.extend_from_slice(item);
    }
    buf.put_u8(b']');

    buf.freeze()
}

/// Parses a backend response as a JSON array and re-serializes each element
/// to its canonical byte form. Any failure is an error for the whole batch.
fn decode_batch(body: &[u8]) -> anyhow::Result<Vec<Bytes>> {
    let elements: Vec<serde_json::Value> =
        serde_json::from_slice(body).context("backend response is not a JSON array")?;

    elements
        .into_iter()
        .map(|element| {
            let bytes = serde_json::to_vec(&element)
                .context("failed to serialize backend response element")?;
            Ok(Bytes::from(bytes))
        })
        .collect()
}

/// Builds the batch handler that POSTs each dispatched batch to the backend.
pub fn backend_send_fn(client: reqwest::Client, backend: String) -> SendFn<Bytes, Bytes> {
    Arc::new(move |batch: Vec<Bytes>| {
        let client = client.clone();
        let backend = backend.clone();

        async move {
            debug!("sending batch of {} to {backend}", batch.len());

            let res = client
                .post(&backend)
                .header(CONTENT_TYPE, "application/json")
                .body(encode_batch(&batch))
                .send()
                .await
                .context("failed to send batch to backend")?;

            let body = res
                .bytes()
                .await
                .context("failed to read backend response")?;
            decode_batch(&body)
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splices_payloads_verbatim() {
        let batch = vec![
            Bytes::from_static(br#"{"a":1}"#),
            Bytes::from_static(b"2"),
            Bytes::from_static(br#""x""#),
        ];

        assert_eq!(encode_batch(&batch), Bytes::from_static(br#"[{"a":1},2,"x"]"#));
    }

    #[test]
    fn single_payload_gets_no_separator() {
        let batch = vec![Bytes::from_static(b"7")];

        assert_eq!(encode_batch(&batch), Bytes::from_static(b"[7]"));
    }

    #[test]
    fn canonicalizes_response_elements() {
        let out = decode_batch(br#"[ {"a" : 1 }, [1, 2] , null, "s" ]"#).expect("valid array");

        assert_eq!(out.len(), 4);
        assert_eq!(out[0], Bytes::from_static(br#"{"a":1}"#));
        assert_eq!(out[1], Bytes::from_static(b"[1,2]"));
        assert_eq!(out[2], Bytes::from_static(b"null"));
        assert_eq!(out[3], Bytes::from_static(br#""s""#));
    }

    #[test]
    fn rejects_non_array_response() {
        assert!(decode_batch(br#"{"a":1}"#).is_err());
        assert!(decode_batch(b"not json at all").is_err());
    }
}
