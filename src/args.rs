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

use crate::constants::{
    DEFAULT_BATCH_TIMEOUT_MILLIS, DEFAULT_BIND_ADDR, DEFAULT_IDLE_TIMEOUT_MILLIS,
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_CONCURRENT_CONNS,
};
use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct UserArgs {
    /// Address to bind this service to
    #[clap(long = "bind", default_value = DEFAULT_BIND_ADDR)]
    pub bind: SocketAddr,

    /// Address of the backend service receiving batch requests
    #[clap(long = "backend")]
    pub backend: String,

    /// Maximum size of each batch
    #[clap(long = "max-batch-size", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub max_batch_size: usize,

    /// Maximum wait time in milliseconds before an open batch is sent
    #[clap(long = "batch-timeout-millis", default_value_t = DEFAULT_BATCH_TIMEOUT_MILLIS)]
    pub batch_timeout_millis: u64,

    /// Maximum wait time in milliseconds for a response before idle timeout
    #[clap(long = "idle-timeout-millis", default_value_t = DEFAULT_IDLE_TIMEOUT_MILLIS)]
    pub idle_timeout_millis: u64,

    /// Maximum number of clients connected to this service at a time
    #[clap(long = "max-concurrent-conns", default_value_t = DEFAULT_MAX_CONCURRENT_CONNS)]
    pub max_concurrent_conns: usize,
}

impl UserArgs {
    /// Parses the command line with the whitespace-separated contents of the
    /// `BATCHER_CMD_ARGS` environment variable appended to it.
    pub fn parse_with_env() -> Self {
        let mut argv: Vec<OsString> = env::args_os().collect();
        if let Ok(extra) = env::var("BATCHER_CMD_ARGS") {
            argv.extend(extra.split_whitespace().map(OsString::from));
        }

        Self::parse_from(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let args = UserArgs::parse_from(["batcher", "--backend", "http://backend:9000"]);

        assert_eq!(args.bind, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(args.backend, "http://backend:9000");
        assert_eq!(args.max_batch_size, 32);
        assert_eq!(args.batch_timeout_millis, 10);
        assert_eq!(args.idle_timeout_millis, 60_000);
        assert_eq!(args.max_concurrent_conns, 1024);
    }

    #[test]
    fn missing_backend_is_an_error() {
        assert!(UserArgs::try_parse_from(["batcher"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = UserArgs::parse_from([
            "batcher",
            "--backend",
            "http://backend:9000",
            "--bind",
            "127.0.0.1:9999",
            "--max-batch-size",
            "4",
            "--batch-timeout-millis",
            "25",
        ]);

        assert_eq!(args.bind, "127.0.0.1:9999".parse::<SocketAddr>().unwrap());
        assert_eq!(args.max_batch_size, 4);
        assert_eq!(args.batch_timeout_millis, 25);
    }
}
