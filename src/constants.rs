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

pub(crate) const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub(crate) const DEFAULT_MAX_BATCH_SIZE: usize = 32;
pub(crate) const DEFAULT_BATCH_TIMEOUT_MILLIS: u64 = 10;
pub(crate) const DEFAULT_IDLE_TIMEOUT_MILLIS: u64 = 60_000;
pub(crate) const DEFAULT_MAX_CONCURRENT_CONNS: usize = 1024;
