// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2025-2026 schwab-rs contributors. All rights reserved.
//  https://github.com/schwab-rs/schwab-rs
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Process-wide Tokio runtime for network I/O.

use std::sync::OnceLock;

use tokio::runtime::Runtime;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Returns the shared Tokio runtime.
///
/// The runtime is created on first use with a single worker thread, so all
/// WebSocket I/O is driven by one dedicated background thread. Synchronous
/// API methods `block_on` this runtime from the calling thread.
///
/// # Panics
///
/// Panics if the runtime cannot be created (out of file descriptors or
/// similar fatal conditions).
pub fn get_runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("schwab-io")
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_is_shared() {
        let first = get_runtime() as *const Runtime;
        let second = get_runtime() as *const Runtime;
        assert_eq!(first, second);
    }

    #[test]
    fn test_runtime_executes_futures() {
        let value = get_runtime().block_on(async { 40 + 2 });
        assert_eq!(value, 42);
    }
}
