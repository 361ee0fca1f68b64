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

//! Periodic timer on a dedicated thread.

use std::{
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
    time::Duration,
};

/// Invokes a callback at a fixed interval on a background thread.
///
/// The callback fires on interval timeout but not on [`stop`]. Calling
/// [`start`] while already running stops the previous schedule first.
///
/// [`start`]: PeriodicTimer::start
/// [`stop`]: PeriodicTimer::stop
#[derive(Default)]
pub struct PeriodicTimer {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct TimerShared {
    active: Mutex<bool>,
    cv: Condvar,
}

impl PeriodicTimer {
    /// Creates an inactive timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts firing `callback` every `interval`.
    ///
    /// With `fire_on_start` the callback also fires immediately. The callback
    /// runs on the timer thread; it must not call [`stop`] on this timer.
    ///
    /// [`stop`]: PeriodicTimer::stop
    pub fn start(
        &self,
        interval: Duration,
        callback: impl Fn() + Send + 'static,
        fire_on_start: bool,
    ) {
        self.stop();

        let shared = self.shared.clone();
        *shared.active.lock().unwrap() = true;

        let thread_shared = self.shared.clone();
        let handle = std::thread::spawn(move || {
            let mut active = thread_shared.active.lock().unwrap();
            while *active {
                if fire_on_start {
                    drop(active);
                    callback();
                    active = thread_shared.active.lock().unwrap();
                    if !*active {
                        break;
                    }
                }

                let (guard, result) = thread_shared
                    .cv
                    .wait_timeout_while(active, interval, |active| *active)
                    .unwrap();
                active = guard;

                // A wake before the timeout means stop was requested
                if !result.timed_out() || !*active {
                    break;
                }

                if !fire_on_start {
                    drop(active);
                    callback();
                    active = thread_shared.active.lock().unwrap();
                }
            }
        });

        *self.thread.lock().unwrap() = Some(handle);
    }

    /// Fires `callback` once after `delay`, unless stopped first.
    pub fn run_once(&self, delay: Duration, callback: impl FnOnce() + Send + 'static) {
        self.stop();

        let shared = self.shared.clone();
        *shared.active.lock().unwrap() = true;

        let thread_shared = self.shared.clone();
        let handle = std::thread::spawn(move || {
            let active = thread_shared.active.lock().unwrap();
            let (mut active, result) = thread_shared
                .cv
                .wait_timeout_while(active, delay, |active| *active)
                .unwrap();

            if result.timed_out() && *active {
                *active = false;
                drop(active);
                callback();
            }
        });

        *self.thread.lock().unwrap() = Some(handle);
    }

    /// Stops the timer and joins its thread. Idempotent.
    pub fn stop(&self) {
        {
            *self.shared.active.lock().unwrap() = false;
        }
        self.shared.cv.notify_all();

        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Returns `true` while the timer is scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.shared.active.lock().unwrap()
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_fires_periodically() {
        let timer = PeriodicTimer::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        timer.start(
            Duration::from_millis(20),
            move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );

        std::thread::sleep(Duration::from_millis(110));
        timer.stop();

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 3, "expected >= 3 firings, got {fired}");

        // No more firings after stop
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), fired);
    }

    #[rstest]
    fn test_fire_on_start() {
        let timer = PeriodicTimer::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        timer.start(
            Duration::from_secs(60),
            move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            },
            true,
        );

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        timer.stop();
    }

    #[rstest]
    fn test_stop_before_first_firing() {
        let timer = PeriodicTimer::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        timer.start(
            Duration::from_secs(60),
            move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );

        std::thread::sleep(Duration::from_millis(20));
        timer.stop();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    fn test_restart_replaces_schedule() {
        let timer = PeriodicTimer::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let first_clone = first.clone();
        timer.start(
            Duration::from_millis(10),
            move || {
                first_clone.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );
        std::thread::sleep(Duration::from_millis(35));

        let second_clone = second.clone();
        timer.start(
            Duration::from_millis(10),
            move || {
                second_clone.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );
        let first_count = first.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(35));
        timer.stop();

        assert_eq!(first.load(Ordering::SeqCst), first_count);
        assert!(second.load(Ordering::SeqCst) >= 2);
    }

    #[rstest]
    fn test_run_once() {
        let timer = PeriodicTimer::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        timer.run_once(Duration::from_millis(20), move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());
    }

    #[rstest]
    fn test_run_once_cancelled_by_stop() {
        let timer = PeriodicTimer::new();
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();

        timer.run_once(Duration::from_secs(60), move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(20));
        timer.stop();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
