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

//! The request pipeline: a FIFO of outbound frames and the sender worker
//! that forwards them to the session only while the streamer is active.
//!
//! Callers never need to know whether the stream is up; frames enqueued
//! before login (or during an outage) accumulate and are sent once the
//! streamer becomes active, in enqueue order.

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
};

use schwab_network::websocket::SentCallback;

/// An outbound frame with an optional sent callback.
pub struct RequestEntry {
    /// The serialized JSON frame.
    pub frame: String,
    /// Fired after the frame reaches the socket.
    pub on_sent: Option<SentCallback>,
}

impl std::fmt::Debug for RequestEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEntry")
            .field("frame", &self.frame)
            .field("has_on_sent", &self.on_sent.is_some())
            .finish()
    }
}

/// Session state of the streamer. Only `Active` permits outbound frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Not logged in (initial state, stopped, or mid-recovery).
    #[default]
    Inactive,
    /// Logged in and streaming.
    Active,
    /// Temporarily suspended; frames accumulate until resume.
    Paused,
}

/// Flag bits combined with [`SessionState`] under the state mutex.
pub(crate) mod flags {
    /// The sender worker keeps running while set.
    pub const RUN_SENDER_WORKER: u8 = 0b01;
    /// The request queue holds at least one entry.
    pub const QUEUE_NON_EMPTY: u8 = 0b10;
}

/// State value plus flag bits guarded by one mutex, with a single wake
/// predicate for the sender worker.
#[derive(Debug, Default)]
pub(crate) struct StreamerState {
    state: SessionState,
    flags: u8,
}

impl StreamerState {
    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn test_state(&self, state: SessionState) -> bool {
        self.state == state
    }

    pub(crate) fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub(crate) fn test_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// The sender wakes when it has work (`Active` with a non-empty queue)
    /// or when it has been told to exit.
    pub(crate) fn should_wake_sender(&self) -> bool {
        (self.test_state(SessionState::Active) && self.test_flag(flags::QUEUE_NON_EMPTY))
            || !self.test_flag(flags::RUN_SENDER_WORKER)
    }
}

/// State mutex and condvar shared by the sender worker, the producers, and
/// the streamer's pause/resume/stop notifications.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) state: Mutex<StreamerState>,
    pub(crate) cv: Condvar,
}

/// Bounded-by-memory FIFO of outbound frames plus the sender worker.
pub(crate) struct RequestPipeline {
    queue: Arc<Mutex<VecDeque<RequestEntry>>>,
    shared: Arc<SharedState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RequestPipeline {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            shared,
            worker: Mutex::new(None),
        }
    }

    /// Enqueues an entry and wakes the worker.
    ///
    /// Lock order on this side is queue then state, never held together.
    pub(crate) fn push(&self, entry: RequestEntry) {
        {
            self.queue.lock().unwrap().push_back(entry);
        }
        {
            self.shared
                .state
                .lock()
                .unwrap()
                .set_flag(flags::QUEUE_NON_EMPTY, true);
        }
        self.shared.cv.notify_one();
    }

    /// Returns the number of queued entries.
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Launches the sender worker.
    ///
    /// `send` forwards one frame to the session; it must not block on the
    /// session becoming writable (session-level buffering handles outages).
    pub(crate) fn start(&self, send: impl Fn(String, Option<SentCallback>) + Send + 'static) {
        {
            self.shared
                .state
                .lock()
                .unwrap()
                .set_flag(flags::RUN_SENDER_WORKER, true);
        }

        let queue = self.queue.clone();
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || {
            Self::run_worker(&shared, &queue, &send);
        });

        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Clears the run flag and joins the worker. Idempotent.
    pub(crate) fn stop(&self) {
        {
            self.shared
                .state
                .lock()
                .unwrap()
                .set_flag(flags::RUN_SENDER_WORKER, false);
        }
        self.shared.cv.notify_all();

        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// The sender worker loop.
    ///
    /// Lock order on this side is state then queue: the state lock is held
    /// for the wake check, the queue lock is taken to pop. Frames are
    /// forwarded one at a time in FIFO order.
    fn run_worker(
        shared: &SharedState,
        queue: &Mutex<VecDeque<RequestEntry>>,
        send: &impl Fn(String, Option<SentCallback>),
    ) {
        let mut state_guard = shared.state.lock().unwrap();
        while state_guard.test_flag(flags::RUN_SENDER_WORKER) {
            state_guard = shared
                .cv
                .wait_while(state_guard, |state| !state.should_wake_sender())
                .unwrap();

            if !state_guard.test_flag(flags::RUN_SENDER_WORKER) {
                break;
            }

            let mut queue_guard = queue.lock().unwrap();
            log::trace!("Streamer request queue size: {}", queue_guard.len());

            while !queue_guard.is_empty() && state_guard.test_state(SessionState::Active) {
                let entry = queue_guard.pop_front().expect("checked non-empty");
                drop(queue_guard);
                drop(state_guard);

                send(entry.frame, entry.on_sent);

                state_guard = shared.state.lock().unwrap();
                queue_guard = queue.lock().unwrap();
            }

            if queue_guard.is_empty() {
                state_guard.set_flag(flags::QUEUE_NON_EMPTY, false);
            }
            drop(queue_guard);
        }
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("queued", &self.len())
            .finish_non_exhaustive()
    }
}

impl Drop for RequestPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
