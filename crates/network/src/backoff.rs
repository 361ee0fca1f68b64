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

//! Exponential backoff with optional jitter for reconnection scheduling.

use std::time::Duration;

use rand::Rng;

/// Computes delays between reconnection attempts.
///
/// The delay grows from `delay_initial` by `factor` on every attempt, capped
/// at `delay_max`, with up to `jitter_ms` of uniform random jitter added.
/// With `immediate_first` the first attempt is made without any delay.
///
/// The streamer configures this with equal initial and maximum delays and a
/// factor of 1.0, which degenerates to a fixed retry interval.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    delay_initial: Duration,
    delay_max: Duration,
    delay_current: Duration,
    factor: f64,
    jitter_ms: u64,
    immediate_first: bool,
    first_attempt: bool,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`].
    ///
    /// # Errors
    ///
    /// Returns an error if `delay_initial` is zero or `factor` is less
    /// than 1.0.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
        immediate_first: bool,
    ) -> Result<Self, String> {
        if delay_initial.is_zero() {
            return Err("`delay_initial` must be positive".to_string());
        }
        if factor < 1.0 {
            return Err(format!("`factor` must be >= 1.0, was {factor}"));
        }

        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
            immediate_first,
            first_attempt: true,
        })
    }

    /// Returns the delay to apply before the next attempt and advances the
    /// internal state.
    pub fn next_duration(&mut self) -> Duration {
        if self.first_attempt {
            self.first_attempt = false;
            if self.immediate_first {
                return Duration::ZERO;
            }
        }

        let jitter = if self.jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=self.jitter_ms))
        } else {
            Duration::ZERO
        };
        let delay = self.delay_current + jitter;

        let next_ms = (self.delay_current.as_millis() as f64 * self.factor) as u64;
        self.delay_current = Duration::from_millis(next_ms).min(self.delay_max);

        delay
    }

    /// Resets the backoff to its initial state.
    pub fn reset(&mut self) {
        self.delay_current = self.delay_initial;
        self.first_attempt = true;
    }

    /// Returns the current base delay (without jitter).
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.delay_current
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_rejects_invalid_config() {
        assert!(
            ExponentialBackoff::new(Duration::ZERO, Duration::from_secs(1), 2.0, 0, false).is_err()
        );
        assert!(
            ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(2),
                0.5,
                0,
                false
            )
            .is_err()
        );
    }

    #[rstest]
    fn test_immediate_first() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(400),
            2.0,
            0,
            true,
        )
        .unwrap();

        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
        assert_eq!(backoff.next_duration(), Duration::from_millis(200));
        assert_eq!(backoff.next_duration(), Duration::from_millis(400));
        // Capped at the maximum
        assert_eq!(backoff.next_duration(), Duration::from_millis(400));
    }

    #[rstest]
    fn test_fixed_interval_degenerate_case() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
            1.0,
            0,
            false,
        )
        .unwrap();

        assert_eq!(backoff.next_duration(), Duration::from_secs(10));
        assert_eq!(backoff.next_duration(), Duration::from_secs(10));
        assert_eq!(backoff.next_duration(), Duration::from_secs(10));
    }

    #[rstest]
    fn test_reset() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(800),
            2.0,
            0,
            false,
        )
        .unwrap();

        let _ = backoff.next_duration();
        let _ = backoff.next_duration();
        assert_eq!(backoff.current(), Duration::from_millis(400));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(100));
        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
    }
}
