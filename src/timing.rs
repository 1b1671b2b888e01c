// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use web_time::{Duration, Instant};

/// Monotonic frame clock with sub-millisecond resolution.
///
/// The timer is the single time source for all per-item temporal modulation
/// (contrast phase, defocus phase), so that every item sampled within one
/// frame sees the same elapsed time. Pausing freezes the elapsed value;
/// resuming continues from the frozen value, so elapsed time never decreases.
#[derive(Debug)]
pub struct FrameTimer {
    created: Instant,
    started: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            started: None,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Records the start timestamp. Restarting resets the elapsed clock.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Freezes the elapsed clock. A no-op while already paused.
    pub fn pause(&mut self) {
        if self.started.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// Unfreezes the elapsed clock. A no-op while running.
    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    /// Elapsed time since `start`, excluding paused intervals. Zero before
    /// the timer is started.
    pub fn elapsed(&self) -> Duration {
        let Some(started) = self.started else {
            return Duration::ZERO;
        };
        let now = self.paused_at.unwrap_or_else(Instant::now);
        now.duration_since(started)
            .saturating_sub(self.paused_total)
    }

    /// Elapsed time in seconds as a float, the unit used by temporal
    /// modulation functions.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Time since the timer object was created, regardless of `start`.
    pub fn since_creation(&self) -> Duration {
        self.created.elapsed()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
