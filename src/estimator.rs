use chrono::{DateTime, TimeDelta, Utc};

/// Tracks when the current build started and how long the last green build
/// took, to estimate the time left on a build in progress.
///
/// Only one build is tracked at a time. Failed or cancelled builds never
/// record a duration, so the last successful one stays the best estimate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDurationEstimator {
    build_start: Option<DateTime<Utc>>,
    last_duration: Option<TimeDelta>,
}

impl BuildDurationEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a build, dropping any unfinished one.
    pub fn on_build_start(&mut self, now: DateTime<Utc>) {
        self.build_start = Some(now);
    }

    /// Record the duration of the build that just went green.
    ///
    /// No-op if no start was seen (e.g. the monitor came up mid-build).
    pub fn on_successful_build(&mut self, now: DateTime<Utc>) {
        if let Some(start) = self.build_start.take() {
            self.last_duration = Some(now - start);
        }
    }

    /// Time left on the current build; zero when idle or without history.
    /// Never negative.
    pub fn estimated_remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        match (self.build_start, self.last_duration) {
            (Some(start), Some(expected)) => {
                let elapsed = now - start;
                (expected - elapsed).max(TimeDelta::zero())
            }
            _ => TimeDelta::zero(),
        }
    }

    pub fn build_start(&self) -> Option<DateTime<Utc>> {
        self.build_start
    }

    pub fn last_duration(&self) -> Option<TimeDelta> {
        self.last_duration
    }

    pub fn is_tracking_build(&self) -> bool {
        self.build_start.is_some()
    }
}
