use std::time::{Duration, Instant};

use strum::Display;

use crate::models::job::Job;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const INITIAL_POLL_WAIT: Duration = Duration::from_secs(4);
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Recommended wait schedule for a CloudSight job.
///
/// Processing usually takes 6-12 seconds, so the first status check happens
/// after `initial_wait`, and then every `interval` until the status changes
/// or `timeout` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub timeout: Duration,
    pub initial_wait: Duration,
    pub interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            initial_wait: INITIAL_POLL_WAIT,
            interval: POLL_INTERVAL,
        }
    }
}

impl PollSchedule {
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PollPhase {
    /// Submitted, waiting out the initial delay.
    Submitted,
    /// Last poll reported `not completed` and the deadline is still ahead.
    Polling,
    /// Last poll reported a terminal status.
    Terminal,
    /// Deadline passed while the job was still `not completed`.
    Expired,
}

/// State machine behind [`ClassificationClient::wait`].
///
/// The caller drives it: sleep [`Poller::initial_delay`], poll, then feed
/// every job to [`Poller::observe`] and sleep whatever it returns until it
/// returns `None`.
///
/// [`ClassificationClient::wait`]: crate::services::classifier::ClassificationClient::wait
#[derive(Debug, Clone)]
pub struct Poller {
    schedule: PollSchedule,
    /// `None` when the timeout reaches past what `Instant` can represent.
    deadline: Option<Instant>,
    phase: PollPhase,
    polls: u32,
}

impl Poller {
    pub fn new(schedule: PollSchedule, started_at: Instant) -> Self {
        Self {
            schedule,
            deadline: started_at.checked_add(schedule.timeout),
            phase: PollPhase::Submitted,
            polls: 0,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        self.schedule.timeout.min(self.schedule.initial_wait)
    }

    /// Record a poll result. Returns the delay before the next poll, or
    /// `None` when polling should stop.
    pub fn observe(&mut self, job: &Job, now: Instant) -> Option<Duration> {
        self.polls = self.polls.saturating_add(1);

        if job.is_terminal() {
            self.phase = PollPhase::Terminal;
            None
        } else if self.deadline.map_or(true, |deadline| now < deadline) {
            self.phase = PollPhase::Polling;
            Some(self.schedule.interval)
        } else {
            self.phase = PollPhase::Expired;
            None
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
