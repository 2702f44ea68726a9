//! Wall-clock runtime services for the headless runner.

use std::time::{Duration, Instant};

use super::{HostRuntime, Shutdown};
use crate::snapshot::SnapshotRequester;

#[derive(Debug)]
struct ScheduledSave {
    after: Duration,
    request_id: u32,
}

/// Sleeps on the calling thread and runs timed host work at the core's periodic checks:
/// snapshot saves scheduled ahead of time and an optional run deadline.
pub struct SystemRuntime {
    started: Instant,
    deadline: Option<Duration>,
    requester: Option<SnapshotRequester>,
    scheduled: Vec<ScheduledSave>,
    checks: u64,
}

impl SystemRuntime {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            requester: None,
            scheduled: Vec::new(),
            checks: 0,
        }
    }

    /// Stop the core once it has run for `limit`.
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    /// Request a snapshot save once `after` has elapsed.
    pub fn schedule_save(
        mut self,
        requester: SnapshotRequester,
        after: Duration,
        request_id: u32,
    ) -> Self {
        self.requester = Some(requester);
        self.scheduled.push(ScheduledSave { after, request_id });
        self
    }

    /// How many times the core reached a periodic check.
    pub fn checks(&self) -> u64 {
        self.checks
    }

    fn fire_due_saves(&mut self, elapsed: Duration) {
        let Some(requester) = &self.requester else {
            return;
        };
        self.scheduled.retain(|save| {
            if save.after > elapsed {
                return true;
            }
            match requester.request_save(save.request_id) {
                Ok(()) => log::info!("requested snapshot save {}", save.request_id),
                Err(err) => log::warn!("scheduled snapshot save failed: {err}"),
            }
            false
        });
    }
}

impl Default for SystemRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for SystemRuntime {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn check_for_periodic_tasks(&mut self) -> Result<(), Shutdown> {
        self.checks += 1;
        let elapsed = self.started.elapsed();
        self.fire_due_saves(elapsed);

        match self.deadline {
            Some(limit) if elapsed >= limit => Err(Shutdown::new(format!(
                "run time limit of {:.1}s reached",
                limit.as_secs_f64()
            ))),
            _ => Ok(()),
        }
    }

    fn log(&mut self, message: &str) {
        log::info!(target: "guest", "{message}");
    }
}
