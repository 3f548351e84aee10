//! Cancellable one-shot scheduled tasks
//!
//! A [`TaskSlot`] holds at most one pending task. Scheduling into an occupied
//! slot cancels the pending task first, so a slot owned by one entity never
//! has two tasks in flight. Cancellation is synchronous and idempotent.

/// Identifies one task scheduled through a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// A pending task and its countdown
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub id: TaskId,
    /// Simulation time the task was scheduled at
    pub started_at: f64,
    /// Total delay in seconds
    pub duration: f32,
    remaining: f32,
}

impl ScheduledTask {
    /// Seconds left before the task comes due
    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }

    /// Fraction of the delay already elapsed (0.0 to 1.0)
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (1.0 - self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

/// Holder for at most one pending task
#[derive(Debug, Clone, Default)]
pub struct TaskSlot {
    pending: Option<ScheduledTask>,
    next_id: u64,
}

impl TaskSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a task due `duration` seconds after `now`, replacing any pending one
    pub fn schedule(&mut self, now: f64, duration: f32) -> TaskId {
        self.cancel();
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.pending = Some(ScheduledTask {
            id,
            started_at: now,
            duration: duration.max(0.0),
            remaining: duration.max(0.0),
        });
        id
    }

    /// Cancel the pending task, if any. Returns the cancelled task's id.
    pub fn cancel(&mut self) -> Option<TaskId> {
        self.pending.take().map(|task| task.id)
    }

    /// Whether a task is pending
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending task, if any
    pub fn pending(&self) -> Option<&ScheduledTask> {
        self.pending.as_ref()
    }

    /// Advance the countdown by `dt` seconds.
    ///
    /// Returns the id of the task that came due; the slot is empty afterwards.
    pub fn advance(&mut self, dt: f32) -> Option<TaskId> {
        let task = self.pending.as_mut()?;
        task.remaining -= dt;
        if task.remaining <= 0.0 {
            return self.cancel();
        }
        None
    }
}
