use bevy::prelude::*;

use super::{TaskId, TaskStatus, WaitFinished};

/// Completes on the tick after it first sees no active save or load.
pub struct WaitTask {
    id: TaskId,
    idle: bool,
}

impl WaitTask {
    pub fn new(id: TaskId) -> Self {
        Self { id, idle: false }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub(super) fn step(&mut self, world: &mut World, others_active: bool) -> TaskStatus {
        if !self.idle {
            self.idle = !others_active;
            return TaskStatus::Running;
        }
        world.send_event(WaitFinished { id: self.id });
        TaskStatus::Done
    }
}
