// ---------------------------------------------------------------------------
// Tick-driven save, load and wait tasks
// ---------------------------------------------------------------------------
//
// Every live task advances exactly one step per `Update`, from one exclusive
// system. Steps that hand work to a `StepWorker` poll it on later ticks and
// only advance once it has finished, so every world mutation stays on the
// main thread.
//
// ```text
//   save: Prepare -> SlotInfo -> Player -> Level -> Finish -> Complete
//   load: Prepare -> Start -> Player* -> Level* -> Finish -> Complete
//                          (* waits while the pawn / game mode is missing)
//   wait: Poll* -> Complete
// ```

mod load_task;
mod save_task;
mod wait_task;
pub mod worker;

use std::collections::HashSet;
use std::ops::BitOr;

use bevy::prelude::*;

use crate::level_load::LoadReport;

pub use load_task::LoadTask;
pub use save_task::SaveTask;
pub use wait_task::WaitTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Which archives a save or load covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveScope(u8);

impl SaveScope {
    pub const PLAYER: SaveScope = SaveScope(1);
    pub const LEVEL: SaveScope = SaveScope(2);
    pub const ALL: SaveScope = SaveScope(3);

    pub fn contains(self, other: SaveScope) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has_player(self) -> bool {
        self.contains(Self::PLAYER)
    }

    pub fn has_level(self) -> bool {
        self.contains(Self::LEVEL)
    }

    /// Without the player bit a scope is treated as a level operation.
    pub fn mode(self) -> TaskMode {
        match (self.has_player(), self.has_level()) {
            (true, true) => TaskMode::All,
            (true, false) => TaskMode::Player,
            (false, _) => TaskMode::Level,
        }
    }
}

impl BitOr for SaveScope {
    type Output = SaveScope;

    fn bitor(self, rhs: SaveScope) -> SaveScope {
        SaveScope(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskMode {
    Player,
    Level,
    All,
}

impl TaskMode {
    pub fn overlaps(self, other: TaskMode) -> bool {
        self == TaskMode::All || other == TaskMode::All || self == other
    }
}

/// Sent on the tick after a save task went inactive.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveFinished {
    pub id: TaskId,
}

/// Sent on the tick after a load task went inactive.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadFinished {
    pub id: TaskId,
    pub report: LoadReport,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitFinished {
    pub id: TaskId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Done,
}

pub enum ActiveTask {
    Save(SaveTask),
    Load(LoadTask),
    Wait(WaitTask),
}

impl ActiveTask {
    pub fn id(&self) -> TaskId {
        match self {
            ActiveTask::Save(t) => t.id(),
            ActiveTask::Load(t) => t.id(),
            ActiveTask::Wait(t) => t.id(),
        }
    }

    /// Wait tasks have no mode and never block anything.
    fn mode(&self) -> Option<TaskMode> {
        match self {
            ActiveTask::Save(t) => Some(t.mode()),
            ActiveTask::Load(t) => Some(t.mode()),
            ActiveTask::Wait(_) => None,
        }
    }

    fn is_active(&self) -> bool {
        match self {
            ActiveTask::Save(t) => t.is_active(),
            ActiveTask::Load(t) => t.is_active(),
            ActiveTask::Wait(_) => false,
        }
    }

    fn step(&mut self, world: &mut World, others_active: bool) -> TaskStatus {
        match self {
            ActiveTask::Save(t) => t.step(world),
            ActiveTask::Load(t) => t.step(world),
            ActiveTask::Wait(t) => t.step(world, others_active),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TaskInfo {
    mode: Option<TaskMode>,
    active: bool,
}

impl TaskInfo {
    fn of(task: &ActiveTask) -> Self {
        Self {
            mode: task.mode(),
            active: task.is_active(),
        }
    }
}

/// Live tasks of one world.
#[derive(Resource, Default)]
pub struct AsyncTasks {
    next_id: u64,
    tasks: Vec<ActiveTask>,
    /// Tasks taken out by the driver for the current tick.
    stepping: Vec<TaskInfo>,
    finished: HashSet<TaskId>,
}

impl AsyncTasks {
    fn infos(&self) -> impl Iterator<Item = TaskInfo> + '_ {
        self.tasks
            .iter()
            .map(TaskInfo::of)
            .chain(self.stepping.iter().copied())
    }

    /// Any save or load that has not reached its finish step.
    pub fn is_save_or_load_active(&self) -> bool {
        self.infos().any(|i| i.active)
    }

    /// An active save or load whose mode overlaps `mode`.
    pub fn overlaps(&self, mode: TaskMode) -> bool {
        self.infos()
            .any(|i| i.active && i.mode.is_some_and(|m| m.overlaps(mode)))
    }

    pub fn is_finished(&self, id: TaskId) -> bool {
        self.finished.contains(&id)
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.stepping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn next_id(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    pub(crate) fn push(&mut self, task: ActiveTask) -> TaskId {
        let id = task.id();
        self.tasks.push(task);
        id
    }
}

/// Advance every live task by one step.
pub fn drive_tasks(world: &mut World) {
    let mut running = {
        let Some(mut tasks) = world.get_resource_mut::<AsyncTasks>() else {
            return;
        };
        if tasks.tasks.is_empty() {
            return;
        }
        let running = std::mem::take(&mut tasks.tasks);
        tasks.stepping = running.iter().map(TaskInfo::of).collect();
        running
    };

    let mut done = Vec::new();
    for i in 0..running.len() {
        let started_active = world
            .get_resource::<AsyncTasks>()
            .is_some_and(|t| t.tasks.iter().any(ActiveTask::is_active));
        let others_active = started_active
            || running
                .iter()
                .enumerate()
                .any(|(j, t)| j != i && t.is_active());
        if running[i].step(world, others_active) == TaskStatus::Done {
            done.push(running[i].id());
        }
        let info = TaskInfo::of(&running[i]);
        if let Some(slot) = world
            .get_resource_mut::<AsyncTasks>()
            .and_then(|t| t.into_inner().stepping.get_mut(i))
        {
            *slot = info;
        }
    }
    running.retain(|t| !done.contains(&t.id()));

    let Some(mut tasks) = world.get_resource_mut::<AsyncTasks>() else {
        error!("AsyncTasks removed while tasks were running");
        return;
    };
    tasks.stepping.clear();
    // Tasks started from inside a step run after the existing ones.
    let started = std::mem::take(&mut tasks.tasks);
    running.extend(started);
    tasks.tasks = running;
    for id in done {
        debug!("Task {:?} complete", id);
        tasks.finished.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_modes() {
        assert_eq!(SaveScope::PLAYER.mode(), TaskMode::Player);
        assert_eq!(SaveScope::LEVEL.mode(), TaskMode::Level);
        assert_eq!((SaveScope::PLAYER | SaveScope::LEVEL).mode(), TaskMode::All);
        assert_eq!(SaveScope(0).mode(), TaskMode::Level);
        assert!(SaveScope::ALL.has_player() && SaveScope::ALL.has_level());
    }

    #[test]
    fn test_overlap_rule() {
        use TaskMode::*;
        assert!(All.overlaps(Player));
        assert!(Player.overlaps(All));
        assert!(Level.overlaps(Level));
        assert!(!Player.overlaps(Level));
        assert!(!Level.overlaps(Player));
    }

    #[test]
    fn test_empty_driver_is_noop() {
        let mut world = World::new();
        drive_tasks(&mut world);
        world.init_resource::<AsyncTasks>();
        drive_tasks(&mut world);
        assert!(world.resource::<AsyncTasks>().is_empty());
    }

    #[test]
    fn test_wait_task_completes_after_one_idle_tick() {
        let mut world = World::new();
        world.init_resource::<AsyncTasks>();
        world.init_resource::<Events<WaitFinished>>();
        let id = {
            let mut tasks = world.resource_mut::<AsyncTasks>();
            let id = tasks.next_id();
            tasks.push(ActiveTask::Wait(WaitTask::new(id)))
        };

        drive_tasks(&mut world);
        assert!(!world.resource::<AsyncTasks>().is_finished(id));
        drive_tasks(&mut world);
        assert!(world.resource::<AsyncTasks>().is_finished(id));
        assert!(world.resource::<AsyncTasks>().is_empty());
        assert_eq!(world.resource::<Events<WaitFinished>>().len(), 1);
    }
}
