//! One unit of background work owned by a task step.
//!
//! The step launches the work, then polls it once per tick and only moves on
//! once it has a result. Workers never touch the `World`.

#[cfg(not(target_arch = "wasm32"))]
use bevy::tasks::{block_on, AsyncComputeTaskPool, Task, TaskPool};

pub enum StepWorker<T: Send + 'static> {
    /// Ran on the calling thread; the result is waiting to be taken.
    Inline(Option<T>),
    #[cfg(not(target_arch = "wasm32"))]
    Pooled(Task<T>),
}

impl<T: Send + 'static> StepWorker<T> {
    /// Run `work` on the async compute pool when `threaded`, inline otherwise.
    pub fn spawn(threaded: bool, work: impl FnOnce() -> T + Send + 'static) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        if threaded {
            let pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
            return Self::Pooled(pool.spawn(async move { work() }));
        }
        #[cfg(target_arch = "wasm32")]
        let _ = threaded;
        Self::Inline(Some(work()))
    }

    /// The result, once. Never blocks on unfinished work.
    pub fn poll(&mut self) -> Option<T> {
        match self {
            Self::Inline(result) => result.take(),
            #[cfg(not(target_arch = "wasm32"))]
            Self::Pooled(task) => {
                let result = block_on(futures_lite::future::poll_once(task))?;
                // A finished task must not be polled again.
                *self = Self::Inline(None);
                Some(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_result_is_taken_once() {
        let mut worker = StepWorker::spawn(false, || 7);
        assert_eq!(worker.poll(), Some(7));
        assert_eq!(worker.poll(), None);
    }

    #[test]
    fn test_pooled_result_arrives() {
        let mut worker = StepWorker::spawn(true, || (1..=10).sum::<u32>());
        let mut result = None;
        for _ in 0..10_000 {
            result = worker.poll();
            if result.is_some() {
                break;
            }
            std::thread::yield_now();
        }
        assert_eq!(result, Some(55));
        assert_eq!(worker.poll(), None);
    }
}
