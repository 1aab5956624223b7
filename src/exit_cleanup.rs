use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

type CleanupTask = Box<dyn FnOnce() + Send>;

/// Cleanup routine shared by every exit path; only the first `run` executes the tasks.
#[derive(Default)]
pub struct ExitCleanup {
    tasks: Mutex<Vec<CleanupTask>>,
    fired: AtomicBool,
}

impl std::fmt::Debug for ExitCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitCleanup")
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}

impl ExitCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task. Tasks registered after cleanup already fired run immediately.
    pub fn register<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(error) => error.into_inner(),
        };
        if self.has_fired() {
            drop(guard);
            task();
            return;
        }
        guard.push(Box::new(task));
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Runs all registered tasks once. Returns `false` if cleanup already ran.
    pub fn run(&self) -> bool {
        let tasks = {
            let mut guard = match self.tasks.lock() {
                Ok(guard) => guard,
                Err(error) => error.into_inner(),
            };
            if self.fired.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            task();
        }
        true
    }
}
