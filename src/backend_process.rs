use std::{
    process::Stdio,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;
use tokio::process::{Child, Command};

use crate::{
    launch_plan::{build_debug_command, LaunchPlan},
    StartupError, CHILD_EXIT_POLL_INTERVAL, NODE_ENV, PORT_ENV, PRODUCTION_NODE_ENV,
};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How the backend process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChildExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ChildExit {
    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Default)]
struct ChildSlot {
    child: Option<Child>,
    generation: u64,
    last_exit: Option<ChildExit>,
}

/// Owns the single backend child process of this host.
#[derive(Debug, Default)]
pub struct BackendSupervisor {
    slot: Arc<Mutex<ChildSlot>>,
}

fn lock_slot(slot: &Mutex<ChildSlot>) -> MutexGuard<'_, ChildSlot> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(error) => {
            tracing::warn!("backend process lock poisoned, recovering");
            error.into_inner()
        }
    }
}

impl BackendSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the plan unless a child is already alive, in which case its pid is returned.
    ///
    /// Must be called from within a tokio runtime; the exit observer runs as a task.
    pub fn spawn(&self, plan: &LaunchPlan, port: u16) -> Result<u32, StartupError> {
        let mut slot = lock_slot(&self.slot);
        if let Some(child) = slot.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                let pid = child.id().unwrap_or_default();
                tracing::info!(pid, "backend process already running, not spawning another");
                return Ok(pid);
            }
        }

        let mut command = Command::new(&plan.cmd);
        command
            .args(&plan.args)
            .current_dir(&plan.cwd)
            .env(NODE_ENV, PRODUCTION_NODE_ENV)
            .env(PORT_ENV, port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(target_os = "windows")]
        command.creation_flags(CREATE_NO_WINDOW);

        let child = command
            .spawn()
            .map_err(|source| StartupError::ProcessSpawnFailure {
                command: build_debug_command(plan),
                source,
            })?;
        let pid = child.id().unwrap_or_default();

        slot.generation += 1;
        slot.child = Some(child);
        slot.last_exit = None;
        let generation = slot.generation;
        drop(slot);

        tracing::info!(
            pid,
            command = ?build_debug_command(plan),
            cwd = %plan.cwd.display(),
            "started backend process"
        );
        tokio::spawn(observe_exit(Arc::clone(&self.slot), generation));
        Ok(pid)
    }

    pub fn is_running(&self) -> bool {
        let mut slot = lock_slot(&self.slot);
        match slot.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                record_exit(&mut slot, status);
                false
            }
            Some(Err(_)) | None => false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        lock_slot(&self.slot).child.as_ref().and_then(Child::id)
    }

    pub fn last_exit(&self) -> Option<ChildExit> {
        lock_slot(&self.slot).last_exit
    }

    /// Resolves once no child is running, with the recorded exit if there was one.
    pub async fn wait_for_exit(&self) -> Option<ChildExit> {
        while self.is_running() {
            tokio::time::sleep(CHILD_EXIT_POLL_INTERVAL).await;
        }
        self.last_exit()
    }

    /// Best-effort synchronous termination of the live child, if any.
    pub fn terminate(&self) {
        let mut slot = lock_slot(&self.slot);
        let Some(mut child) = slot.child.take() else {
            return;
        };
        let pid = child.id();
        stop_child_process(&mut child);
        if let Ok(Some(status)) = child.try_wait() {
            slot.last_exit = Some(ChildExit::from_status(status));
        }
        tracing::info!(pid, "requested backend process termination");
    }
}

fn record_exit(slot: &mut ChildSlot, status: std::process::ExitStatus) {
    let exit = ChildExit::from_status(status);
    slot.child = None;
    slot.last_exit = Some(exit);
    tracing::info!(code = ?exit.code, signal = ?exit.signal, "backend process exited");
}

async fn observe_exit(slot: Arc<Mutex<ChildSlot>>, generation: u64) {
    loop {
        tokio::time::sleep(CHILD_EXIT_POLL_INTERVAL).await;
        let mut guard = lock_slot(&slot);
        if guard.generation != generation {
            return;
        }
        let Some(child) = guard.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                record_exit(&mut guard, status);
                return;
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, "failed to poll backend process status");
                return;
            }
        }
    }
}

#[cfg(target_os = "windows")]
fn stop_child_process(child: &mut Child) {
    use std::os::windows::process::CommandExt;

    if let Some(pid) = child.id() {
        let _ = std::process::Command::new("taskkill")
            .args(["/pid", &pid.to_string(), "/t", "/f"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .creation_flags(CREATE_NO_WINDOW)
            .status();
    }
    let _ = child.start_kill();
}

#[cfg(not(target_os = "windows"))]
fn stop_child_process(child: &mut Child) {
    let _ = child.start_kill();
}
