use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::{
    append_shutdown_log, backend_process::ChildExit, BackendSupervisor, ExecutionMode,
    ExitCleanup,
};

/// Process-wide state of the desktop host: the backend supervisor plus the exit cleanup hooks.
#[derive(Debug)]
pub struct DesktopHost {
    pub supervisor: BackendSupervisor,
    pub cleanup: ExitCleanup,
    pub mode: ExecutionMode,
    pub port: u16,
    pub(crate) is_starting: AtomicBool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendBridgeState {
    pub running: bool,
    pub starting: bool,
    pub mode: ExecutionMode,
    pub port: u16,
    pub pid: Option<u32>,
    pub last_exit: Option<ChildExit>,
}

impl DesktopHost {
    pub fn new(mode: ExecutionMode, port: u16) -> Self {
        Self {
            supervisor: BackendSupervisor::new(),
            cleanup: ExitCleanup::new(),
            mode,
            port,
            is_starting: AtomicBool::new(false),
        }
    }

    pub fn is_starting(&self) -> bool {
        self.is_starting.load(Ordering::Acquire)
    }

    /// Stops the backend and runs cleanup. Only the first call does anything.
    pub fn shutdown(&self, reason: &str) -> bool {
        if self.cleanup.has_fired() {
            return false;
        }
        append_shutdown_log(&format!("shutting down desktop host: {reason}"));
        self.supervisor.terminate();
        self.cleanup.run()
    }

    pub fn bridge_state(&self) -> BackendBridgeState {
        BackendBridgeState {
            running: self.supervisor.is_running(),
            starting: self.is_starting(),
            mode: self.mode,
            port: self.port,
            pid: self.supervisor.pid(),
            last_exit: self.supervisor.last_exit(),
        }
    }
}

impl Drop for DesktopHost {
    fn drop(&mut self) {
        self.shutdown("host dropped");
    }
}

pub(crate) struct AtomicFlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> AtomicFlagGuard<'a> {
    pub(crate) fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { flag })
    }
}

impl Drop for AtomicFlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
