//! Parent-process detection: was this process started by the service manager?
//!
//! Purely diagnostic. Every failure reads as "no" and is logged at debug level.

use tracing::debug;

use host_platform::process::{ProcessRecord, ProcessTable};

/// True iff the parent of `pid` is the platform's service manager process.
pub fn is_running_under_service_manager(table: &dyn ProcessTable, pid: u32) -> bool {
    let snapshot = match table.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!("unable to snapshot processes (ignored): {}", e);
            return false;
        }
    };

    let manager = table.service_manager_name();
    match parent_of(&snapshot, pid) {
        Some(parent) if parent.executable_name == manager => {
            debug!("started by the {} process (pid {})", manager, parent.pid);
            true
        }
        Some(parent) => {
            debug!(
                "parent process is {} (pid {}), not {}",
                parent.executable_name, parent.pid, manager
            );
            false
        }
        None => {
            debug!("unable to find the parent of process {} (ignored)", pid);
            false
        }
    }
}

/// Parent record of `pid`, first match wins on both lookups.
pub fn parent_of(snapshot: &[ProcessRecord], pid: u32) -> Option<&ProcessRecord> {
    let child = snapshot.iter().find(|p| p.pid == pid)?;
    if child.parent_pid == child.pid {
        return None;
    }
    snapshot.iter().find(|p| p.pid == child.parent_pid)
}
