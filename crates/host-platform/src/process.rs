use crate::error::FacilityError;

/// One row of a process snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: u32,
    /// Process name without directory (and without `.exe` on Windows).
    pub executable_name: String,
}

pub trait ProcessTable: Send + Sync {
    /// Snapshot of every live process.
    fn snapshot(&self) -> Result<Vec<ProcessRecord>, FacilityError>;

    /// Process name of the platform's service manager (`services`, `systemd`).
    fn service_manager_name(&self) -> &str;
}
