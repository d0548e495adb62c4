use std::path::PathBuf;

use tracing::debug;

use host_platform::error::FacilityError;
use host_platform::process::{ProcessRecord, ProcessTable};

/// `comm` of the service manager process.
pub const SERVICE_MANAGER_PROCESS: &str = "systemd";

/// Process table read from procfs.
pub struct ProcProcessTable {
    root: PathBuf,
}

impl Default for ProcProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcProcessTable {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessTable for ProcProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessRecord>, FacilityError> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| FacilityError::native(format!("read {}", self.root.display()), e))?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(pid) = file_name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // processes exit between readdir and read; skip them
            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            match parse_stat(&stat) {
                Some(record) if record.pid == pid => records.push(record),
                _ => debug!("unparseable stat for pid {}", pid),
            }
        }
        Ok(records)
    }

    fn service_manager_name(&self) -> &str {
        SERVICE_MANAGER_PROCESS
    }
}

/// Parse `/proc/<pid>/stat`: `pid (comm) state ppid ...`. `comm` may itself
/// contain spaces and parentheses, so it ends at the last `)`.
pub fn parse_stat(stat: &str) -> Option<ProcessRecord> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close < open {
        return None;
    }

    let pid = stat[..open].trim().parse().ok()?;
    let executable_name = stat[open + 1..close].to_string();
    let mut rest = stat[close + 1..].split_whitespace();
    let _state = rest.next()?;
    let parent_pid = rest.next()?.parse().ok()?;

    Some(ProcessRecord {
        pid,
        parent_pid,
        executable_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat() {
        let record = parse_stat("4242 (backup) S 1 4242 4242 0 -1 4194560 1197 0 0 0").unwrap();
        assert_eq!(record.pid, 4242);
        assert_eq!(record.parent_pid, 1);
        assert_eq!(record.executable_name, "backup");
    }

    #[test]
    fn test_parse_stat_with_awkward_comm() {
        let record = parse_stat("77 (my (odd) name) R 12 77 77 0").unwrap();
        assert_eq!(record.executable_name, "my (odd) name");
        assert_eq!(record.parent_pid, 12);
    }

    #[test]
    fn test_parse_stat_rejects_garbage() {
        assert!(parse_stat("").is_none());
        assert!(parse_stat("12 (truncated").is_none());
        assert!(parse_stat("x (a) S 1").is_none());
    }

    #[test]
    fn test_snapshot_from_fake_procfs() {
        let root = std::env::temp_dir().join(format!("host-proc-{}", uuid::Uuid::new_v4()));
        for (pid, stat) in [("1", "1 (systemd) S 0 1 1"), ("20", "20 (backup) S 1 20 20")] {
            std::fs::create_dir_all(root.join(pid)).unwrap();
            std::fs::write(root.join(pid).join("stat"), stat).unwrap();
        }
        std::fs::create_dir_all(root.join("self")).unwrap();

        let table = ProcProcessTable::with_root(&root);
        let mut records = table.snapshot().unwrap();
        records.sort_by_key(|r| r.pid);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].parent_pid, 1);
        assert_eq!(records[0].executable_name, table.service_manager_name());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_procfs_is_an_error() {
        let table = ProcProcessTable::with_root("/nonexistent/proc");
        assert!(table.snapshot().is_err());
    }
}
