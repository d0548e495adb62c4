use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};

use host_platform::error::FacilityError;
use host_platform::process::{ProcessRecord, ProcessTable};

/// Process name of the Service Control Manager, without extension.
pub const SERVICE_MANAGER_PROCESS: &str = "services";

/// Process table read from a ToolHelp snapshot.
#[derive(Debug, Default)]
pub struct ToolhelpProcessTable;

impl ToolhelpProcessTable {
    pub fn new() -> Self {
        Self
    }
}

struct Snapshot(HANDLE);

impl Drop for Snapshot {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

impl ProcessTable for ToolhelpProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessRecord>, FacilityError> {
        let mut records = Vec::new();

        unsafe {
            let snap = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map(Snapshot)
                .map_err(|e| FacilityError::native("process snapshot", e))?;

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            if Process32FirstW(snap.0, &mut entry).is_ok() {
                loop {
                    records.push(ProcessRecord {
                        pid: entry.th32ProcessID,
                        parent_pid: entry.th32ParentProcessID,
                        executable_name: process_name(&entry.szExeFile),
                    });
                    if Process32NextW(snap.0, &mut entry).is_err() {
                        break;
                    }
                }
            }
        }

        debug!("snapshot holds {} processes", records.len());
        Ok(records)
    }

    fn service_manager_name(&self) -> &str {
        SERVICE_MANAGER_PROCESS
    }
}

/// Decode a NUL-terminated ToolHelp name and drop a trailing `.exe`.
fn process_name(raw: &[u16]) -> String {
    let end = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());
    let name = String::from_utf16_lossy(&raw[..end]);
    match name.len().checked_sub(4) {
        Some(cut)
            if cut > 0
                && name.is_char_boundary(cut)
                && name[cut..].eq_ignore_ascii_case(".exe") =>
        {
            name[..cut].to_string()
        }
        _ => name,
    }
}
