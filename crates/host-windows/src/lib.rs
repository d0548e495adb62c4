// Windows backend for the service host
//
// Service Control Manager access through `windows-service`, with raw Win32
// calls where that crate has no wrapper (service enumeration, control codes,
// ToolHelp snapshots, UAC relaunch).

#[cfg(target_os = "windows")]
pub mod service;

#[cfg(target_os = "windows")]
pub mod installer;

#[cfg(target_os = "windows")]
pub mod process;

#[cfg(target_os = "windows")]
pub mod elevation;
