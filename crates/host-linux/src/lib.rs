// Linux backend for the service host (systemd)

#[cfg(target_os = "linux")]
pub mod service;

#[cfg(target_os = "linux")]
pub mod installer;

#[cfg(target_os = "linux")]
pub mod process;

#[cfg(target_os = "linux")]
pub mod elevation;
