//! systemd facility driven through `systemctl`.
//!
//! Start and stop are queued with `--no-block`; the caller polls status. The
//! handle holds no native resource, it only remembers the unit name.

use std::collections::BTreeSet;
use std::process::Command;

use tracing::debug;

use host_platform::error::FacilityError;
use host_platform::service::{
    ServiceControlFacility, ServiceHandle, ServiceName, ServiceStatus, USER_CONTROL_MIN,
};

const UNIT_SUFFIX: &str = ".service";

/// Highest offset from SIGRTMIN a control code may map to.
const MAX_RT_OFFSET: u32 = 30;

/// `backup` → `backup.service`; names that already carry the suffix are kept.
pub fn unit_name(name: &str) -> String {
    if name.ends_with(UNIT_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, UNIT_SUFFIX)
    }
}

/// Run systemctl and return stdout, mapping failures onto the facility taxonomy.
pub(crate) fn systemctl(unit: &str, args: &[&str]) -> Result<String, FacilityError> {
    debug!("systemctl {}", args.join(" "));
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .map_err(|e| FacilityError::native("run systemctl", e))?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(classify_failure(unit, &args.join(" "), stderr.trim()))
}

pub(crate) fn classify_failure(unit: &str, command: &str, stderr: &str) -> FacilityError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("access denied")
        || lower.contains("authentication is required")
        || lower.contains("permission denied")
    {
        FacilityError::AccessDenied(format!("systemctl {}", command))
    } else if lower.contains("not found") || lower.contains("not loaded") {
        FacilityError::NotFound(unit.to_string())
    } else if lower.contains("is destructive")
        || lower.contains("not applicable")
        || lower.contains("canceled")
    {
        // a conflicting job is queued for the unit
        FacilityError::InvalidState {
            service: unit.to_string(),
            operation: command.split_whitespace().next().unwrap_or("change").to_string(),
        }
    } else {
        FacilityError::native(
            format!("systemctl {}", command),
            anyhow::anyhow!("{}", stderr),
        )
    }
}

/// Properties read from `systemctl show`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitState {
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
}

pub fn parse_show(output: &str) -> UnitState {
    let mut state = UnitState::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "LoadState" => state.load_state = value,
            "ActiveState" => state.active_state = value,
            "SubState" => state.sub_state = value,
            _ => {}
        }
    }
    state
}

pub fn map_state(unit: &str, state: &UnitState) -> Result<ServiceStatus, FacilityError> {
    if state.load_state == "not-found" {
        return Err(FacilityError::NotFound(unit.to_string()));
    }
    match state.active_state.as_str() {
        "active" | "reloading" | "refreshing" => Ok(ServiceStatus::Running),
        "activating" => Ok(ServiceStatus::StartPending),
        "deactivating" => Ok(ServiceStatus::StopPending),
        "inactive" | "failed" => Ok(ServiceStatus::Stopped),
        other => Err(FacilityError::native(
            format!("read state of {}", unit),
            anyhow::anyhow!("unknown ActiveState {:?} (sub-state {:?})", other, state.sub_state),
        )),
    }
}

/// Service names from `list-unit-files` / `list-units` output, suffix removed.
/// Template units (`getty@.service`) are skipped.
pub fn parse_unit_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|unit| unit.strip_suffix(UNIT_SUFFIX))
        .filter(|name| !name.is_empty() && !name.ends_with('@'))
        .map(str::to_string)
        .collect()
}

// ── Facility ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SystemdFacility;

impl SystemdFacility {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceControlFacility for SystemdFacility {
    fn service_names(&self) -> Result<Vec<String>, FacilityError> {
        let files = systemctl(
            "*",
            &["list-unit-files", "--type=service", "--no-legend", "--no-pager"],
        )?;
        let loaded = systemctl(
            "*",
            &["list-units", "--type=service", "--all", "--plain", "--no-legend", "--no-pager"],
        )?;

        let names: BTreeSet<String> = parse_unit_list(&files)
            .into_iter()
            .chain(parse_unit_list(&loaded))
            .collect();
        Ok(names.into_iter().collect())
    }

    fn open(&self, name: &ServiceName) -> Result<Box<dyn ServiceHandle + '_>, FacilityError> {
        let handle = SystemdHandle {
            unit: unit_name(name.as_str()),
        };
        // fail fast on unknown units, like OpenService does
        handle.status()?;
        Ok(Box::new(handle))
    }
}

struct SystemdHandle {
    unit: String,
}

impl ServiceHandle for SystemdHandle {
    fn status(&self) -> Result<ServiceStatus, FacilityError> {
        let output = systemctl(
            &self.unit,
            &["show", "-p", "LoadState,ActiveState,SubState", &self.unit],
        )?;
        map_state(&self.unit, &parse_show(&output))
    }

    fn start(&self) -> Result<(), FacilityError> {
        systemctl(&self.unit, &["start", "--no-block", "--no-ask-password", &self.unit])?;
        Ok(())
    }

    fn stop(&self) -> Result<(), FacilityError> {
        systemctl(&self.unit, &["stop", "--no-block", "--no-ask-password", &self.unit])?;
        Ok(())
    }

    fn resume(&self) -> Result<(), FacilityError> {
        Err(FacilityError::Unsupported(
            "systemd units cannot be paused or continued".to_string(),
        ))
    }

    fn control(&self, code: u32) -> Result<(), FacilityError> {
        let signal = control_signal(code).ok_or_else(|| {
            FacilityError::Unsupported(format!(
                "control code {} has no real-time signal on this system",
                code
            ))
        })?;
        let signal = format!("--signal={}", signal);
        systemctl(
            &self.unit,
            &["kill", "--kill-who=main", "--no-ask-password", &signal, &self.unit],
        )?;
        Ok(())
    }
}

impl Drop for SystemdHandle {
    fn drop(&mut self) {
        debug!("released {}", self.unit);
    }
}

/// User control codes are delivered as `SIGRTMIN+n` where `n = code - 128`.
pub fn control_signal(code: u32) -> Option<String> {
    let offset = code.checked_sub(USER_CONTROL_MIN)?;
    (offset <= MAX_RT_OFFSET).then(|| format!("SIGRTMIN+{}", offset))
}
