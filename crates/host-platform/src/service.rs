use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{FacilityError, HostError};

/// Interval between status polls while waiting for a transition.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lowest control code a service accepts from outside the service manager.
pub const USER_CONTROL_MIN: u32 = 128;
/// Highest user-defined control code.
pub const USER_CONTROL_MAX: u32 = 255;

/// Name under which a service is registered with the service manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Result<Self, HostError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HostError::InvalidSettings(
                "service name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(HostError::InvalidSettings(format!(
                "service name {:?} cannot contain path separators",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Service managers compare names case-insensitively.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = HostError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ServiceName::new(value)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a service as reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

impl ServiceStatus {
    /// Transient states are observed, never waited for.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ServiceStatus::StartPending
                | ServiceStatus::StopPending
                | ServiceStatus::ContinuePending
                | ServiceStatus::PausePending
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::StartPending => "start pending",
            ServiceStatus::StopPending => "stop pending",
            ServiceStatus::Running => "running",
            ServiceStatus::ContinuePending => "continue pending",
            ServiceStatus::PausePending => "pause pending",
            ServiceStatus::Paused => "paused",
        };
        f.write_str(text)
    }
}

/// Outcome of a start or stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in (or already moving toward) the requested state; nothing sent.
    AlreadyInState(ServiceStatus),
    /// The current state does not allow the request; nothing sent.
    Deferred(ServiceStatus),
    /// Request sent and the target state was observed.
    Reached(ServiceStatus),
    /// Request sent but the target was not observed in time; carries the last status seen.
    TimedOut(ServiceStatus),
}

impl Transition {
    pub fn status(self) -> ServiceStatus {
        match self {
            Transition::AlreadyInState(s)
            | Transition::Deferred(s)
            | Transition::Reached(s)
            | Transition::TimedOut(s) => s,
        }
    }
}

/// A connection to the native service manager.
pub trait ServiceControlFacility: Send + Sync {
    /// Names of every registered service.
    fn service_names(&self) -> Result<Vec<String>, FacilityError>;

    /// Open a handle to a single service. The handle is released when dropped.
    fn open(&self, name: &ServiceName) -> Result<Box<dyn ServiceHandle + '_>, FacilityError>;
}

/// An open handle to one service.
pub trait ServiceHandle {
    fn status(&self) -> Result<ServiceStatus, FacilityError>;

    fn start(&self) -> Result<(), FacilityError>;

    fn stop(&self) -> Result<(), FacilityError>;

    /// Continue a paused service.
    fn resume(&self) -> Result<(), FacilityError>;

    /// Deliver a user-defined control code.
    fn control(&self, code: u32) -> Result<(), FacilityError>;

    /// Block until `target` is observed or `timeout` elapses; returns the last status seen.
    fn wait_for_status(
        &self,
        target: ServiceStatus,
        timeout: Duration,
    ) -> Result<ServiceStatus, FacilityError> {
        // a timeout too large to represent means no deadline
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let current = self.status()?;
            if current == target {
                return Ok(current);
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(current);
                    }
                    POLL_INTERVAL.min(deadline - now)
                }
                None => POLL_INTERVAL,
            };
            std::thread::sleep(pause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_rejects_empty() {
        assert!(ServiceName::new("").is_err());
        assert!(ServiceName::new("   ").is_err());
        assert!(ServiceName::new("a\\b").is_err());
        assert_eq!(ServiceName::new("Spooler").unwrap().as_str(), "Spooler");
    }

    #[test]
    fn test_service_name_matches_case_insensitively() {
        let name = ServiceName::new("MyService").unwrap();
        assert!(name.matches("myservice"));
        assert!(name.matches("MYSERVICE"));
        assert!(!name.matches("MyService2"));
    }

    #[test]
    fn test_service_name_deserialize_validates() {
        let ok: ServiceName = serde_json::from_str("\"backup\"").unwrap();
        assert_eq!(ok.as_str(), "backup");
        assert!(serde_json::from_str::<ServiceName>("\"\"").is_err());
    }

    #[test]
    fn test_pending_states() {
        assert!(ServiceStatus::StartPending.is_pending());
        assert!(ServiceStatus::PausePending.is_pending());
        assert!(!ServiceStatus::Paused.is_pending());
        assert!(!ServiceStatus::Running.is_pending());
    }

    struct Fixed(ServiceStatus);

    impl ServiceHandle for Fixed {
        fn status(&self) -> Result<ServiceStatus, FacilityError> {
            Ok(self.0)
        }
        fn start(&self) -> Result<(), FacilityError> {
            Ok(())
        }
        fn stop(&self) -> Result<(), FacilityError> {
            Ok(())
        }
        fn resume(&self) -> Result<(), FacilityError> {
            Ok(())
        }
        fn control(&self, _code: u32) -> Result<(), FacilityError> {
            Ok(())
        }
    }

    #[test]
    fn test_wait_returns_last_status_on_timeout() {
        let handle = Fixed(ServiceStatus::StartPending);
        let seen = handle
            .wait_for_status(ServiceStatus::Running, Duration::from_millis(10))
            .unwrap();
        assert_eq!(seen, ServiceStatus::StartPending);
    }

    /// Reports StartPending for a few polls, then Running.
    struct Warming(std::cell::Cell<u32>);

    impl ServiceHandle for Warming {
        fn status(&self) -> Result<ServiceStatus, FacilityError> {
            let polls = self.0.get();
            self.0.set(polls + 1);
            Ok(if polls < 2 {
                ServiceStatus::StartPending
            } else {
                ServiceStatus::Running
            })
        }
        fn start(&self) -> Result<(), FacilityError> {
            Ok(())
        }
        fn stop(&self) -> Result<(), FacilityError> {
            Ok(())
        }
        fn resume(&self) -> Result<(), FacilityError> {
            Ok(())
        }
        fn control(&self, _code: u32) -> Result<(), FacilityError> {
            Ok(())
        }
    }

    #[test]
    fn test_wait_with_unbounded_timeout() {
        let handle = Warming(std::cell::Cell::new(0));
        let seen = handle
            .wait_for_status(ServiceStatus::Running, Duration::MAX)
            .unwrap();
        assert_eq!(seen, ServiceStatus::Running);
        assert_eq!(handle.0.get(), 3);
    }

    #[test]
    fn test_wait_returns_immediately_when_reached() {
        let handle = Fixed(ServiceStatus::Running);
        let started = Instant::now();
        let seen = handle
            .wait_for_status(ServiceStatus::Running, Duration::from_secs(30))
            .unwrap();
        assert_eq!(seen, ServiceStatus::Running);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
