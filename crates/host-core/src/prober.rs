//! Read-only queries against the service manager.

use tracing::debug;

use host_platform::error::{FacilityError, HostError};
use host_platform::service::{ServiceControlFacility, ServiceName, ServiceStatus};

/// Current status of `name`. The handle lives only for this call.
pub fn probe(
    facility: &dyn ServiceControlFacility,
    name: &ServiceName,
) -> Result<ServiceStatus, HostError> {
    let handle = facility.open(name)?;
    let status = handle.status()?;
    drop(handle);
    Ok(status)
}

/// Whether `name` is registered. Not being allowed to list services counts as
/// "not installed".
pub fn exists(
    facility: &dyn ServiceControlFacility,
    name: &ServiceName,
) -> Result<bool, HostError> {
    match facility.service_names() {
        Ok(names) => Ok(names.iter().any(|n| name.matches(n))),
        Err(FacilityError::AccessDenied(_)) => {
            debug!("cannot access service list due to permissions; assuming not installed");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{name, Call, StubFacility};

    #[test]
    fn test_probe_reads_status_and_releases_handle() {
        let facility = StubFacility::new().with_service("Spooler", ServiceStatus::Paused);
        assert_eq!(probe(&facility, &name("Spooler")).unwrap(), ServiceStatus::Paused);
        assert_eq!(
            facility.calls(),
            vec![Call::Open("Spooler".to_string()), Call::Status, Call::Release]
        );
    }

    #[test]
    fn test_unknown_service_probe_fails_but_exists_is_false() {
        let facility = StubFacility::new().with_service("Spooler", ServiceStatus::Running);
        let err = probe(&facility, &name("Missing")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!exists(&facility, &name("Missing")).unwrap());
    }

    #[test]
    fn test_exists_ignores_case() {
        let facility = StubFacility::new().with_service("Spooler", ServiceStatus::Stopped);
        assert!(exists(&facility, &name("spooler")).unwrap());
    }

    #[test]
    fn test_exists_swallows_access_denied() {
        let facility = StubFacility::new()
            .with_service("Spooler", ServiceStatus::Running)
            .deny_listing();
        assert!(!exists(&facility, &name("Spooler")).unwrap());
    }
}
