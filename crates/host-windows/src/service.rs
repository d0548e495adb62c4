//! Service Control Manager facility.
//!
//! Every handle is opened for the narrowest access the operation needs and is
//! closed when dropped, so a non-administrator can still query status.

use std::ffi::OsStr;

use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::ERROR_MORE_DATA;
use windows::Win32::System::Services::{
    CloseServiceHandle, ControlService, EnumServicesStatusExW, OpenSCManagerW, OpenServiceW,
    ENUM_SERVICE_STATUS_PROCESSW, SC_ENUM_PROCESS_INFO, SC_HANDLE, SC_MANAGER_CONNECT,
    SC_MANAGER_ENUMERATE_SERVICE, SERVICE_STATE_ALL, SERVICE_STATUS, SERVICE_USER_DEFINED_CONTROL,
    SERVICE_WIN32,
};
use windows_service::service::{Service, ServiceAccess, ServiceState};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

use host_platform::error::FacilityError;
use host_platform::service::{ServiceControlFacility, ServiceHandle, ServiceName, ServiceStatus};

const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_CANNOT_ACCEPT_CTRL: i32 = 1061;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

// ── Error mapping ──────────────────────────────────────────────────────────

/// Map a Win32 error code from an SCM call onto the facility taxonomy.
pub(crate) fn classify(
    code: Option<i32>,
    service: &str,
    operation: &str,
    source: anyhow::Error,
) -> FacilityError {
    match code {
        Some(ERROR_SERVICE_DOES_NOT_EXIST) => FacilityError::NotFound(service.to_string()),
        Some(ERROR_ACCESS_DENIED) => {
            FacilityError::AccessDenied(format!("{} service {}", operation, service))
        }
        Some(
            ERROR_SERVICE_ALREADY_RUNNING
            | ERROR_SERVICE_CANNOT_ACCEPT_CTRL
            | ERROR_SERVICE_NOT_ACTIVE,
        ) => FacilityError::InvalidState {
            service: service.to_string(),
            operation: operation.to_string(),
        },
        _ => FacilityError::native(format!("{} service {}", operation, service), source),
    }
}

pub(crate) fn scm_error(err: windows_service::Error, service: &str, operation: &str) -> FacilityError {
    let code = match &err {
        windows_service::Error::Winapi(io) => io.raw_os_error(),
        _ => None,
    };
    classify(code, service, operation, err.into())
}

pub(crate) fn win32_error(err: windows::core::Error, service: &str, operation: &str) -> FacilityError {
    // HRESULT_FROM_WIN32 packs the code as 0x8007xxxx
    let hr = err.code().0 as u32;
    let code = if hr & 0xFFFF_0000 == 0x8007_0000 {
        Some((hr & 0xFFFF) as i32)
    } else {
        None
    };
    classify(code, service, operation, err.into())
}

pub(crate) fn map_state(state: ServiceState) -> ServiceStatus {
    match state {
        ServiceState::Stopped => ServiceStatus::Stopped,
        ServiceState::StartPending => ServiceStatus::StartPending,
        ServiceState::StopPending => ServiceStatus::StopPending,
        ServiceState::Running => ServiceStatus::Running,
        ServiceState::ContinuePending => ServiceStatus::ContinuePending,
        ServiceState::PausePending => ServiceStatus::PausePending,
        ServiceState::Paused => ServiceStatus::Paused,
    }
}

pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Raw SCM handle closed on drop.
struct ScHandle(SC_HANDLE);

impl Drop for ScHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseServiceHandle(self.0);
        }
    }
}

// ── Facility ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ScmFacility;

impl ScmFacility {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceControlFacility for ScmFacility {
    fn service_names(&self) -> Result<Vec<String>, FacilityError> {
        enumerate_services()
    }

    fn open(&self, name: &ServiceName) -> Result<Box<dyn ServiceHandle + '_>, FacilityError> {
        let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
            .map_err(|e| scm_error(e, name.as_str(), "connect to the service manager for"))?;
        let query = manager
            .open_service(name.as_str(), ServiceAccess::QUERY_STATUS)
            .map_err(|e| scm_error(e, name.as_str(), "open"))?;
        debug!("opened the {} service", name);

        Ok(Box::new(ScmHandle {
            name: name.clone(),
            manager,
            query,
        }))
    }
}

struct ScmHandle {
    name: ServiceName,
    manager: ServiceManager,
    query: Service,
}

impl ScmHandle {
    fn open_for(&self, access: ServiceAccess, operation: &str) -> Result<Service, FacilityError> {
        self.manager
            .open_service(self.name.as_str(), access)
            .map_err(|e| scm_error(e, self.name.as_str(), operation))
    }
}

impl ServiceHandle for ScmHandle {
    fn status(&self) -> Result<ServiceStatus, FacilityError> {
        let status = self
            .query
            .query_status()
            .map_err(|e| scm_error(e, self.name.as_str(), "query"))?;
        Ok(map_state(status.current_state))
    }

    fn start(&self) -> Result<(), FacilityError> {
        self.open_for(ServiceAccess::START, "start")?
            .start(&[] as &[&OsStr])
            .map_err(|e| scm_error(e, self.name.as_str(), "start"))
    }

    fn stop(&self) -> Result<(), FacilityError> {
        self.open_for(ServiceAccess::STOP, "stop")?
            .stop()
            .map(|_| ())
            .map_err(|e| scm_error(e, self.name.as_str(), "stop"))
    }

    fn resume(&self) -> Result<(), FacilityError> {
        self.open_for(ServiceAccess::PAUSE_CONTINUE, "continue")?
            .resume()
            .map(|_| ())
            .map_err(|e| scm_error(e, self.name.as_str(), "continue"))
    }

    fn control(&self, code: u32) -> Result<(), FacilityError> {
        send_control(&self.name, code)
    }
}

impl Drop for ScmHandle {
    fn drop(&mut self) {
        debug!("closed the {} service", self.name);
    }
}

fn send_control(name: &ServiceName, code: u32) -> Result<(), FacilityError> {
    let wide = to_wide(name.as_str());
    unsafe {
        let manager = OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT)
            .map(ScHandle)
            .map_err(|e| win32_error(e, name.as_str(), "connect to the service manager for"))?;
        let service = OpenServiceW(manager.0, PCWSTR(wide.as_ptr()), SERVICE_USER_DEFINED_CONTROL)
            .map(ScHandle)
            .map_err(|e| win32_error(e, name.as_str(), "open"))?;

        let mut status = SERVICE_STATUS::default();
        ControlService(service.0, code, &mut status)
            .map_err(|e| win32_error(e, name.as_str(), "send a command to"))?;
    }
    Ok(())
}

// ── Enumeration ────────────────────────────────────────────────────────────

fn enumerate_services() -> Result<Vec<String>, FacilityError> {
    const ALL: &str = "*";

    unsafe {
        let manager = OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_ENUMERATE_SERVICE)
            .map(ScHandle)
            .map_err(|e| win32_error(e, ALL, "enumerate"))?;

        let mut names = Vec::new();
        let mut resume = 0u32;
        // u64 storage keeps the returned structs aligned
        let mut buffer: Vec<u64> = vec![0; 8 * 1024];

        loop {
            let capacity = buffer.len() * std::mem::size_of::<u64>();
            let bytes = std::slice::from_raw_parts_mut(buffer.as_mut_ptr() as *mut u8, capacity);
            let mut needed = 0u32;
            let mut returned = 0u32;

            let more = match EnumServicesStatusExW(
                manager.0,
                SC_ENUM_PROCESS_INFO,
                SERVICE_WIN32,
                SERVICE_STATE_ALL,
                Some(bytes),
                &mut needed,
                &mut returned,
                Some(&mut resume),
                PCWSTR::null(),
            ) {
                Ok(()) => false,
                Err(e) if e.code() == ERROR_MORE_DATA.to_hresult() => true,
                Err(e) => return Err(win32_error(e, ALL, "enumerate")),
            };

            let entries = std::slice::from_raw_parts(
                buffer.as_ptr() as *const ENUM_SERVICE_STATUS_PROCESSW,
                returned as usize,
            );
            for entry in entries {
                match entry.lpServiceName.to_string() {
                    Ok(name) => names.push(name),
                    Err(e) => debug!("skipping service with unreadable name: {}", e),
                }
            }

            if !more {
                break;
            }
            if needed as usize > capacity {
                buffer.resize(needed as usize / std::mem::size_of::<u64>() + 1, 0);
            }
        }

        debug!("service manager lists {} services", names.len());
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_taxonomy() {
        let native = || anyhow::anyhow!("os error");
        assert!(matches!(
            classify(Some(1060), "svc", "open", native()),
            FacilityError::NotFound(_)
        ));
        assert!(matches!(
            classify(Some(5), "svc", "start", native()),
            FacilityError::AccessDenied(_)
        ));
        assert!(matches!(
            classify(Some(1062), "svc", "stop", native()),
            FacilityError::InvalidState { .. }
        ));
        assert!(matches!(
            classify(Some(2), "svc", "start", native()),
            FacilityError::Native { .. }
        ));
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(map_state(ServiceState::Paused), ServiceStatus::Paused);
        assert_eq!(map_state(ServiceState::StopPending), ServiceStatus::StopPending);
    }

    #[test]
    fn test_wide_strings_are_nul_terminated() {
        assert_eq!(to_wide("ab"), vec![b'a' as u16, b'b' as u16, 0]);
    }
}
