// UAC elevation: token check and "runas" relaunch

use std::path::Path;

use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
use windows::Win32::System::SystemInformation::{GetVersionExW, OSVERSIONINFOW};
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetExitCodeProcess, OpenProcessToken, WaitForSingleObject, INFINITE,
};
use windows::Win32::UI::Shell::{ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW};
use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

use host_platform::elevation::{join_args, ElevationLauncher};
use host_platform::error::FacilityError;

use crate::service::to_wide;

/// First Windows major version with UAC (Vista).
const UAC_MAJOR_VERSION: u32 = 6;

#[derive(Debug, Default)]
pub struct UacLauncher;

impl UacLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ElevationLauncher for UacLauncher {
    fn supports_elevation(&self) -> bool {
        let mut info = OSVERSIONINFOW {
            dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOW>() as u32,
            ..Default::default()
        };
        match unsafe { GetVersionExW(&mut info) } {
            Ok(()) => info.dwMajorVersion >= UAC_MAJOR_VERSION,
            Err(e) => {
                debug!("GetVersionExW failed: {}", e);
                false
            }
        }
    }

    fn is_elevated(&self) -> bool {
        is_elevated()
    }

    fn launch_elevated(&self, program: &Path, args: &[String]) -> Result<Option<i32>, FacilityError> {
        let file = to_wide(&program.to_string_lossy());
        let verb = to_wide("runas");
        let params = to_wide(&join_args(args));

        let mut sei = SHELLEXECUTEINFOW {
            cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
            fMask: SEE_MASK_NOCLOSEPROCESS,
            lpVerb: PCWSTR(verb.as_ptr()),
            lpFile: PCWSTR(file.as_ptr()),
            lpParameters: PCWSTR(params.as_ptr()),
            nShow: SW_SHOWNORMAL.0,
            ..Default::default()
        };

        unsafe {
            ShellExecuteExW(&mut sei)
                .map_err(|e| FacilityError::native("ShellExecuteExW (runas)", e))?;

            let process = sei.hProcess;
            if process.is_invalid() {
                return Ok(None);
            }

            WaitForSingleObject(process, INFINITE);
            let mut code = 0u32;
            let exit = GetExitCodeProcess(process, &mut code).ok().map(|_| code as i32);
            let _ = CloseHandle(process);
            Ok(exit)
        }
    }
}

/// Check if the current process token is elevated.
pub fn is_elevated() -> bool {
    unsafe {
        let mut token = HANDLE::default();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
            return false;
        }

        let mut elevation = TOKEN_ELEVATION::default();
        let mut ret_len = 0u32;
        let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_len,
        );
        let _ = CloseHandle(token);
        ok.is_ok() && elevation.TokenIsElevated != 0
    }
}
