use std::path::Path;

use host_platform::elevation::ElevationLauncher;
use host_platform::error::FacilityError;

/// Root check only; Linux has no elevation prompt to relaunch through.
#[derive(Debug, Default)]
pub struct LinuxElevation;

impl LinuxElevation {
    pub fn new() -> Self {
        Self
    }
}

impl ElevationLauncher for LinuxElevation {
    fn supports_elevation(&self) -> bool {
        false
    }

    fn is_elevated(&self) -> bool {
        nix::unistd::Uid::effective().is_root()
    }

    fn launch_elevated(&self, program: &Path, _args: &[String]) -> Result<Option<i32>, FacilityError> {
        Err(FacilityError::Unsupported(format!(
            "cannot relaunch {} elevated; run it with sudo",
            program.display()
        )))
    }
}
