//! Relaunching the current executable with administrator rights.

use std::path::Path;

use tracing::{debug, info};

use host_platform::elevation::ElevationLauncher;

/// Command-line switch that asks for an elevated relaunch. Never forwarded to
/// the elevated child.
pub const ELEVATION_FLAG: &str = "--sudo";

pub fn strip_elevation_flag(args: &[String]) -> Vec<String> {
    args.iter()
        .filter(|arg| arg.as_str() != ELEVATION_FLAG)
        .cloned()
        .collect()
}

/// Relaunch this executable elevated with `args` and wait for it to exit.
/// True once the elevated child has run to completion.
pub fn relaunch_elevated(launcher: &dyn ElevationLauncher, args: &[String]) -> bool {
    if !launcher.supports_elevation() {
        debug!("elevation is not supported on this system");
        return false;
    }

    let program = match std::env::current_exe() {
        Ok(program) => program,
        Err(e) => {
            debug!("unable to resolve the current executable: {}", e);
            return false;
        }
    };
    relaunch_program(launcher, &program, args)
}

pub fn relaunch_program(launcher: &dyn ElevationLauncher, program: &Path, args: &[String]) -> bool {
    if !launcher.supports_elevation() {
        debug!("elevation is not supported on this system");
        return false;
    }

    let args = strip_elevation_flag(args);
    info!("relaunching {} with administrator rights", program.display());

    match launcher.launch_elevated(program, &args) {
        Ok(Some(code)) => {
            info!("elevated process exited with code {}", code);
            true
        }
        Ok(None) => {
            info!("elevated process exited");
            true
        }
        Err(e) => {
            debug!("unable to start the elevated process: {:#}", anyhow::Error::from(e));
            false
        }
    }
}
