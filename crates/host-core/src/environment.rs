//! The host environment backed by a real service manager.

use std::time::Duration;

use host_platform::elevation::{join_args, ElevationLauncher};
use host_platform::environment::HostEnvironment;
use host_platform::error::HostError;
use host_platform::installer::ServiceInstaller;
use host_platform::process::ProcessTable;
use host_platform::service::{ServiceControlFacility, ServiceName, ServiceStatus, Transition};
use host_platform::settings::{InstallSettings, TransactionHooks};

use crate::{ancestry, driver, elevation, prober, transaction};

/// Composes the native backends behind [`HostEnvironment`].
pub struct ServiceHostEnvironment {
    facility: Box<dyn ServiceControlFacility>,
    installer: Box<dyn ServiceInstaller>,
    processes: Box<dyn ProcessTable>,
    launcher: Box<dyn ElevationLauncher>,
    args: Vec<String>,
}

impl ServiceHostEnvironment {
    /// Records this process's arguments (without the program name) for
    /// `command_line` and elevated relaunch.
    pub fn new(
        facility: Box<dyn ServiceControlFacility>,
        installer: Box<dyn ServiceInstaller>,
        processes: Box<dyn ProcessTable>,
        launcher: Box<dyn ElevationLauncher>,
    ) -> Self {
        let args = std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        Self {
            facility,
            installer,
            processes,
            launcher,
            args,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl HostEnvironment for ServiceHostEnvironment {
    fn is_service_installed(&self, name: &ServiceName) -> Result<bool, HostError> {
        prober::exists(self.facility.as_ref(), name)
    }

    fn is_service_stopped(&self, name: &ServiceName) -> Result<bool, HostError> {
        Ok(self.service_status(name)? == ServiceStatus::Stopped)
    }

    fn service_status(&self, name: &ServiceName) -> Result<ServiceStatus, HostError> {
        prober::probe(self.facility.as_ref(), name)
    }

    fn start_service(&self, name: &ServiceName, timeout: Duration) -> Result<Transition, HostError> {
        driver::ensure_running(self.facility.as_ref(), name, timeout)
    }

    fn stop_service(&self, name: &ServiceName, timeout: Duration) -> Result<Transition, HostError> {
        driver::ensure_stopped(self.facility.as_ref(), name, timeout)
    }

    fn send_service_command(&self, name: &ServiceName, code: u32) -> Result<bool, HostError> {
        driver::send_command(self.facility.as_ref(), name, code)
    }

    fn install_service(
        &self,
        settings: &InstallSettings,
        hooks: TransactionHooks<'_>,
    ) -> Result<(), HostError> {
        transaction::install(self.installer.as_ref(), settings, hooks)
    }

    fn uninstall_service(
        &self,
        settings: &InstallSettings,
        hooks: TransactionHooks<'_>,
    ) -> Result<(), HostError> {
        transaction::uninstall(self.installer.as_ref(), settings, hooks)
    }

    fn is_running_as_service(&self) -> bool {
        ancestry::is_running_under_service_manager(self.processes.as_ref(), std::process::id())
    }

    fn is_administrator(&self) -> bool {
        self.launcher.is_elevated()
    }

    fn run_as_administrator(&self) -> bool {
        elevation::relaunch_elevated(self.launcher.as_ref(), &self.args)
    }

    fn command_line(&self) -> String {
        join_args(&self.args)
    }
}
