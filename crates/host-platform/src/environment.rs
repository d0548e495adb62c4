use std::time::Duration;

use crate::error::HostError;
use crate::service::{ServiceName, ServiceStatus, Transition};
use crate::settings::{InstallSettings, TransactionHooks};

/// Everything the application may ask of the host operating system.
///
/// Implementations never cache service state: every call asks the service
/// manager again. No native handle escapes through this trait.
pub trait HostEnvironment: Send + Sync {
    /// Whether a service with this name is registered. Lack of permission to
    /// list services reads as "not installed".
    fn is_service_installed(&self, name: &ServiceName) -> Result<bool, HostError>;

    fn is_service_stopped(&self, name: &ServiceName) -> Result<bool, HostError>;

    /// Current status. Fails if the service cannot be opened (e.g. not installed).
    fn service_status(&self, name: &ServiceName) -> Result<ServiceStatus, HostError>;

    /// Start the service and wait up to `timeout` for it to run.
    fn start_service(&self, name: &ServiceName, timeout: Duration) -> Result<Transition, HostError>;

    /// Stop the service and wait up to `timeout` for it to stop.
    fn stop_service(&self, name: &ServiceName, timeout: Duration) -> Result<Transition, HostError>;

    /// Send a user-defined control code. Returns false when the service is not
    /// running and the code was not delivered. A code outside
    /// `USER_CONTROL_MIN..=USER_CONTROL_MAX` fails with
    /// [`HostError::InvalidCommand`] before the service is touched.
    fn send_service_command(&self, name: &ServiceName, code: u32) -> Result<bool, HostError>;

    fn install_service(
        &self,
        settings: &InstallSettings,
        hooks: TransactionHooks<'_>,
    ) -> Result<(), HostError>;

    fn uninstall_service(
        &self,
        settings: &InstallSettings,
        hooks: TransactionHooks<'_>,
    ) -> Result<(), HostError>;

    /// Whether this process was launched by the service manager.
    fn is_running_as_service(&self) -> bool;

    fn is_administrator(&self) -> bool;

    /// Relaunch this executable elevated and wait for it. True if the elevated
    /// child ran to completion.
    fn run_as_administrator(&self) -> bool;

    /// Arguments this process was started with, as one line.
    fn command_line(&self) -> String;
}
