//! In-memory host environment for running without a service manager.
//!
//! Nothing is ever installed, every service reads as stopped, and no request
//! reaches the operating system. Install and uninstall still run the caller's
//! action hooks in order so the surrounding flow can be exercised.

use std::time::Duration;

use tracing::info;

use host_platform::environment::HostEnvironment;
use host_platform::error::HostError;
use host_platform::service::{
    ServiceName, ServiceStatus, Transition, USER_CONTROL_MAX, USER_CONTROL_MIN,
};
use host_platform::settings::{InstallSettings, TransactionHooks};

#[derive(Debug, Default)]
pub struct TestHostEnvironment {
    args: Vec<String>,
}

impl TestHostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl HostEnvironment for TestHostEnvironment {
    fn is_service_installed(&self, _name: &ServiceName) -> Result<bool, HostError> {
        Ok(false)
    }

    fn is_service_stopped(&self, _name: &ServiceName) -> Result<bool, HostError> {
        Ok(true)
    }

    fn service_status(&self, _name: &ServiceName) -> Result<ServiceStatus, HostError> {
        Ok(ServiceStatus::Stopped)
    }

    fn start_service(&self, name: &ServiceName, _timeout: Duration) -> Result<Transition, HostError> {
        info!("test host: not starting the {} service", name);
        Ok(Transition::Deferred(ServiceStatus::Stopped))
    }

    fn stop_service(&self, name: &ServiceName, _timeout: Duration) -> Result<Transition, HostError> {
        info!("the {} service is not running", name);
        Ok(Transition::AlreadyInState(ServiceStatus::Stopped))
    }

    fn send_service_command(&self, name: &ServiceName, code: u32) -> Result<bool, HostError> {
        if !(USER_CONTROL_MIN..=USER_CONTROL_MAX).contains(&code) {
            return Err(HostError::InvalidCommand(code));
        }
        info!("test host: command {} for the {} service dropped", code, name);
        Ok(false)
    }

    fn install_service(
        &self,
        settings: &InstallSettings,
        mut hooks: TransactionHooks<'_>,
    ) -> Result<(), HostError> {
        hooks.run_before_action(settings)?;
        info!("test host: pretending to install the {} service", settings.name());
        hooks.run_after_action()
    }

    fn uninstall_service(
        &self,
        settings: &InstallSettings,
        mut hooks: TransactionHooks<'_>,
    ) -> Result<(), HostError> {
        hooks.run_before_action(settings)?;
        info!("test host: pretending to uninstall the {} service", settings.name());
        hooks.run_after_action()
    }

    fn is_running_as_service(&self) -> bool {
        false
    }

    fn is_administrator(&self) -> bool {
        false
    }

    fn run_as_administrator(&self) -> bool {
        false
    }

    fn command_line(&self) -> String {
        host_platform::elevation::join_args(&self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{name, Journal};

    #[test]
    fn test_reports_nothing_installed_and_stopped() {
        let env = TestHostEnvironment::new();
        let svc = name("anything");
        assert!(!env.is_service_installed(&svc).unwrap());
        assert!(env.is_service_stopped(&svc).unwrap());
        assert_eq!(env.service_status(&svc).unwrap(), ServiceStatus::Stopped);
        assert!(!env.is_running_as_service());
        assert!(!env.run_as_administrator());
    }

    #[test]
    fn test_commands_never_dispatched() {
        let env = TestHostEnvironment::new();
        assert!(!env.send_service_command(&name("svc"), 200).unwrap());
        assert!(matches!(
            env.send_service_command(&name("svc"), 3),
            Err(HostError::InvalidCommand(3))
        ));
    }

    #[test]
    fn test_install_runs_action_hooks_in_order() {
        let journal = Journal::default();
        let (before, after, rollback) = (journal.clone(), journal.clone(), journal.clone());
        let hooks = TransactionHooks::new()
            .before_action(move |_| {
                before.push("before_action");
                Ok(())
            })
            .after_action(move || {
                after.push("after_action");
                Ok(())
            })
            .before_rollback(move || {
                rollback.push("before_rollback");
                Ok(())
            });

        let settings = InstallSettings::new(name("svc"), "/bin/svc");
        TestHostEnvironment::new().install_service(&settings, hooks).unwrap();
        assert_eq!(journal.entries(), vec!["before_action", "after_action"]);
    }
}
