//! Service registration through the Service Control Manager.

use std::ffi::OsString;

use tracing::{debug, info, warn};
use windows_service::service::{
    ServiceAccess, ServiceDependency, ServiceErrorControl, ServiceInfo, ServiceStartType,
    ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

use host_platform::error::FacilityError;
use host_platform::installer::{InstallTransaction, ServiceInstaller};
use host_platform::settings::{AccountKind, AccountLogin, InstallSettings, StartMode};

use crate::service::scm_error;

#[derive(Debug, Default)]
pub struct ScmInstaller;

impl ScmInstaller {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceInstaller for ScmInstaller {
    fn begin<'a>(
        &'a self,
        settings: &'a InstallSettings,
    ) -> Result<Box<dyn InstallTransaction + 'a>, FacilityError> {
        let manager = ServiceManager::local_computer(
            None::<&str>,
            ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
        )
        .map_err(|e| scm_error(e, settings.name().as_str(), "connect to the service manager for"))?;

        Ok(Box::new(ScmTransaction {
            settings,
            manager,
            login: AccountLogin::default(),
            created: false,
        }))
    }
}

struct ScmTransaction<'a> {
    settings: &'a InstallSettings,
    manager: ServiceManager,
    login: AccountLogin,
    /// Set once `create_service` succeeded; rollback only deletes what we made.
    created: bool,
}

impl ScmTransaction<'_> {
    fn name(&self) -> &str {
        self.settings.name().as_str()
    }

    fn service_info(&self) -> ServiceInfo {
        let start_type = match self.settings.start_mode() {
            StartMode::Automatic => ServiceStartType::AutoStart,
            StartMode::Manual => ServiceStartType::OnDemand,
            StartMode::Disabled => ServiceStartType::Disabled,
        };

        ServiceInfo {
            name: OsString::from(self.name()),
            display_name: OsString::from(self.settings.display_name()),
            service_type: ServiceType::OWN_PROCESS,
            start_type,
            error_control: ServiceErrorControl::Normal,
            executable_path: self.settings.executable_path().to_path_buf(),
            launch_arguments: self
                .settings
                .launch_arguments()
                .iter()
                .map(OsString::from)
                .collect(),
            dependencies: self
                .settings
                .dependencies()
                .iter()
                .map(|d| ServiceDependency::Service(OsString::from(d.as_str())))
                .collect(),
            account_name: self.login.username.as_deref().map(OsString::from),
            account_password: self.login.password.as_deref().map(OsString::from),
        }
    }
}

impl InstallTransaction for ScmTransaction<'_> {
    fn apply_login(&mut self, login: &AccountLogin) {
        self.login = login.clone();
    }

    fn install(&mut self) -> Result<(), FacilityError> {
        if self.login.kind == AccountKind::User
            && self.login.password.is_none()
            && !self.login.have_login_info
        {
            return Err(FacilityError::native(
                format!("install service {}", self.name()),
                anyhow::anyhow!(
                    "no password given for account {}",
                    self.login.username.as_deref().unwrap_or_default()
                ),
            ));
        }

        let info = self.service_info();
        let service = self
            .manager
            .create_service(&info, ServiceAccess::CHANGE_CONFIG | ServiceAccess::DELETE)
            .map_err(|e| scm_error(e, self.name(), "create"))?;
        self.created = true;
        info!("registered {} with the service control manager", self.name());

        if !self.settings.description().is_empty() {
            service
                .set_description(self.settings.description())
                .map_err(|e| scm_error(e, self.name(), "describe"))?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), FacilityError> {
        if !self.created {
            debug!("nothing to roll back for {}", self.name());
            return Ok(());
        }
        let service = self
            .manager
            .open_service(self.name(), ServiceAccess::DELETE)
            .map_err(|e| scm_error(e, self.name(), "open"))?;
        service
            .delete()
            .map_err(|e| scm_error(e, self.name(), "delete"))?;
        self.created = false;
        warn!("removed partially installed service {}", self.name());
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), FacilityError> {
        let service = self
            .manager
            .open_service(self.name(), ServiceAccess::DELETE)
            .map_err(|e| scm_error(e, self.name(), "open"))?;
        service
            .delete()
            .map_err(|e| scm_error(e, self.name(), "delete"))?;
        info!("{} marked for deletion", self.name());
        Ok(())
    }
}

impl Drop for ScmTransaction<'_> {
    fn drop(&mut self) {
        debug!("closed installer for {}", self.name());
    }
}
