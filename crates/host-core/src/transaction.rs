//! Install and uninstall wrapped in caller hooks, with rollback on failure.
//!
//! The native transaction is a scoped value: it is dropped (and its native
//! resources released) before any result, including a hook error, reaches the
//! caller.

use tracing::{error, info, warn};

use host_platform::error::HostError;
use host_platform::installer::ServiceInstaller;
use host_platform::settings::{InstallSettings, TransactionHooks};

use crate::account;

pub fn install(
    installer: &dyn ServiceInstaller,
    settings: &InstallSettings,
    mut hooks: TransactionHooks<'_>,
) -> Result<(), HostError> {
    let service = settings.name().to_string();
    let mut transaction = installer.begin(settings)?;

    hooks.run_before_action(settings)?;

    let login = account::resolve_login(settings);
    transaction.apply_login(&login);

    info!("installing the {} service", service);
    match transaction.install() {
        Ok(()) => {
            info!("the {} service was installed", service);
            hooks.run_after_action()
        }
        Err(source) => {
            error!("installing the {} service failed: {}", service, source);

            let before = hooks.run_before_rollback();
            if let Err(e) = transaction.rollback() {
                warn!("rolling back the {} service failed: {}", service, e);
            }
            before?;
            hooks.run_after_rollback()?;

            info!("rolled back the {} service", service);
            Err(HostError::Install { service, source })
        }
    }
}

pub fn uninstall(
    installer: &dyn ServiceInstaller,
    settings: &InstallSettings,
    mut hooks: TransactionHooks<'_>,
) -> Result<(), HostError> {
    let service = settings.name().to_string();
    let mut transaction = installer.begin(settings)?;

    hooks.run_before_action(settings)?;

    info!("uninstalling the {} service", service);
    transaction
        .uninstall()
        .map_err(|source| HostError::Uninstall {
            service: service.clone(),
            source,
        })?;
    info!("the {} service was uninstalled", service);

    hooks.run_after_action()
}
