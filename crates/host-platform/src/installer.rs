use crate::error::FacilityError;
use crate::settings::{AccountLogin, InstallSettings};

/// Opens installer transactions against the native service manager.
pub trait ServiceInstaller: Send + Sync {
    /// Acquire a transaction bound to `settings`. It is released when dropped.
    fn begin<'a>(
        &'a self,
        settings: &'a InstallSettings,
    ) -> Result<Box<dyn InstallTransaction + 'a>, FacilityError>;
}

/// One scoped install or uninstall against the native service manager.
pub trait InstallTransaction {
    /// Copy the resolved account onto the pending registration.
    fn apply_login(&mut self, login: &AccountLogin);

    fn install(&mut self) -> Result<(), FacilityError>;

    /// Undo whatever a failed `install` left behind.
    fn rollback(&mut self) -> Result<(), FacilityError>;

    fn uninstall(&mut self) -> Result<(), FacilityError>;
}
