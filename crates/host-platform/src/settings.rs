use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HookPhase, HostError};
use crate::service::ServiceName;

/// How the service manager should start the service at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    #[default]
    Automatic,
    Manual,
    Disabled,
}

/// Account the service runs under.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "account", rename_all = "snake_case")]
pub enum Credentials {
    #[default]
    LocalSystem,
    LocalService,
    NetworkService,
    User {
        username: String,
        password: String,
    },
    /// Group-managed or virtual account; the platform owns the password.
    VirtualOrManagedAccount { username: String },
}

impl Credentials {
    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::User { username, .. }
            | Credentials::VirtualOrManagedAccount { username } => Some(username),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::LocalSystem => f.write_str("LocalSystem"),
            Credentials::LocalService => f.write_str("LocalService"),
            Credentials::NetworkService => f.write_str("NetworkService"),
            Credentials::User { username, .. } => f
                .debug_struct("User")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::VirtualOrManagedAccount { username } => f
                .debug_struct("VirtualOrManagedAccount")
                .field("username", username)
                .finish(),
        }
    }
}

/// Built-in account class resolved from [`Credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountKind {
    #[default]
    LocalSystem,
    LocalService,
    NetworkService,
    User,
}

/// Login fields handed to the native installer.
///
/// `have_login_info` tells the installer the account is complete even when
/// `password` is `None` (managed and virtual accounts), so it must not ask for
/// or require one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountLogin {
    pub kind: AccountKind,
    pub username: Option<String>,
    pub password: Option<String>,
    pub have_login_info: bool,
}

/// Everything the native installer needs to register a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    name: ServiceName,
    display_name: Option<String>,
    description: String,
    executable_path: PathBuf,
    launch_arguments: Vec<String>,
    start_mode: StartMode,
    dependencies: Vec<ServiceName>,
    credentials: Credentials,
}

impl InstallSettings {
    pub fn new(name: ServiceName, executable_path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            display_name: None,
            description: String::new(),
            executable_path: executable_path.into(),
            launch_arguments: Vec::new(),
            start_mode: StartMode::default(),
            dependencies: Vec::new(),
            credentials: Credentials::default(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_launch_arguments(mut self, args: Vec<String>) -> Self {
        self.launch_arguments = args;
        self
    }

    pub fn with_start_mode(mut self, start_mode: StartMode) -> Self {
        self.start_mode = start_mode;
        self
    }

    pub fn with_dependency(mut self, dependency: ServiceName) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Falls back to the service name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.name.as_str())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    pub fn launch_arguments(&self) -> &[String] {
        &self.launch_arguments
    }

    pub fn start_mode(&self) -> StartMode {
        self.start_mode
    }

    pub fn dependencies(&self) -> &[ServiceName] {
        &self.dependencies
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

type SettingsHook<'a> = Box<dyn FnMut(&InstallSettings) -> anyhow::Result<()> + 'a>;
type Hook<'a> = Box<dyn FnMut() -> anyhow::Result<()> + 'a>;

/// Caller callbacks bracketing an install or uninstall. Missing hooks are no-ops.
#[derive(Default)]
pub struct TransactionHooks<'a> {
    before_action: Option<SettingsHook<'a>>,
    after_action: Option<Hook<'a>>,
    before_rollback: Option<Hook<'a>>,
    after_rollback: Option<Hook<'a>>,
}

impl<'a> TransactionHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_action(
        mut self,
        hook: impl FnMut(&InstallSettings) -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.before_action = Some(Box::new(hook));
        self
    }

    pub fn after_action(mut self, hook: impl FnMut() -> anyhow::Result<()> + 'a) -> Self {
        self.after_action = Some(Box::new(hook));
        self
    }

    pub fn before_rollback(mut self, hook: impl FnMut() -> anyhow::Result<()> + 'a) -> Self {
        self.before_rollback = Some(Box::new(hook));
        self
    }

    pub fn after_rollback(mut self, hook: impl FnMut() -> anyhow::Result<()> + 'a) -> Self {
        self.after_rollback = Some(Box::new(hook));
        self
    }

    pub fn run_before_action(&mut self, settings: &InstallSettings) -> Result<(), HostError> {
        match self.before_action.as_mut() {
            Some(hook) => hook(settings).map_err(|source| HostError::Hook {
                phase: HookPhase::BeforeAction,
                source,
            }),
            None => Ok(()),
        }
    }

    pub fn run_after_action(&mut self) -> Result<(), HostError> {
        run_hook(&mut self.after_action, HookPhase::AfterAction)
    }

    pub fn run_before_rollback(&mut self) -> Result<(), HostError> {
        run_hook(&mut self.before_rollback, HookPhase::BeforeRollback)
    }

    pub fn run_after_rollback(&mut self) -> Result<(), HostError> {
        run_hook(&mut self.after_rollback, HookPhase::AfterRollback)
    }
}

fn run_hook(hook: &mut Option<Hook<'_>>, phase: HookPhase) -> Result<(), HostError> {
    match hook.as_mut() {
        Some(hook) => hook().map_err(|source| HostError::Hook { phase, source }),
        None => Ok(()),
    }
}

impl fmt::Debug for TransactionHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHooks")
            .field("before_action", &self.before_action.is_some())
            .field("after_action", &self.after_action.is_some())
            .field("before_rollback", &self.before_rollback.is_some())
            .field("after_rollback", &self.after_rollback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ServiceName {
        ServiceName::new(s).unwrap()
    }

    #[test]
    fn test_display_name_falls_back_to_service_name() {
        let settings = InstallSettings::new(name("backup"), "/usr/bin/backup");
        assert_eq!(settings.display_name(), "backup");

        let settings = settings.with_display_name("Nightly Backup");
        assert_eq!(settings.display_name(), "Nightly Backup");
    }

    #[test]
    fn test_dependencies_keep_order() {
        let settings = InstallSettings::new(name("web"), "/srv/web")
            .with_dependency(name("Tcpip"))
            .with_dependency(name("Dnscache"));
        let deps: Vec<&str> = settings.dependencies().iter().map(|d| d.as_str()).collect();
        assert_eq!(deps, vec!["Tcpip", "Dnscache"]);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::User {
            username: "svc".to_string(),
            password: "hunter2".to_string(),
        };
        let text = format!("{:?}", creds);
        assert!(text.contains("svc"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_credentials_json_shape() {
        let creds: Credentials = serde_json::from_str(
            r#"{"account":"virtual_or_managed_account","username":"CORP\\svc$"}"#,
        )
        .unwrap();
        assert_eq!(creds.username(), Some("CORP\\svc$"));

        let default: Credentials = serde_json::from_str(r#"{"account":"local_system"}"#).unwrap();
        assert_eq!(default, Credentials::LocalSystem);
    }

    #[test]
    fn test_missing_hooks_are_noops() {
        let settings = InstallSettings::new(name("x"), "/bin/x");
        let mut hooks = TransactionHooks::new();
        assert!(hooks.run_before_action(&settings).is_ok());
        assert!(hooks.run_after_action().is_ok());
        assert!(hooks.run_before_rollback().is_ok());
        assert!(hooks.run_after_rollback().is_ok());
    }

    #[test]
    fn test_hook_error_carries_phase() {
        let mut hooks = TransactionHooks::new().after_rollback(|| anyhow::bail!("disk full"));
        match hooks.run_after_rollback() {
            Err(HostError::Hook { phase, source }) => {
                assert_eq!(phase, HookPhase::AfterRollback);
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
