//! Service registration as a systemd unit file.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use host_platform::error::FacilityError;
use host_platform::installer::{InstallTransaction, ServiceInstaller};
use host_platform::settings::{AccountKind, AccountLogin, InstallSettings, StartMode};

use crate::service::{systemctl, unit_name};

pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

pub struct SystemdInstaller {
    unit_dir: PathBuf,
}

impl Default for SystemdInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemdInstaller {
    pub fn new() -> Self {
        Self {
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
        }
    }

    pub fn with_unit_dir(unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
        }
    }
}

impl ServiceInstaller for SystemdInstaller {
    fn begin<'a>(
        &'a self,
        settings: &'a InstallSettings,
    ) -> Result<Box<dyn InstallTransaction + 'a>, FacilityError> {
        let unit = unit_name(settings.name().as_str());
        Ok(Box::new(UnitTransaction {
            settings,
            unit_path: self.unit_dir.join(&unit),
            unit,
            login: AccountLogin::default(),
            written: false,
            enabled: false,
        }))
    }
}

struct UnitTransaction<'a> {
    settings: &'a InstallSettings,
    unit: String,
    unit_path: PathBuf,
    login: AccountLogin,
    written: bool,
    enabled: bool,
}

impl InstallTransaction for UnitTransaction<'_> {
    fn apply_login(&mut self, login: &AccountLogin) {
        self.login = login.clone();
    }

    fn install(&mut self) -> Result<(), FacilityError> {
        if self.login.password.is_some() {
            debug!("systemd does not use account passwords; ignoring it");
        }

        let contents = render_unit(self.settings, &self.login);
        write_unit_file(&self.unit_path, &contents)?;
        self.written = true;
        info!("wrote {}", self.unit_path.display());

        systemctl(&self.unit, &["daemon-reload"])?;

        if self.settings.start_mode() == StartMode::Automatic {
            systemctl(&self.unit, &["enable", "--no-ask-password", &self.unit])?;
            self.enabled = true;
            info!("enabled {}", self.unit);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), FacilityError> {
        if self.enabled {
            if let Err(e) = systemctl(&self.unit, &["disable", "--no-ask-password", &self.unit]) {
                warn!("failed to disable {}: {}", self.unit, e);
            }
            self.enabled = false;
        }
        if self.written {
            remove_unit_file(&self.unit, &self.unit_path)?;
            self.written = false;
            systemctl(&self.unit, &["daemon-reload"])?;
        }
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), FacilityError> {
        if let Err(e) = systemctl(&self.unit, &["disable", "--no-ask-password", &self.unit]) {
            warn!("failed to disable {}: {}", self.unit, e);
        }
        remove_unit_file(&self.unit, &self.unit_path)?;
        systemctl(&self.unit, &["daemon-reload"])?;
        info!("removed {}", self.unit_path.display());
        Ok(())
    }
}

impl Drop for UnitTransaction<'_> {
    fn drop(&mut self) {
        debug!("closed installer for {}", self.unit);
    }
}

/// Render the unit file for `settings` running under `login`.
pub fn render_unit(settings: &InstallSettings, login: &AccountLogin) -> String {
    let description = if settings.description().is_empty() {
        settings.display_name()
    } else {
        settings.description()
    };

    let dependencies: Vec<String> = settings
        .dependencies()
        .iter()
        .map(|d| unit_name(d.as_str()))
        .collect();
    let mut after = vec!["network.target".to_string()];
    after.extend(dependencies.iter().cloned());

    let mut exec = vec![quote_exec_arg(&settings.executable_path().to_string_lossy())];
    exec.extend(settings.launch_arguments().iter().map(|a| quote_exec_arg(a)));

    let mut unit = format!(
        "[Unit]\nDescription={}\nAfter={}\n",
        description,
        after.join(" ")
    );
    if !dependencies.is_empty() {
        unit.push_str(&format!("Requires={}\n", dependencies.join(" ")));
    }

    unit.push_str(&format!(
        "\n[Service]\nType=simple\nExecStart={}\n",
        exec.join(" ")
    ));
    if let Some(line) = account_line(login) {
        unit.push_str(&line);
        unit.push('\n');
    }
    unit.push_str(
        "Restart=on-failure
RestartSec=10

# Security hardening
NoNewPrivileges=true
PrivateTmp=true
",
    );

    if settings.start_mode() != StartMode::Disabled {
        unit.push_str("\n[Install]\nWantedBy=multi-user.target\n");
    }
    unit
}

/// Built-in and managed accounts run as a transient user; plain users by name;
/// LocalSystem as root.
fn account_line(login: &AccountLogin) -> Option<String> {
    match login.kind {
        AccountKind::LocalSystem => None,
        AccountKind::LocalService | AccountKind::NetworkService => {
            Some("DynamicUser=yes".to_string())
        }
        AccountKind::User if login.have_login_info => Some("DynamicUser=yes".to_string()),
        AccountKind::User => login.username.as_ref().map(|u| format!("User={}", u)),
    }
}

/// Quote one ExecStart word. `%` is a specifier character in unit files.
fn quote_exec_arg(arg: &str) -> String {
    let escaped = arg.replace('%', "%%");
    if !escaped.is_empty()
        && !escaped.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\' || c == '\'')
    {
        return escaped;
    }
    format!("\"{}\"", escaped.replace('\\', "\\\\").replace('"', "\\\""))
}

fn io_error(operation: &str, path: &Path, e: io::Error) -> FacilityError {
    let target = format!("{} {}", operation, path.display());
    match e.kind() {
        io::ErrorKind::PermissionDenied => FacilityError::AccessDenied(target),
        _ => FacilityError::native(target, e),
    }
}

/// Write a new unit file; an existing one means the service is already installed.
fn write_unit_file(path: &Path, contents: &str) -> Result<(), FacilityError> {
    use std::io::Write;

    create_exclusive(path, |file| file.write_all(contents.as_bytes()))
}

/// Create `path` and fill it. A failed fill removes the file again so no
/// truncated unit is left behind.
fn create_exclusive(
    path: &Path,
    fill: impl FnOnce(&mut std::fs::File) -> io::Result<()>,
) -> Result<(), FacilityError> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| io_error("create", path, e))?;

    if let Err(e) = fill(&mut file).and_then(|()| file.sync_all()) {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            warn!("failed to remove partial {}: {}", path.display(), cleanup);
        }
        return Err(io_error("write", path, e));
    }
    Ok(())
}

fn remove_unit_file(unit: &str, path: &Path) -> Result<(), FacilityError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FacilityError::NotFound(unit.to_string())),
        Err(e) => Err(io_error("remove", path, e)),
    }
}
