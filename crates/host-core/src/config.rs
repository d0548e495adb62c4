use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use host_platform::service::ServiceName;
use host_platform::settings::{Credentials, InstallSettings, StartMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Name the service is registered under
    pub service_name: String,

    /// Friendly name shown by the service manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Executable to register (default: the running executable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,

    /// Arguments the service manager passes on every start
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launch_arguments: Vec<String>,

    #[serde(default)]
    pub start_mode: StartMode,

    /// Services that must be running first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub credentials: Credentials,

    /// How long `start` waits for the service to run
    #[serde(default = "default_timeout")]
    pub start_timeout_secs: u64,

    /// How long `stop` waits for the service to stop
    #[serde(default = "default_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            display_name: None,
            description: String::new(),
            executable_path: None,
            launch_arguments: Vec::new(),
            start_mode: StartMode::default(),
            dependencies: Vec::new(),
            credentials: Credentials::default(),
            start_timeout_secs: default_timeout(),
            stop_timeout_secs: default_timeout(),
        }
    }
}

impl HostConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "servicehost", "servicehost") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("servicehost-config.json")
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn service_name(&self) -> Result<ServiceName> {
        ServiceName::new(self.service_name.as_str())
            .with_context(|| "invalid service_name in config")
    }

    /// Validate the config into installer settings.
    pub fn install_settings(&self) -> Result<InstallSettings> {
        let executable = match &self.executable_path {
            Some(path) => path.clone(),
            None => std::env::current_exe().context("failed to resolve current executable")?,
        };

        let mut settings = InstallSettings::new(self.service_name()?, executable)
            .with_description(self.description.as_str())
            .with_launch_arguments(self.launch_arguments.clone())
            .with_start_mode(self.start_mode)
            .with_credentials(self.credentials.clone());

        if let Some(display_name) = &self.display_name {
            settings = settings.with_display_name(display_name.as_str());
        }
        for dependency in &self.dependencies {
            let dependency = ServiceName::new(dependency.as_str())
                .with_context(|| format!("invalid dependency {:?}", dependency))?;
            settings = settings.with_dependency(dependency);
        }
        Ok(settings)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
