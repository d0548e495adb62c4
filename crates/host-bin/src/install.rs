//! install/uninstall subcommands.
//!
//! Both go through the host's transactional installer; the hooks here only log
//! progress. Callers check privileges first (see [`ensure_elevated`]).

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use host_core::config::HostConfig;
use host_platform::environment::HostEnvironment;
use host_platform::service::Transition;
use host_platform::settings::TransactionHooks;

/// Install the configured service. On success the effective config is written
/// to `persist_to` so later start/stop/uninstall runs find the same service.
pub fn run_install(
    host: &dyn HostEnvironment,
    config: &HostConfig,
    persist_to: Option<&Path>,
    start: bool,
) -> Result<()> {
    let settings = config.install_settings()?;
    let name = settings.name().clone();

    if host.is_service_installed(&name)? {
        anyhow::bail!("the {} service is already installed", name);
    }

    let hooks = TransactionHooks::new()
        .before_action(|s| {
            info!(
                "installing {} ({}) from {}",
                s.name(),
                s.display_name(),
                s.executable_path().display()
            );
            Ok(())
        })
        .after_action(|| {
            info!("installation complete");
            Ok(())
        })
        .before_rollback(|| {
            warn!("installation failed, rolling back");
            Ok(())
        })
        .after_rollback(|| {
            warn!("rollback complete");
            Ok(())
        });

    host.install_service(&settings, hooks)
        .with_context(|| format!("failed to install {}", name))?;
    println!("{} installed", name);

    if let Some(path) = persist_to {
        config.save(path)?;
        info!("config saved to {}", path.display());
    }

    if start {
        match host
            .start_service(&name, config.start_timeout())
            .with_context(|| format!("installed, but failed to start {}", name))?
        {
            Transition::TimedOut(status) => {
                anyhow::bail!("installed, but {} is still {} after waiting", name, status)
            }
            outcome => println!("{}: {}", name, outcome.status()),
        }
    }
    Ok(())
}

pub fn run_uninstall(host: &dyn HostEnvironment, config: &HostConfig) -> Result<()> {
    let settings = config.install_settings()?;
    let name = settings.name().clone();

    if !host.is_service_installed(&name)? {
        info!("the {} service is not installed", name);
        return Ok(());
    }

    if !host.is_service_stopped(&name)? {
        let outcome = host.stop_service(&name, config.stop_timeout())?;
        if let Transition::TimedOut(status) = outcome {
            warn!("{} is still {}; removing it anyway", name, status);
        }
    }

    let hooks = TransactionHooks::new()
        .before_action(|s| {
            info!("uninstalling {}", s.name());
            Ok(())
        })
        .after_action(|| {
            info!("uninstall complete");
            Ok(())
        });

    host.uninstall_service(&settings, hooks)
        .with_context(|| format!("failed to uninstall {}", name))?;
    println!("{} uninstalled", name);
    Ok(())
}

// ── Privilege checks ───────────────────────────────────────────────────────

pub fn ensure_elevated(host: &dyn HostEnvironment) -> Result<()> {
    if host.is_administrator() {
        return Ok(());
    }
    #[cfg(target_os = "windows")]
    {
        anyhow::bail!("this command must be run as Administrator (use an elevated prompt or --sudo)")
    }
    #[cfg(not(target_os = "windows"))]
    {
        anyhow::bail!("this command must be run as root (use sudo)")
    }
}
