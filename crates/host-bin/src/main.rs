use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use host_core::config::HostConfig;
use host_core::test_host::TestHostEnvironment;
use host_platform::environment::HostEnvironment;
use host_platform::service::{ServiceName, ServiceStatus, Transition};

mod install;

#[derive(Parser, Debug)]
#[command(name = "servicehost")]
#[command(about = "Install, control and inspect a native OS service")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "SERVICEHOST_CONFIG_PATH", global = true)]
    config_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SERVICEHOST_LOG_LEVEL", global = true)]
    log_level: String,

    /// Service to act on (overrides the config file)
    #[arg(long, global = true)]
    service_name: Option<String>,

    /// Relaunch with administrator rights if not already elevated
    #[arg(long, global = true)]
    sudo: bool,

    /// Use the in-memory host; nothing reaches the service manager
    #[arg(long, hide = true, global = true)]
    test_host: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register the service with the service manager
    Install {
        /// Start the service once installed
        #[arg(long)]
        start: bool,
    },
    /// Stop and remove the service
    Uninstall,
    /// Start the service and wait for it to run
    Start,
    /// Stop the service and wait for it to stop
    Stop,
    /// Print the current service status
    Status,
    /// Send a user-defined control code (128-255) to the running service
    Command { code: u32 },
    /// Report how this process and the service look to the host
    Diagnose,
    /// Log every status change until interrupted
    Watch {
        /// Seconds between status probes
        #[arg(long, default_value = "5")]
        interval_secs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        "servicehost v{} starting (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    let host: Arc<dyn HostEnvironment> = if cli.test_host {
        info!("using the in-memory test host");
        Arc::new(TestHostEnvironment::new().with_args(std::env::args().skip(1).collect()))
    } else {
        Arc::from(create_host_environment())
    };

    if cli.sudo && !host.is_administrator() {
        info!("not running as administrator, relaunching elevated");
        if host.run_as_administrator() {
            return Ok(());
        }
        anyhow::bail!("unable to relaunch with administrator rights; run this from an elevated prompt");
    }

    let config_path = config_path(&cli);
    let config = load_config(&cli, &config_path)?;
    let name = config.service_name()?;

    // the test host never touches the service manager
    if cli.command.needs_administrator() && !cli.test_host {
        install::ensure_elevated(host.as_ref())?;
    }

    match cli.command {
        Commands::Install { start } => {
            let persist_to = (!cli.test_host).then_some(config_path.as_path());
            install::run_install(host.as_ref(), &config, persist_to, start)
        }
        Commands::Uninstall => install::run_uninstall(host.as_ref(), &config),
        Commands::Start => {
            let outcome = host
                .start_service(&name, config.start_timeout())
                .with_context(|| format!("failed to start {}", name))?;
            report(&name, ServiceStatus::Running, outcome)
        }
        Commands::Stop => {
            let outcome = host
                .stop_service(&name, config.stop_timeout())
                .with_context(|| format!("failed to stop {}", name))?;
            report(&name, ServiceStatus::Stopped, outcome)
        }
        Commands::Status => {
            let status = host
                .service_status(&name)
                .with_context(|| format!("failed to query {}", name))?;
            println!("{}: {}", name, status);
            Ok(())
        }
        Commands::Command { code } => {
            let sent = host
                .send_service_command(&name, code)
                .with_context(|| format!("failed to send command {} to {}", code, name))?;
            if !sent {
                anyhow::bail!("command {} was not delivered; {} is not running", code, name);
            }
            println!("command {} sent to {}", code, name);
            Ok(())
        }
        Commands::Diagnose => diagnose(host.as_ref(), &name),
        Commands::Watch { interval_secs } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start the async runtime")?;
            runtime.block_on(watch(host, name, Duration::from_secs(interval_secs.max(1))))
        }
    }
}

impl Commands {
    /// Commands that change the service and need administrator rights.
    fn needs_administrator(&self) -> bool {
        matches!(
            self,
            Commands::Install { .. } | Commands::Uninstall | Commands::Start | Commands::Stop
        )
    }
}

// ── Platform selection ─────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
fn create_host_environment() -> Box<dyn HostEnvironment> {
    use host_core::environment::ServiceHostEnvironment;
    use host_windows::{
        elevation::UacLauncher, installer::ScmInstaller, process::ToolhelpProcessTable,
        service::ScmFacility,
    };

    Box::new(ServiceHostEnvironment::new(
        Box::new(ScmFacility::new()),
        Box::new(ScmInstaller::new()),
        Box::new(ToolhelpProcessTable::new()),
        Box::new(UacLauncher::new()),
    ))
}

#[cfg(target_os = "linux")]
fn create_host_environment() -> Box<dyn HostEnvironment> {
    use host_core::environment::ServiceHostEnvironment;
    use host_linux::{
        elevation::LinuxElevation, installer::SystemdInstaller, process::ProcProcessTable,
        service::SystemdFacility,
    };

    Box::new(ServiceHostEnvironment::new(
        Box::new(SystemdFacility::new()),
        Box::new(SystemdInstaller::new()),
        Box::new(ProcProcessTable::new()),
        Box::new(LinuxElevation::new()),
    ))
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn create_host_environment() -> Box<dyn HostEnvironment> {
    warn!("no service manager backend for this platform, using the in-memory test host");
    Box::new(TestHostEnvironment::new().with_args(std::env::args().skip(1).collect()))
}

// ── Commands ───────────────────────────────────────────────────────────────

fn config_path(cli: &Cli) -> PathBuf {
    cli.config_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(HostConfig::default_path)
}

fn load_config(cli: &Cli, config_path: &std::path::Path) -> Result<HostConfig> {
    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        HostConfig::load(config_path)?
    } else {
        info!("no config found at {}, using defaults", config_path.display());
        HostConfig::default()
    };

    // CLI args override config file
    if let Some(name) = &cli.service_name {
        config.service_name = name.clone();
    }

    if config.service_name.is_empty() {
        anyhow::bail!("service name is required (--service-name or config file)");
    }
    Ok(config)
}

/// Print the outcome of a start/stop. Only a timeout fails the command.
fn report(name: &ServiceName, target: ServiceStatus, outcome: Transition) -> Result<()> {
    match outcome {
        Transition::Reached(status) | Transition::AlreadyInState(status) => {
            println!("{}: {}", name, status);
            Ok(())
        }
        Transition::Deferred(status) => {
            println!("{}: {} (request not sent; try again later)", name, status);
            Ok(())
        }
        Transition::TimedOut(status) => anyhow::bail!(
            "{} did not become {} in time; last status was {}",
            name,
            target,
            status
        ),
    }
}

fn diagnose(host: &dyn HostEnvironment, name: &ServiceName) -> Result<()> {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    println!("host:               {}", hostname);
    println!("command line:       {}", host.command_line());
    println!("administrator:      {}", yes_no(host.is_administrator()));
    println!("running as service: {}", yes_no(host.is_running_as_service()));

    let installed = host
        .is_service_installed(name)
        .with_context(|| format!("failed to look up {}", name))?;
    println!("{} installed: {}", name, yes_no(installed));
    if installed {
        match host.service_status(name) {
            Ok(status) => println!("{} status: {}", name, status),
            Err(e) => println!("{} status: unavailable ({})", name, e),
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

async fn watch(host: Arc<dyn HostEnvironment>, name: ServiceName, every: Duration) -> Result<()> {
    info!("watching {} every {:?} (ctrl-c to stop)", name, every);

    let mut ticker = tokio::time::interval(every);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last: Option<ServiceStatus> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // status probes block on the service manager
                let probe_host = host.clone();
                let probe_name = name.clone();
                let status = tokio::task::spawn_blocking(move || probe_host.service_status(&probe_name))
                    .await
                    .context("status probe panicked")?;

                match status {
                    Ok(status) if last != Some(status) => {
                        info!("the {} service is {}", name, status);
                        last = Some(status);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("unable to read the status of {}: {}", name, e);
                        last = None;
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("watch interrupted");
                return Ok(());
            }
        }
    }
}
