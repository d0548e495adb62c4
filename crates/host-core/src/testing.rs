// Test doubles: a scripted service manager, a journaling installer, a fixed
// process table, and a tracing layer that records log events.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use host_platform::elevation::ElevationLauncher;
use host_platform::error::FacilityError;
use host_platform::installer::{InstallTransaction, ServiceInstaller};
use host_platform::process::{ProcessRecord, ProcessTable};
use host_platform::service::{ServiceControlFacility, ServiceHandle, ServiceName, ServiceStatus};
use host_platform::settings::{AccountLogin, InstallSettings};

pub fn name(s: &str) -> ServiceName {
    ServiceName::new(s).unwrap()
}

// ── Process table ──────────────────────────────────────────────────────────

pub fn record(pid: u32, parent_pid: u32, executable_name: &str) -> ProcessRecord {
    ProcessRecord {
        pid,
        parent_pid,
        executable_name: executable_name.to_string(),
    }
}

pub struct StaticProcessTable {
    manager: String,
    records: Option<Vec<ProcessRecord>>,
}

impl StaticProcessTable {
    pub fn new(manager: &str, records: Vec<ProcessRecord>) -> Self {
        Self {
            manager: manager.to_string(),
            records: Some(records),
        }
    }

    pub fn failing(manager: &str) -> Self {
        Self {
            manager: manager.to_string(),
            records: None,
        }
    }
}

impl ProcessTable for StaticProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessRecord>, FacilityError> {
        self.records
            .clone()
            .ok_or_else(|| FacilityError::AccessDenied("process snapshot".to_string()))
    }

    fn service_manager_name(&self) -> &str {
        &self.manager
    }
}

// ── Service manager ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Status,
    Start,
    Stop,
    Resume,
    Control(u32),
    Release,
}

#[derive(Default)]
pub struct StubFacility {
    services: Mutex<HashMap<String, ServiceStatus>>,
    calls: Mutex<Vec<Call>>,
    stuck: bool,
    deny_listing: bool,
    race_to: Option<ServiceStatus>,
}

impl StubFacility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, name: &str, status: ServiceStatus) -> Self {
        self.services.lock().unwrap().insert(name.to_string(), status);
        self
    }

    /// Requests are accepted but the status never changes.
    pub fn stuck(mut self) -> Self {
        self.stuck = true;
        self
    }

    pub fn deny_listing(mut self) -> Self {
        self.deny_listing = true;
        self
    }

    /// Start/stop are rejected because another actor moved the service to `status`.
    pub fn racing_to(mut self, status: ServiceStatus) -> Self {
        self.race_to = Some(status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn status_of(&self, name: &str) -> ServiceStatus {
        self.services.lock().unwrap()[name]
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn request(&self, key: &str, target: ServiceStatus) -> Result<(), FacilityError> {
        if let Some(now) = self.race_to {
            self.services.lock().unwrap().insert(key.to_string(), now);
            return Err(FacilityError::InvalidState {
                service: key.to_string(),
                operation: "change".to_string(),
            });
        }
        if !self.stuck {
            self.services.lock().unwrap().insert(key.to_string(), target);
        }
        Ok(())
    }
}

impl ServiceControlFacility for StubFacility {
    fn service_names(&self) -> Result<Vec<String>, FacilityError> {
        if self.deny_listing {
            return Err(FacilityError::AccessDenied("enumerate services".to_string()));
        }
        Ok(self.services.lock().unwrap().keys().cloned().collect())
    }

    fn open(&self, name: &ServiceName) -> Result<Box<dyn ServiceHandle + '_>, FacilityError> {
        self.record(Call::Open(name.to_string()));
        let key = self
            .services
            .lock()
            .unwrap()
            .keys()
            .find(|k| name.matches(k))
            .cloned()
            .ok_or_else(|| FacilityError::NotFound(name.to_string()))?;
        Ok(Box::new(StubHandle {
            facility: self,
            key,
        }))
    }
}

struct StubHandle<'a> {
    facility: &'a StubFacility,
    key: String,
}

impl ServiceHandle for StubHandle<'_> {
    fn status(&self) -> Result<ServiceStatus, FacilityError> {
        self.facility.record(Call::Status);
        Ok(self.facility.status_of(&self.key))
    }

    fn start(&self) -> Result<(), FacilityError> {
        self.facility.record(Call::Start);
        self.facility.request(&self.key, ServiceStatus::Running)
    }

    fn stop(&self) -> Result<(), FacilityError> {
        self.facility.record(Call::Stop);
        self.facility.request(&self.key, ServiceStatus::Stopped)
    }

    fn resume(&self) -> Result<(), FacilityError> {
        self.facility.record(Call::Resume);
        self.facility.request(&self.key, ServiceStatus::Running)
    }

    fn control(&self, code: u32) -> Result<(), FacilityError> {
        self.facility.record(Call::Control(code));
        Ok(())
    }
}

impl Drop for StubHandle<'_> {
    fn drop(&mut self) {
        self.facility.record(Call::Release);
    }
}

// ── Installer ──────────────────────────────────────────────────────────────

/// Ordered record of installer steps and hook invocations.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Default)]
pub struct StubInstaller {
    pub journal: Journal,
    fail_install: bool,
    fail_begin: bool,
    logins: Mutex<Vec<AccountLogin>>,
}

impl StubInstaller {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn last_login(&self) -> Option<AccountLogin> {
        self.logins.lock().unwrap().last().cloned()
    }
}

impl ServiceInstaller for StubInstaller {
    fn begin<'a>(
        &'a self,
        _settings: &'a InstallSettings,
    ) -> Result<Box<dyn InstallTransaction + 'a>, FacilityError> {
        if self.fail_begin {
            return Err(FacilityError::AccessDenied("open service manager".to_string()));
        }
        self.journal.push("begin");
        Ok(Box::new(StubTransaction { installer: self }))
    }
}

struct StubTransaction<'a> {
    installer: &'a StubInstaller,
}

impl InstallTransaction for StubTransaction<'_> {
    fn apply_login(&mut self, login: &AccountLogin) {
        self.installer.journal.push("apply_login");
        self.installer.logins.lock().unwrap().push(login.clone());
    }

    fn install(&mut self) -> Result<(), FacilityError> {
        self.installer.journal.push("install");
        if self.installer.fail_install {
            return Err(FacilityError::native(
                "create service",
                anyhow::anyhow!("the specified service already exists"),
            ));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), FacilityError> {
        self.installer.journal.push("rollback");
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), FacilityError> {
        self.installer.journal.push("uninstall");
        Ok(())
    }
}

impl Drop for StubTransaction<'_> {
    fn drop(&mut self) {
        self.installer.journal.push("release");
    }
}

// ── Elevation ──────────────────────────────────────────────────────────────

pub struct StubLauncher {
    supported: bool,
    elevated: bool,
    fail: bool,
    launches: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl StubLauncher {
    pub fn new() -> Self {
        Self {
            supported: true,
            elevated: false,
            fail: false,
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn launches(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.launches.lock().unwrap().clone()
    }
}

impl ElevationLauncher for StubLauncher {
    fn supports_elevation(&self) -> bool {
        self.supported
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn launch_elevated(&self, program: &Path, args: &[String]) -> Result<Option<i32>, FacilityError> {
        if self.fail {
            return Err(FacilityError::native(
                "launch elevated",
                anyhow::anyhow!("the operation was canceled by the user"),
            ));
        }
        self.launches
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        Ok(Some(0))
    }
}

// ── Log capture ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Run `f` with this capture installed as the thread's subscriber.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, msg)| *l == level && msg.contains(needle))
            .count()
    }

    pub fn any(&self, level: Level) -> bool {
        self.events.lock().unwrap().iter().any(|(l, _)| *l == level)
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}
