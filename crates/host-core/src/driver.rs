//! Bounded start/stop and control-code dispatch.
//!
//! Each operation opens one handle, reads the current status, and acts on it:
//! already in (or heading to) the target is a no-op, a conflicting transient
//! state is deferred, anything else gets the native request followed by a
//! polling wait. Timing out is reported through [`Transition::TimedOut`], not
//! as an error.

use std::time::Duration;

use tracing::{info, warn};

use host_platform::error::{FacilityError, HostError};
use host_platform::service::{
    ServiceControlFacility, ServiceHandle, ServiceName, ServiceStatus, Transition,
    USER_CONTROL_MAX, USER_CONTROL_MIN,
};

#[derive(Debug, Clone, Copy)]
enum Request {
    Start,
    Resume,
    Stop,
}

impl Request {
    fn send(self, handle: &dyn ServiceHandle) -> Result<(), FacilityError> {
        match self {
            Request::Start => handle.start(),
            Request::Resume => handle.resume(),
            Request::Stop => handle.stop(),
        }
    }

    fn target(self) -> ServiceStatus {
        match self {
            Request::Start | Request::Resume => ServiceStatus::Running,
            Request::Stop => ServiceStatus::Stopped,
        }
    }

    fn progressive(self) -> &'static str {
        match self {
            Request::Start => "starting",
            Request::Resume => "continuing",
            Request::Stop => "stopping",
        }
    }

    fn participle(self) -> &'static str {
        match self {
            Request::Start | Request::Resume => "started",
            Request::Stop => "stopped",
        }
    }
}

/// Bring `name` to Running, waiting at most `timeout`.
pub fn ensure_running(
    facility: &dyn ServiceControlFacility,
    name: &ServiceName,
    timeout: Duration,
) -> Result<Transition, HostError> {
    let handle = facility.open(name)?;
    let status = handle.status()?;

    match status {
        ServiceStatus::Running => {
            info!("the {} service is already running", name);
            Ok(Transition::AlreadyInState(status))
        }
        ServiceStatus::StartPending => {
            info!("the {} service is already starting", name);
            Ok(Transition::AlreadyInState(status))
        }
        ServiceStatus::Stopped => issue(&*handle, name, Request::Start, timeout),
        ServiceStatus::Paused => issue(&*handle, name, Request::Resume, timeout),
        ServiceStatus::StopPending | ServiceStatus::ContinuePending | ServiceStatus::PausePending => {
            Ok(defer(name, Request::Start, status))
        }
    }
}

/// Bring `name` to Stopped, waiting at most `timeout`.
pub fn ensure_stopped(
    facility: &dyn ServiceControlFacility,
    name: &ServiceName,
    timeout: Duration,
) -> Result<Transition, HostError> {
    let handle = facility.open(name)?;
    let status = handle.status()?;

    match status {
        ServiceStatus::Stopped => {
            info!("the {} service is not running", name);
            Ok(Transition::AlreadyInState(status))
        }
        ServiceStatus::StopPending => {
            info!("the {} service is already stopping", name);
            Ok(Transition::AlreadyInState(status))
        }
        ServiceStatus::Running | ServiceStatus::Paused => {
            issue(&*handle, name, Request::Stop, timeout)
        }
        ServiceStatus::StartPending | ServiceStatus::ContinuePending | ServiceStatus::PausePending => {
            Ok(defer(name, Request::Stop, status))
        }
    }
}

/// Deliver a user-defined control code. Returns false (nothing sent) unless the
/// service is running.
pub fn send_command(
    facility: &dyn ServiceControlFacility,
    name: &ServiceName,
    code: u32,
) -> Result<bool, HostError> {
    if !(USER_CONTROL_MIN..=USER_CONTROL_MAX).contains(&code) {
        return Err(HostError::InvalidCommand(code));
    }

    let handle = facility.open(name)?;
    let status = handle.status()?;
    if status != ServiceStatus::Running {
        warn!(
            "the {} service can't be commanded now as it has the status {}; try again later",
            name, status
        );
        return Ok(false);
    }

    match handle.control(code) {
        Ok(()) => {
            info!("sent command {} to the {} service", code, name);
            Ok(true)
        }
        Err(FacilityError::InvalidState { .. }) => {
            let now = handle.status()?;
            warn!(
                "the {} service can't be commanded now as it has the status {}; try again later",
                name, now
            );
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn issue(
    handle: &dyn ServiceHandle,
    name: &ServiceName,
    request: Request,
    timeout: Duration,
) -> Result<Transition, HostError> {
    info!("{} the {} service", request.progressive(), name);

    match request.send(handle) {
        Ok(()) => {}
        // Someone else moved the service between our status read and the request.
        Err(FacilityError::InvalidState { .. }) => {
            let now = handle.status()?;
            return Ok(defer(name, request, now));
        }
        Err(e) => return Err(e.into()),
    }

    let target = request.target();
    let last = handle.wait_for_status(target, timeout)?;
    if last == target {
        info!("the {} service was {} successfully", name, request.participle());
        Ok(Transition::Reached(last))
    } else {
        warn!(
            "the {} service did not become {} within {:?}; current status is {}",
            name, target, timeout, last
        );
        Ok(Transition::TimedOut(last))
    }
}

fn defer(name: &ServiceName, request: Request, status: ServiceStatus) -> Transition {
    warn!(
        "the {} service can't be {} now as it has the status {}; try again later",
        name,
        request.participle(),
        status
    );
    Transition::Deferred(status)
}
