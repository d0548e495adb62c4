use std::fmt;

use thiserror::Error;

/// Failures reported by a native backend (SCM, systemd, process snapshot).
#[derive(Debug, Error)]
pub enum FacilityError {
    #[error("service {0} is not installed")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The service changed state under us, e.g. a start raced another operator.
    #[error("cannot {operation} service {service} in its current state")]
    InvalidState { service: String, operation: String },

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("{operation} failed")]
    Native {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FacilityError {
    pub fn native(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        FacilityError::Native {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Which transaction hook raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeAction,
    AfterAction,
    BeforeRollback,
    AfterRollback,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::BeforeAction => "before-action",
            HookPhase::AfterAction => "after-action",
            HookPhase::BeforeRollback => "before-rollback",
            HookPhase::AfterRollback => "after-rollback",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the host environment to the application.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Facility(#[from] FacilityError),

    #[error("failed to install service {service}")]
    Install {
        service: String,
        #[source]
        source: FacilityError,
    },

    #[error("failed to uninstall service {service}")]
    Uninstall {
        service: String,
        #[source]
        source: FacilityError,
    },

    #[error("{phase} hook failed")]
    Hook {
        phase: HookPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("control code {0} is outside the user-defined range 128..=255")]
    InvalidCommand(u32),

    #[error("invalid install settings: {0}")]
    InvalidSettings(String),
}

impl HostError {
    /// True when the error means the named service is not registered.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HostError::Facility(FacilityError::NotFound(_))
        )
    }
}
