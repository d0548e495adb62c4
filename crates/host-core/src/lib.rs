//! Service control and installation orchestration.
//!
//! Platform-independent logic behind [`host_platform::environment::HostEnvironment`]:
//! bounded start/stop, transactional install, control-code dispatch, ancestry
//! checks and elevated relaunch. Native work is delegated to the traits in
//! `host-platform`.

pub mod account;
pub mod ancestry;
pub mod config;
pub mod driver;
pub mod elevation;
pub mod environment;
pub mod prober;
pub mod test_host;
pub mod transaction;

#[cfg(test)]
mod testing;
