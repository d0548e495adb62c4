// Platform seams for the service host
//
// Data model, error taxonomy and the traits that every native backend
// (SCM on Windows, systemd on Linux, in-memory for tests) implements.

pub mod elevation;
pub mod environment;
pub mod error;
pub mod installer;
pub mod process;
pub mod service;
pub mod settings;
