//! Service layer for the duo-match client
//!
//! This module contains the simulation wiring used by the CLI and the HTTP
//! control surface that drives a session from outside the process.

pub mod app;
pub mod http;

pub use app::{ClientSlot, ServiceError, SimulationApp, SimulationReport};
pub use http::{ControlServer, ControlServerConfig, ControlServerState};
