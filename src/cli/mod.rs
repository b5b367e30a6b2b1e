//! Command-line interface
//!
//! Command handlers and simulation scenarios.

pub mod commands;
pub mod scenario;

pub use commands::{cmd_build, cmd_show, cmd_simulate, cmd_templates, CliResult};
pub use scenario::{simulate, CallRecord, Scenario, ScenarioCall, Simulation};
