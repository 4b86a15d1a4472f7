pub mod bookish_config;
pub mod config;
pub mod errors;
pub mod integrations;
pub mod orchestrator;
pub mod phase;
pub mod session;
pub mod signals;
pub mod store;
pub mod telemetry;
pub mod ui;
pub mod worker;
