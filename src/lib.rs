// The daemon in main.rs is thin; integration tests drive the engine through this library.
pub mod cli;
pub mod config;
pub mod control;
pub mod curriculum;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod orchestrator;
pub mod roadmap;
pub mod skills;
pub mod store;
pub mod telemetry;
pub mod testing;
