pub mod bootstrap;
pub mod env;
pub mod orchestrator;
pub mod steps;
pub mod strategy;

pub use bootstrap::{Stage, run_bootstrap};
pub use orchestrator::{build_libraries, run, select_packages};
pub use strategy::{Registry, uses_autotools, uses_cmake};
