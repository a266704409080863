pub mod bench;
pub mod cli;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod samples;
pub mod stats;
pub mod trial;
pub mod workflow;
