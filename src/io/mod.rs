//! IO module - configuration and output files for DMC runs.

mod config;
mod output;

pub use config::{load_config, Config, Params};
pub use output::{OutputFile, RunOutputs};
