//! A power dispatch engine.
//!
//! Decides how much power each generation and storage resource supplies at each time step so that
//! demand is met at least cost, either by solving a linear program or with a merit-order
//! heuristic.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod demand;
pub mod dispatch;
pub mod formulation;
pub mod heuristic;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod options;
pub mod output;
pub mod resource;
pub mod settings;
pub mod solution;
pub mod solver;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory in which program settings are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("dispatch-engine");

    path
}
