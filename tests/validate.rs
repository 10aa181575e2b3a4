//! Integration tests for the `validate` command.
use dispatch_engine::cli::handle_validate_command;
use dispatch_engine::input::load_model;
use dispatch_engine::log::is_logger_initialised;
use dispatch_engine::settings::Settings;
use dispatch_engine::units::{Time, UnitType};
use float_cmp::assert_approx_eq;
use std::path::PathBuf;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("DISPATCH_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_model_dir(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}

#[test]
fn test_load_demo_model() {
    let model = load_model(get_model_dir()).unwrap();
    assert_eq!(model.resources.len(), 4);
    assert_approx_eq!(f64, model.resources[0].capacity.value(), 100.0);
    assert_eq!(model.demand.len(), 24);
    assert_eq!(model.demand.time_step(), Time(1.0));
}

#[test]
fn test_load_missing_model() {
    assert!(load_model("demos/missing").is_err());
}
