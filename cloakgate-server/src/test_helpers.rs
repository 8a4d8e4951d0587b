//! Test helpers for cloakgate-server unit tests.

use std::path::PathBuf;

use cloakgate_types::CloakgateConfig;

use crate::state::AppState;

/// Minimal `AppState` with tracing switched on or off.
pub fn test_app_state(trace_enabled: bool) -> AppState {
    build_state(trace_enabled, None)
}

/// Same as [`test_app_state`], but runtime toggles are written to `config_path`.
pub fn test_app_state_with_config(trace_enabled: bool, config_path: PathBuf) -> AppState {
    build_state(trace_enabled, Some(config_path))
}

fn build_state(trace_enabled: bool, config_path: Option<PathBuf>) -> AppState {
    let mut config = CloakgateConfig::new();
    config.masquerade_trace.enable = trace_enabled;
    config.masquerade_trace.max_records = 10;
    AppState::new(&config, config_path).expect("failed to create test AppState")
}
