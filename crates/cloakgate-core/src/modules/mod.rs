pub mod config;

pub use config::{load_config, load_or_default, save_config, update_config, CONFIG_FILE};
