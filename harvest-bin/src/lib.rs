mod args;
mod config;
mod driver;
mod logging;
mod progress;

pub use args::Args;
pub use config::{default_config_path, Config};
pub use logging::init_logging;
pub use progress::IndicatifProgress;
