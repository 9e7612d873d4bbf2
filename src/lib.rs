pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::storage::LocalStorage;
pub use config::RouletteConfig;
pub use crate::core::{engine::EngineSettings, engine::RouletteEngine, template::Template};
pub use domain::model::RoundLabel;
pub use utils::error::{Result, RouletteError};
