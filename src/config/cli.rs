use crate::config::toml_config::RouletteConfig;
use crate::core::engine::EngineSettings;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "lunch-roulette")]
#[command(about = "Pair cohort members for lunch and tell each of them who they are meeting")]
pub struct CliConfig {
    #[arg(long, help = "CSV sheet holding the cohort and every computed round")]
    pub sheet: String,

    #[arg(long, help = "Save the computed sheet here instead of overwriting --sheet")]
    pub out: Option<String>,

    #[arg(long, help = "TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, help = "Seed for eligibility draws and pairing tie-breaks")]
    pub seed: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Match participants for a round and record it in the sheet
    Compute {
        #[arg(long)]
        round: String,

        /// Show the pairing without writing the sheet
        #[arg(long)]
        preview: bool,
    },
    /// Tell every matched participant of a computed round who they meet
    Send {
        #[arg(long)]
        round: String,

        #[arg(long, help = "Template file; defaults to templates.round from the config")]
        template: Option<String>,

        /// Render and log the messages without sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Send one message to everyone in the sheet
    Announce {
        #[arg(long)]
        round: Option<String>,

        #[arg(long, help = "Template file; defaults to templates.announcement from the config")]
        template: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },
}

impl CliConfig {
    /// Loads the config file named by `--config`, or an empty one.
    pub fn file_config(&self) -> Result<RouletteConfig> {
        match &self.config {
            Some(path) => RouletteConfig::from_file(path),
            None => Ok(RouletteConfig::default()),
        }
    }

    /// Engine settings from the config file, with command-line flags on top.
    pub fn engine_settings(&self, file: &RouletteConfig) -> EngineSettings {
        let mut settings = EngineSettings::new(&self.sheet);
        file.apply_to(&mut settings);
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        settings.output_path = self.out.clone();
        settings
    }

    pub fn is_dry_run(&self) -> bool {
        match &self.command {
            Command::Compute { preview, .. } => *preview,
            Command::Send { dry_run, .. } | Command::Announce { dry_run, .. } => *dry_run,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("sheet", &self.sheet)?;
        if let Some(out) = &self.out {
            validation::validate_path("out", out)?;
        }
        if let Some(config) = &self.config {
            validation::validate_path("config", config)?;
        }
        match &self.command {
            Command::Compute { round, .. } | Command::Send { round, .. } => {
                validation::validate_non_empty_string("round", round)?;
            }
            Command::Announce { round: Some(round), .. } => {
                validation::validate_non_empty_string("round", round)?;
            }
            Command::Announce { round: None, .. } => {}
        }
        Ok(())
    }
}
