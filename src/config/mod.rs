pub mod toml_config;

pub use toml_config::TesterSettings;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Args;
#[cfg(feature = "cli")]
use std::path::PathBuf;

/// Arguments shared by both tester binaries.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct CliConfig {
    /// Path to the webserv binary under test
    #[arg(default_value = "./webserv")]
    pub binary_path: PathBuf,

    /// Configuration file passed to the binary
    #[arg(default_value = "config/example.conf")]
    pub config_path: PathBuf,

    /// TOML file with ports, timeouts and thresholds
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Port the main configuration listens on (overrides the settings file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Settings file (or defaults) with command line overrides applied.
    pub fn load_settings(&self) -> Result<TesterSettings> {
        let mut settings = match &self.settings {
            Some(path) => TesterSettings::from_file(path)?,
            None => TesterSettings::default(),
        };

        if let Some(port) = self.port {
            settings.server.port = port;
            tracing::info!("Main server port overridden to: {}", port);
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_existing_file("Binary", &self.binary_path)?;
        validation::validate_existing_file("Config file", &self.config_path)?;
        if let Some(settings) = &self.settings {
            validation::validate_existing_file("Settings file", settings)?;
        }
        Ok(())
    }
}
