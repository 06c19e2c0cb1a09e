pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::suites::{correction_suite, general_suite, GeneralSummary, SuiteReport, Verdict};
pub use config::TesterSettings;
pub use core::runner::{SuiteContext, SuiteRunner};
pub use domain::model::{CheckResult, Outcome, SectionResult, Weight};
pub use utils::error::{Result, TesterError};
