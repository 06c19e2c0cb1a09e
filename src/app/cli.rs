//! Shared entry point of the tester binaries.

use crate::app::suites::{self, GeneralSummary, SuiteReport, Verdict, EXIT_FAILURE, EXIT_INTERRUPTED};
use crate::config::CliConfig;
use crate::core::runner::{SuiteContext, SuiteRunner};
use crate::domain::model::SectionResult;
use crate::utils::error::TesterError;
use crate::utils::report::{ReportStyle, Reporter};
use crate::utils::{logger, validation::Validate};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    General,
    Correction,
}

impl SuiteKind {
    pub fn name(self) -> &'static str {
        match self {
            SuiteKind::General => "general",
            SuiteKind::Correction => "correction",
        }
    }

    fn runner(self) -> SuiteRunner {
        match self {
            SuiteKind::General => suites::general_suite(),
            SuiteKind::Correction => suites::correction_suite(),
        }
    }

    fn style(self) -> ReportStyle {
        match self {
            SuiteKind::General => ReportStyle::Inline,
            SuiteKind::Correction => ReportStyle::Sheet,
        }
    }
}

fn report_error(context: &str, e: &TesterError) {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
}

/// Runs one suite end to end and returns the process exit code.
pub async fn run(kind: SuiteKind, config: CliConfig, program: &str) -> i32 {
    if config.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }
    if config.no_color {
        Reporter::disable_colors();
    }

    tracing::info!("Starting {} suite", kind.name());
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        report_error("Configuration validation failed", &e);
        eprintln!("Usage: {} [path_to_webserv] [path_to_config]", program);
        return EXIT_FAILURE;
    }

    let settings = match config.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            report_error("Failed to load settings", &e);
            return EXIT_FAILURE;
        }
    };

    let reporter = Reporter::new(kind.style());
    let mut ctx = match SuiteContext::new(&config.binary_path, &config.config_path, settings, reporter) {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error("Failed to prepare test context", &e);
            return EXIT_FAILURE;
        }
    };

    let started_at = Utc::now();
    let runner = kind.runner();

    let outcome = tokio::select! {
        outcome = runner.execute_all(&mut ctx) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let results = match outcome {
        None => {
            reporter.notice("\nTests interrupted by user");
            ctx.stop_server().await;
            return EXIT_INTERRUPTED;
        }
        Some(Err(e)) => {
            report_error("Test run aborted", &e);
            return EXIT_FAILURE;
        }
        Some(Ok(results)) => results,
    };

    let exit_code = match kind {
        SuiteKind::General => {
            let summary = GeneralSummary::from_results(&results);
            summary.print(&reporter, &results);
            let code = summary.exit_code();
            write_report(kind, &config, started_at, results, summary);
            code
        }
        SuiteKind::Correction => {
            let verdict = Verdict::from_results(&results);
            verdict.print(&reporter, &results);
            let code = verdict.exit_code();
            write_report(kind, &config, started_at, results, verdict);
            code
        }
    };

    tracing::info!("{} suite finished with exit code {}", kind.name(), exit_code);
    exit_code
}

fn write_report<S: Serialize>(
    kind: SuiteKind,
    config: &CliConfig,
    started_at: chrono::DateTime<Utc>,
    sections: Vec<SectionResult>,
    summary: S,
) {
    let Some(path) = &config.report else {
        return;
    };
    let report = SuiteReport {
        suite: kind.name().to_string(),
        started_at,
        binary: config.binary_path.clone(),
        config: config.config_path.clone(),
        sections,
        summary,
    };
    match report.write(path) {
        Ok(()) => println!("📁 Report saved to: {}", path.display()),
        Err(e) => report_error("Failed to write report", &e),
    }
}
