//! Suite assembly, end-of-run summaries and the JSON report.

use crate::app::correction::{
    BasicChecks, BonusFeatures, BrowserCompatibility, CgiChecks, Compilation, Configuration, IoMultiplexing,
    MemoryLeaks, PortIssues, StressTests,
};
use crate::app::general::{Autoindex, Cgi, ConfigErrors, Cookies, ErrorCodes, FileUploads, MultipleServers, Permissions};
use crate::core::runner::SuiteRunner;
use crate::domain::model::{Outcome, SectionResult};
use crate::utils::error::Result;
use crate::utils::report::Reporter;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MANDATORY_FAILED: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

pub fn general_suite() -> SuiteRunner {
    SuiteRunner::new("WEBSERV GENERAL TESTS")
        .abort_on_start_failure(true)
        .with_section(ErrorCodes)
        .with_section(FileUploads)
        .with_section(Permissions)
        .with_section(Autoindex)
        .with_section(Cgi)
        .with_section(Cookies)
        .with_section(ConfigErrors)
        .with_section(MultipleServers)
}

pub fn correction_suite() -> SuiteRunner {
    SuiteRunner::new("WEBSERV ADVANCED TESTS")
        .with_section(Compilation)
        .with_section(MemoryLeaks)
        .with_section(IoMultiplexing)
        .with_section(Configuration)
        .with_section(BasicChecks)
        .with_section(CgiChecks)
        .with_section(BrowserCompatibility)
        .with_section(PortIssues)
        .with_section(StressTests)
        .with_section(BonusFeatures)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTier {
    AllPassed,
    MostPassed,
    ManyFailed,
}

/// Section tally of the general suite.
#[derive(Debug, Clone, Serialize)]
pub struct GeneralSummary {
    pub passed: usize,
    pub total: usize,
    pub tier: SummaryTier,
}

impl GeneralSummary {
    pub fn from_results(results: &[SectionResult]) -> Self {
        let counted: Vec<&SectionResult> = results.iter().filter(|r| r.outcome != Outcome::Skip).collect();
        let total = counted.len();
        let passed = counted.iter().filter(|r| !r.outcome.is_failure()).count();

        let tier = if passed == total {
            SummaryTier::AllPassed
        } else if passed * 10 >= total * 7 {
            SummaryTier::MostPassed
        } else {
            SummaryTier::ManyFailed
        };

        Self { passed, total, tier }
    }

    pub fn exit_code(&self) -> i32 {
        if self.tier == SummaryTier::AllPassed {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }

    pub fn print(&self, reporter: &Reporter, results: &[SectionResult]) {
        reporter.banner("TEST SUMMARY");
        for result in results {
            let status = match result.outcome {
                Outcome::Fail => "FAIL".red(),
                Outcome::Skip => "SKIP".yellow(),
                Outcome::Pass | Outcome::Warn => "PASS".green(),
            };
            println!("{:.<40} {}", result.name, status);
        }

        println!("\nTotal: {}/{} tests passed", self.passed, self.total);
        match self.tier {
            SummaryTier::AllPassed => println!("{}", "🎉 ALL TESTS PASSED! 🎉".green().bold()),
            SummaryTier::MostPassed => println!("{}", "Most tests passed, check failures above".yellow()),
            SummaryTier::ManyFailed => println!("{}", "Multiple tests failed, review implementation".red()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    MandatoryFailed,
    Excellent,
    Good,
    NeedsWork,
}

/// Grading of the correction suite.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub mandatory_failed: bool,
    pub passed: usize,
    pub total: usize,
    pub percentage: f64,
    pub grade: Grade,
}

impl Verdict {
    pub fn from_results(results: &[SectionResult]) -> Self {
        let mandatory_failed = results
            .iter()
            .any(|r| r.weight.is_mandatory() && r.outcome.is_failure());
        let counted: Vec<&SectionResult> = results.iter().filter(|r| r.outcome != Outcome::Skip).collect();
        let total = counted.len();
        let passed = counted.iter().filter(|r| !r.outcome.is_failure()).count();
        let percentage = if total == 0 {
            0.0
        } else {
            passed as f64 * 100.0 / total as f64
        };

        let grade = if mandatory_failed {
            Grade::MandatoryFailed
        } else if percentage >= 90.0 {
            Grade::Excellent
        } else if percentage >= 70.0 {
            Grade::Good
        } else {
            Grade::NeedsWork
        };

        Self {
            mandatory_failed,
            passed,
            total,
            percentage,
            grade,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.mandatory_failed {
            EXIT_MANDATORY_FAILED
        } else if self.passed == self.total {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }

    pub fn print(&self, reporter: &Reporter, results: &[SectionResult]) {
        reporter.banner("EVALUATION SUMMARY");
        println!("{:<30} {:<10} {}", "Test Section", "Result", "Grade Impact");
        println!("{}", "-".repeat(60));

        for result in results {
            // Pad before coloring, escape codes would break the alignment.
            let (word, impact) = (result_word(result.outcome), result.weight.impact(result.outcome));
            let padded = format!("{:<10}", word);
            let colored = match result.outcome {
                Outcome::Fail => padded.red(),
                Outcome::Skip => padded.yellow(),
                Outcome::Pass | Outcome::Warn => padded.green(),
            };
            println!("{:<30} {} {}", result.name, colored, impact);
        }
        println!("{}", "-".repeat(60));

        match self.grade {
            Grade::MandatoryFailed => {
                println!("{}", "MANDATORY PART FAILED - GRADE: 0".red().bold());
                println!("{}", "Fix critical issues before resubmission".red());
                return;
            }
            Grade::Excellent => println!("{}", "EXCELLENT - Ready for evaluation".green().bold()),
            Grade::Good => println!("{}", "GOOD - Minor issues to fix".yellow().bold()),
            Grade::NeedsWork => println!("{}", "NEEDS WORK - Multiple issues found".red().bold()),
        }
        println!(
            "Score: {}/{} tests passed ({:.1}%)",
            self.passed, self.total, self.percentage
        );
    }
}

fn result_word(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Pass | Outcome::Warn => "PASS",
        Outcome::Fail => "FAIL",
        Outcome::Skip => "SKIPPED",
    }
}

/// Machine-readable record of one run.
#[derive(Debug, Serialize)]
pub struct SuiteReport<S: Serialize> {
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub binary: PathBuf,
    pub config: PathBuf,
    pub sections: Vec<SectionResult>,
    pub summary: S,
}

impl<S: Serialize> SuiteReport<S> {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Report written to {}", path.display());
        Ok(())
    }
}
