use crate::domain::model::{CheckResult, Outcome};
use colored::{Color, Colorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    /// `✓ GET / returned 200 as expected`
    Inline,
    /// `  [PASS] GET request`
    Sheet,
}

/// Console output for a suite: four markers, four colors.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    style: ReportStyle,
    header_color: Color,
}

impl Reporter {
    pub fn new(style: ReportStyle) -> Self {
        let header_color = match style {
            ReportStyle::Inline => Color::Blue,
            ReportStyle::Sheet => Color::Magenta,
        };
        Self { style, header_color }
    }

    pub fn style(&self) -> ReportStyle {
        self.style
    }

    /// Globally turns ANSI colors off (`--no-color`, non-tty output).
    pub fn disable_colors() {
        colored::control::set_override(false);
    }

    pub fn banner(&self, title: &str) {
        let rule = "=".repeat(60);
        println!("\n{}", rule.color(self.header_color));
        println!("{}", format!("{:^60}", title).color(self.header_color).bold());
        println!("{}", rule.color(self.header_color));
    }

    pub fn section(&self, name: &str) {
        match self.style {
            ReportStyle::Inline => {
                let rule = "=".repeat(50);
                println!("\n{}", rule.color(self.header_color));
                println!("{}", format!("Testing: {}", name).color(self.header_color));
                println!("{}", rule.color(self.header_color));
            }
            ReportStyle::Sheet => {
                let rule = "=".repeat(60);
                println!("\n{}", rule.color(self.header_color));
                println!("{}", format!("{:^60}", name.to_uppercase()).color(self.header_color));
                println!("{}", rule.color(self.header_color));
            }
        }
    }

    /// Prints the check and hands it back for collection.
    pub fn record(&self, check: CheckResult) -> CheckResult {
        println!("{}", self.render_check(&check));
        check
    }

    pub fn render_check(&self, check: &CheckResult) -> String {
        match self.style {
            ReportStyle::Inline => {
                let (marker, color) = match check.outcome {
                    Outcome::Pass => ("✓", Color::Green),
                    Outcome::Fail => ("✗", Color::Red),
                    Outcome::Warn | Outcome::Skip => ("→", Color::Yellow),
                };
                let mut line = format!("{} {}", marker, check.name).color(color).to_string();
                if let Some(details) = &check.details {
                    line.push_str(&format!("\n  {}", details.yellow()));
                }
                line
            }
            ReportStyle::Sheet => {
                let status = outcome_tag(check.outcome);
                let mut line = format!("  {} {}", status, check.name);
                if let Some(details) = &check.details {
                    line.push_str(&format!("\n        {}", details.yellow()));
                }
                line
            }
        }
    }

    pub fn notice(&self, message: &str) {
        println!("{}", message.yellow());
    }

    pub fn success(&self, message: &str) {
        println!("{}", format!("✓ {}", message).green());
    }

    pub fn failure(&self, message: &str) {
        println!("{}", format!("✗ {}", message).red());
    }

    pub fn error(&self, message: &str) {
        println!("{}", message.red());
    }

    /// Per-section tally line, printed in inline style only.
    pub fn tally(&self, label: &str, checks: &[CheckResult]) {
        if self.style != ReportStyle::Inline {
            return;
        }
        println!("\n{}", render_tally(label, checks));
    }
}

pub fn outcome_tag(outcome: Outcome) -> String {
    match outcome {
        Outcome::Pass => "[PASS]".green().to_string(),
        Outcome::Fail => "[FAIL]".red().to_string(),
        Outcome::Warn => "[WARN]".yellow().to_string(),
        Outcome::Skip => "[SKIP]".yellow().to_string(),
    }
}

pub fn render_tally(label: &str, checks: &[CheckResult]) -> String {
    let counted: Vec<&CheckResult> = checks.iter().filter(|c| c.outcome != Outcome::Skip).collect();
    let passed = counted.iter().filter(|c| !c.outcome.is_failure()).count();
    let line = format!("Passed {}/{} {} tests", passed, counted.len(), label.to_lowercase());
    if passed == counted.len() {
        line.green().to_string()
    } else {
        line.yellow().to_string()
    }
}
