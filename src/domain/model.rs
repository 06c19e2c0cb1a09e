use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    /// Non-failing notice.
    Warn,
    /// The check could not run here (missing tool, unsupported OS).
    Skip,
}

impl Outcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }

    pub fn aggregate(checks: &[CheckResult]) -> Self {
        if checks.iter().any(|c| c.outcome == Outcome::Fail) {
            Outcome::Fail
        } else if checks.iter().all(|c| c.outcome == Outcome::Skip) {
            Outcome::Skip
        } else {
            Outcome::Pass
        }
    }

    pub fn is_failure(self) -> bool {
        self == Outcome::Fail
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            details: None,
        }
    }

    pub fn pass(name: impl Into<String>) -> Self {
        Self::new(name, Outcome::Pass)
    }

    pub fn fail(name: impl Into<String>) -> Self {
        Self::new(name, Outcome::Fail)
    }

    pub fn warn(name: impl Into<String>) -> Self {
        Self::new(name, Outcome::Warn)
    }

    pub fn skip(name: impl Into<String>) -> Self {
        Self::new(name, Outcome::Skip)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Grade impact of a failing section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weight {
    /// Failure zeroes the grade.
    Critical,
    /// Failure is a major penalty and fails the mandatory part.
    Mandatory,
    Major,
    Minor,
    Bonus,
}

impl Weight {
    pub fn is_mandatory(self) -> bool {
        matches!(self, Weight::Critical | Weight::Mandatory)
    }

    pub fn impact(self, outcome: Outcome) -> &'static str {
        match outcome {
            Outcome::Skip => "N/A",
            Outcome::Pass | Outcome::Warn => "✓",
            Outcome::Fail => match self {
                Weight::Critical => "GRADE = 0",
                Weight::Mandatory | Weight::Major => "Major penalty",
                Weight::Minor => "Minor penalty",
                Weight::Bonus => "No bonus points",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub name: String,
    pub weight: Weight,
    pub outcome: Outcome,
    pub checks: Vec<CheckResult>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SectionResult {
    pub fn new(name: impl Into<String>, weight: Weight, checks: Vec<CheckResult>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            weight,
            outcome: Outcome::aggregate(&checks),
            checks,
            duration,
        }
    }

    pub fn passed_checks(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.outcome, Outcome::Pass | Outcome::Warn))
            .count()
    }

    pub fn counted_checks(&self) -> usize {
        self.checks.iter().filter(|c| c.outcome != Outcome::Skip).count()
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// A single request sent to the server under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Http(ProbeRequest),
    /// Sent verbatim over TCP, for requests an HTTP client will not produce.
    Raw { label: String, payload: String },
}

impl Probe {
    pub fn raw(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Probe::Raw {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

impl From<ProbeRequest> for Probe {
    fn from(request: ProbeRequest) -> Self {
        Probe::Http(request)
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Http(request) => request.fmt(f),
            Probe::Raw { label, .. } => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ProbeRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new("GET", path)
    }

    pub fn head(path: &str) -> Self {
        Self::new("HEAD", path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new("DELETE", path)
    }

    pub fn post(path: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", path).with_body(body)
    }

    /// Form-encoded POST, as `curl -d` sends it.
    pub fn post_form(path: &str, body: &str) -> Self {
        Self::post(path, body).with_header("Content-Type", "application/x-www-form-urlencoded")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(body) = &self.body {
            write!(f, " ({} bytes)", body.len())?;
        }
        Ok(())
    }
}
