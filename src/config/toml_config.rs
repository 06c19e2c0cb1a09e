use crate::utils::error::{Result, TesterError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ports, timeouts and thresholds of a test run. Every table is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterSettings {
    pub server: ServerSettings,
    pub http: HttpSettings,
    pub limits: LimitSettings,
    pub ports: FixturePorts,
    pub cgi: CgiSettings,
    pub stress: StressSettings,
    pub checks: CheckSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Document root written into generated configs.
    pub root: String,
    pub startup_wait_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            root: "./www/".to_string(),
            startup_wait_ms: 2000,
            shutdown_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub request_timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub client_max_body_size: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            client_max_body_size: 50000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixturePorts {
    pub fixture_primary: u16,
    pub fixture_secondary: u16,
    pub second_server: u16,
    pub conflict: u16,
}

impl Default for FixturePorts {
    fn default() -> Self {
        Self {
            fixture_primary: 8080,
            fixture_secondary: 8081,
            second_server: 9999,
            conflict: 7777,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CgiSettings {
    pub python_script: PathBuf,
    pub shell_script: PathBuf,
}

impl Default for CgiSettings {
    fn default() -> Self {
        Self {
            python_script: PathBuf::from("www/cgi-bin/lotr.py"),
            shell_script: PathBuf::from("www/cgi-bin/star_wars.sh"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressSettings {
    pub duration_secs: u64,
    pub min_availability: f64,
    pub max_memory_growth_mb: f64,
    pub max_established: usize,
}

impl Default for StressSettings {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            min_availability: 99.5,
            max_memory_growth_mb: 50.0,
            max_established: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    pub syscall_trace_ms: u64,
    pub valgrind: bool,
    pub valgrind_startup_ms: u64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            syscall_trace_ms: 2000,
            valgrind: true,
            valgrind_startup_ms: 3000,
        }
    }
}

impl TesterSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TesterError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TesterError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown names stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| TesterError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }

    pub fn startup_wait(&self) -> Duration {
        Duration::from_millis(self.server.startup_wait_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.server.shutdown_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }

    pub fn body_limit(&self) -> usize {
        self.limits.client_max_body_size
    }
}

impl Validate for TesterSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_non_empty_string("server.root", &self.server.root)?;
        validation::validate_base_url("server", &self.base_url())?;

        let ports = [
            ("server.port", self.server.port),
            ("ports.fixture_primary", self.ports.fixture_primary),
            ("ports.fixture_secondary", self.ports.fixture_secondary),
            ("ports.second_server", self.ports.second_server),
            ("ports.conflict", self.ports.conflict),
        ];
        for (field, port) in ports {
            validation::validate_port(field, port)?;
        }
        validation::validate_distinct_ports(&ports)?;

        validation::validate_positive_number("server.startup_wait_ms", self.server.startup_wait_ms, 1)?;
        validation::validate_positive_number("http.request_timeout_ms", self.http.request_timeout_ms, 1)?;
        validation::validate_positive_number(
            "limits.client_max_body_size",
            self.limits.client_max_body_size as u64,
            2,
        )?;
        validation::validate_positive_number("stress.duration_secs", self.stress.duration_secs, 1)?;
        validation::validate_range("stress.min_availability", self.stress.min_availability, 0.0, 100.0)?;
        validation::validate_positive_number("checks.syscall_trace_ms", self.checks.syscall_trace_ms, 1)?;

        Ok(())
    }
}
