//! Sections of the correction sheet suite.

use crate::app::general::Cookies;
use crate::app::{body_contains, has_body, judged, observed, status_in, stop_quietly};
use crate::core::fixtures::FixtureConfig;
use crate::core::leaks::{self, LeakVerdict};
use crate::core::runner::SuiteContext;
use crate::core::server::ExitProbe;
use crate::core::stress;
use crate::core::syscalls;
use crate::domain::model::{CheckResult, Outcome, ProbeRequest, Weight};
use crate::domain::ports::{Section, ServerMode};
use crate::utils::error::{Result, TesterError};
use crate::utils::monitor::ProcessMonitor;
use crate::utils::which::find_executable;
use async_trait::async_trait;
use reqwest::Version;
use std::path::Path;
use std::time::Duration;

const CONFIG_REJECT_TIMEOUT: Duration = Duration::from_secs(2);

fn main_pid(ctx: &SuiteContext) -> Result<u32> {
    ctx.server_pid().ok_or_else(|| TesterError::ProcessError {
        command: ctx.binary().display().to_string(),
        message: "main server is not running".to_string(),
    })
}

pub struct Compilation;

#[async_trait]
impl Section for Compilation {
    fn name(&self) -> &str {
        "Compilation"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Standalone
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let mut checks = Vec::new();
        let binary = ctx.binary().to_path_buf();

        if binary.exists() {
            checks.push(ctx.reporter.record(CheckResult::pass("Binary exists")));
        } else {
            let check = CheckResult::fail("Binary exists")
                .with_details(format!("Binary not found at {}", binary.display()));
            checks.push(ctx.reporter.record(check));
            return Ok(checks);
        }

        if Path::new("Makefile").exists() {
            match find_executable("make") {
                Some(make) => {
                    let up_to_date = leaks::check_relink(&make, Path::new(".")).await?;
                    let check = CheckResult::new("No re-link issues", Outcome::from_bool(up_to_date));
                    checks.push(ctx.reporter.record(check));
                }
                None => {
                    let check = CheckResult::skip("No re-link issues").with_details("make not available");
                    checks.push(ctx.reporter.record(check));
                }
            }
        }

        Ok(checks)
    }
}

pub struct MemoryLeaks;

#[async_trait]
impl Section for MemoryLeaks {
    fn name(&self) -> &str {
        "Memory Leaks"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Standalone
    }

    fn weight(&self) -> Weight {
        Weight::Critical
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        if !ctx.settings.checks.valgrind {
            let check = CheckResult::skip("Valgrind check").with_details("Disabled in settings");
            return Ok(vec![ctx.reporter.record(check)]);
        }
        let Some(valgrind) = find_executable("valgrind") else {
            let check = CheckResult::skip("Valgrind check")
                .with_details("Valgrind not available, skipping memory test");
            return Ok(vec![ctx.reporter.record(check)]);
        };

        let port = ctx.settings.ports.fixture_primary;
        let config = FixtureConfig::write(&ctx.fixtures.single(port, "test"))?;
        let target = ctx.probe.for_port(port);
        let traffic = async {
            let _ = target.send(&ProbeRequest::get("/")).await;
            let _ = target.send(&ProbeRequest::post_form("/", "test")).await;
        };

        let startup = Duration::from_millis(ctx.settings.checks.valgrind_startup_ms);
        let output = leaks::run_under_valgrind(&valgrind, ctx.binary(), config.path(), startup, traffic).await?;

        let check = match leaks::parse_leak_summary(&output) {
            LeakVerdict::Clean => CheckResult::pass("No memory leaks detected"),
            LeakVerdict::Leaking(lines) => CheckResult::fail("Memory leaks detected").with_details(lines.join("; ")),
            LeakVerdict::Unknown => {
                CheckResult::fail("Memory leak test").with_details("No leak summary in valgrind output")
            }
        };
        Ok(vec![ctx.reporter.record(check)])
    }
}

pub struct IoMultiplexing;

#[async_trait]
impl Section for IoMultiplexing {
    fn name(&self) -> &str {
        "I/O Multiplexing"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Fresh
    }

    fn weight(&self) -> Weight {
        Weight::Critical
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        if !cfg!(target_os = "linux") {
            let check = CheckResult::skip("I/O Multiplexing check").with_details("Cannot verify on this OS");
            return Ok(vec![ctx.reporter.record(check)]);
        }
        let Some(strace) = find_executable("strace") else {
            let check = CheckResult::skip("I/O Multiplexing check").with_details("strace not available");
            return Ok(vec![ctx.reporter.record(check)]);
        };

        let pid = main_pid(ctx)?;
        let window = Duration::from_millis(ctx.settings.checks.syscall_trace_ms);
        let probe = ctx.probe.clone();
        let activity = async move {
            let _ = probe.send(&ProbeRequest::get("/")).await;
        };
        let trace = syscalls::trace_syscalls(&strace, pid, window, activity).await?;

        let check = if syscalls::ptrace_denied(&trace) {
            CheckResult::skip("I/O Multiplexing check")
                .with_details("ptrace attach not permitted (see /proc/sys/kernel/yama/ptrace_scope)")
        } else {
            match syscalls::detect_multiplexer(&trace) {
                Some(kind) => CheckResult::pass("I/O Multiplexing detected").with_details(format!("Using: {}", kind)),
                None => CheckResult::fail("No I/O Multiplexing detected"),
            }
        };
        Ok(vec![ctx.reporter.record(check)])
    }
}

pub struct Configuration;

impl Configuration {
    const ROUTES: [&'static str; 4] = ["/", "/dashboard", "/methods", "/cgi-bin/"];

    async fn multiple_ports(ctx: &SuiteContext) -> Result<CheckResult> {
        let name = "Multiple servers with different ports";
        let ports = &ctx.settings.ports;
        let config = FixtureConfig::write(&ctx.fixtures.multi_port(ports.fixture_primary, ports.fixture_secondary))?;

        let server = match ctx.launcher().start(config.path()).await {
            Ok(server) => server,
            Err(e) => return Ok(CheckResult::fail(name).with_details(e.to_string())),
        };

        let first = ctx.probe.for_port(ports.fixture_primary).send(&ProbeRequest::get("/")).await;
        let second = ctx.probe.for_port(ports.fixture_secondary).send(&ProbeRequest::get("/")).await;
        stop_quietly(server, ctx).await;

        let passed = body_contains(&first, "Welcome") && body_contains(&second, "Dashboard");
        Ok(if passed {
            CheckResult::pass(name)
        } else {
            CheckResult::fail(name).with_details(format!(
                "{}: {}; {}: {}",
                ports.fixture_primary,
                observed(&first),
                ports.fixture_secondary,
                observed(&second)
            ))
        })
    }
}

#[async_trait]
impl Section for Configuration {
    fn name(&self) -> &str {
        "Configuration"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Standalone
    }

    fn weight(&self) -> Weight {
        Weight::Mandatory
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let mut checks = Vec::new();

        let multi = Self::multiple_ports(ctx).await?;
        checks.push(ctx.reporter.record(multi));
        tokio::time::sleep(Duration::from_secs(1)).await;

        if let Err(e) = ctx.ensure_server().await {
            let check = CheckResult::fail("Server failed to start").with_details(e.to_string());
            checks.push(ctx.reporter.record(check));
            return Ok(checks);
        }

        let aliased = ctx.probe.with_host_alias("example.com")?;
        let response = aliased.send(&ProbeRequest::get("/")).await;
        checks.push(ctx.reporter.record(judged("Different hostnames support", has_body(&response), &response)));

        let mut failed_routes = Vec::new();
        for route in Self::ROUTES {
            let response = ctx.probe.send(&ProbeRequest::get(route)).await;
            if !status_in(&response, &[200, 404]) {
                failed_routes.push(format!("{} ({})", route, observed(&response)));
            }
        }
        let routes = if failed_routes.is_empty() {
            CheckResult::pass("Multiple routes configuration")
        } else {
            CheckResult::fail("Multiple routes configuration").with_details(failed_routes.join(", "))
        };
        checks.push(ctx.reporter.record(routes));

        let response = ctx.probe.send(&ProbeRequest::delete("/")).await;
        checks.push(ctx.reporter.record(judged("Method restrictions", status_in(&response, &[403, 405]), &response)));

        Ok(checks)
    }
}

pub struct BasicChecks;

#[async_trait]
impl Section for BasicChecks {
    fn name(&self) -> &str {
        "Basic Checks"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Fresh
    }

    fn weight(&self) -> Weight {
        Weight::Mandatory
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let mut checks = Vec::new();
        let probe = &ctx.probe;

        let response = probe.send(&ProbeRequest::get("/")).await;
        checks.push(ctx.reporter.record(judged("GET request", status_in(&response, &[200]), &response)));

        let response = probe.send(&ProbeRequest::post_form("/methods", "test")).await;
        checks.push(ctx.reporter.record(judged("POST request", status_in(&response, &[200, 201]), &response)));

        // Upload something first so there may be a file to delete.
        let _ = probe.send(&ProbeRequest::post_form("/methods", "test_delete")).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let response = probe.send(&ProbeRequest::delete("/uploads/file.txt")).await;
        checks.push(ctx.reporter.record(judged(
            "DELETE request",
            status_in(&response, &[200, 204, 404]),
            &response,
        )));

        let response = probe.send(&ProbeRequest::new("UNKNOWN", "/")).await;
        checks.push(ctx.reporter.record(judged(
            "UNKNOWN request handling",
            status_in(&response, &[400, 405, 501]),
            &response,
        )));

        let upload = ProbeRequest::post("/methods", "This is a test file for upload")
            .with_header("Content-Type", "application/octet-stream");
        let response = probe.send(&upload).await;
        checks.push(ctx.reporter.record(judged("File upload", status_in(&response, &[200, 201]), &response)));

        Ok(checks)
    }
}

pub struct CgiChecks;

#[async_trait]
impl Section for CgiChecks {
    fn name(&self) -> &str {
        "CGI"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Fresh
    }

    fn weight(&self) -> Weight {
        Weight::Major
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let mut checks = Vec::new();
        let probe = &ctx.probe;

        let response = probe.send(&ProbeRequest::get("/cgi-bin/lotr")).await;
        let passed = has_body(&response) && body_contains(&response, "Archives");
        checks.push(ctx.reporter.record(judged("CGI GET request (Python)", passed, &response)));

        let form = "username=test&message=hello";
        let response = probe.send(&ProbeRequest::post_form("/cgi-bin/lotr", form)).await;
        checks.push(ctx.reporter.record(judged("CGI POST request (Python)", has_body(&response), &response)));

        let response = probe.send(&ProbeRequest::get("/cgi-bin/star-wars")).await;
        let passed = has_body(&response) && body_contains(&response, "Terminal");
        checks.push(ctx.reporter.record(judged("CGI GET request (Shell)", passed, &response)));

        let response = probe.send(&ProbeRequest::get("/cgi-bin/lotr?action=time")).await;
        checks.push(ctx.reporter.record(judged("CGI with query string", has_body(&response), &response)));

        // A runaway script can only be installed by the server's own config.
        let runaway = CheckResult::warn("CGI error handling").with_details("Manual verification needed for timeout behavior");
        checks.push(ctx.reporter.record(runaway));

        Ok(checks)
    }
}

pub struct BrowserCompatibility;

impl BrowserCompatibility {
    const STATIC_FILES: [&'static str; 3] = ["/style/style.css", "/favicon.ico", "/index.html"];
}

#[async_trait]
impl Section for BrowserCompatibility {
    fn name(&self) -> &str {
        "Browser Compatibility"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Fresh
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let mut checks = Vec::new();
        let probe = &ctx.probe;

        let response = probe.send(&ProbeRequest::head("/")).await;
        let passed = matches!(&response, Ok(r)
            if r.header("content-type").is_some()
                && r.header("content-length").is_some()
                && r.version == Version::HTTP_11);
        checks.push(ctx.reporter.record(judged("HTTP headers present", passed, &response)));

        let response = probe.send(&ProbeRequest::get("/nonexistent")).await;
        checks.push(ctx.reporter.record(judged("404 on wrong URL", status_in(&response, &[404]), &response)));

        // Either autoindex behaviour is acceptable.
        let response = probe.send(&ProbeRequest::get("/uploads/")).await;
        let listing = if body_contains(&response, "Directory") {
            "Autoindex on"
        } else {
            "Autoindex off or 404"
        };
        let outcome = if has_body(&response) { Outcome::Pass } else { Outcome::Warn };
        checks.push(ctx.reporter.record(CheckResult::new("Directory listing", outcome).with_details(listing)));

        for file in Self::STATIC_FILES {
            let response = probe.send(&ProbeRequest::get(file)).await;
            let name = format!("Static file: {}", file);
            checks.push(ctx.reporter.record(judged(&name, status_in(&response, &[200, 404]), &response)));
        }

        Ok(checks)
    }
}

pub struct PortIssues;

impl PortIssues {
    async fn duplicate_listen(ctx: &SuiteContext) -> Result<CheckResult> {
        let name = "Reject duplicate ports in same server";
        let config = FixtureConfig::write(&ctx.fixtures.duplicate_listen(ctx.settings.ports.fixture_primary))?;

        Ok(match ctx.launcher().run_to_exit(config.path(), CONFIG_REJECT_TIMEOUT).await? {
            ExitProbe::Exited(status) if !status.success() => CheckResult::pass(name),
            ExitProbe::Exited(_) => CheckResult::fail(name).with_details("Server exited successfully"),
            ExitProbe::Hung => CheckResult::fail(name).with_details("Server kept running"),
        })
    }

    async fn port_conflict(ctx: &SuiteContext) -> Result<CheckResult> {
        let name = "Prevent binding to same port twice";
        let port = ctx.settings.ports.conflict;
        let first_config = FixtureConfig::write(&ctx.fixtures.single(port, "test1"))?;
        let second_config = FixtureConfig::write(&ctx.fixtures.single(port, "test2"))?;

        let first = match ctx.launcher().start(first_config.path()).await {
            Ok(server) => server,
            Err(e) => {
                return Ok(CheckResult::fail(name).with_details(format!("First server failed to start: {}", e)));
            }
        };

        let mut second = ctx.launcher().spawn(second_config.path())?;
        tokio::time::sleep(ctx.settings.startup_wait()).await;
        let second_exited = !second.is_running();

        stop_quietly(first, ctx).await;
        stop_quietly(second, ctx).await;

        Ok(CheckResult::new(name, Outcome::from_bool(second_exited)))
    }
}

#[async_trait]
impl Section for PortIssues {
    fn name(&self) -> &str {
        "Port Issues"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Standalone
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let duplicate = Self::duplicate_listen(ctx).await?;
        let duplicate = ctx.reporter.record(duplicate);
        let conflict = Self::port_conflict(ctx).await?;
        let conflict = ctx.reporter.record(conflict);
        Ok(vec![duplicate, conflict])
    }
}

pub struct StressTests;

#[async_trait]
impl Section for StressTests {
    fn name(&self) -> &str {
        "Stress Tests"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Fresh
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let Some(siege) = find_executable("siege") else {
            ctx.reporter.notice(
                "  Siege not installed. Install with: brew install siege (macOS) or apt-get install siege (Linux)",
            );
            ctx.reporter.notice("  Skipping stress tests");
            let check = CheckResult::skip("Stress tests").with_details("Siege not installed");
            return Ok(vec![ctx.reporter.record(check)]);
        };

        let stress_settings = ctx.settings.stress.clone();
        let mut checks = Vec::new();
        let mut monitor = ProcessMonitor::new(main_pid(ctx)?);
        monitor.log_stats("Before siege");

        ctx.reporter.notice(&format!(
            "  Running siege test ({} seconds)...",
            stress_settings.duration_secs
        ));
        let run = stress::run_siege(
            &siege,
            &format!("{}/", ctx.probe.base_url()),
            Duration::from_secs(stress_settings.duration_secs),
        )
        .await?;

        let availability = match run.availability {
            Some(value) => CheckResult::new(
                "Availability test",
                Outcome::from_bool(value >= stress_settings.min_availability),
            )
            .with_details(format!(
                "{:.2}% (need >= {}%)",
                value, stress_settings.min_availability
            )),
            None => CheckResult::fail("Availability test").with_details("Could not measure availability"),
        };
        checks.push(ctx.reporter.record(availability));

        tokio::time::sleep(Duration::from_secs(2)).await;
        monitor.log_stats("After siege");
        let memory = match monitor.growth_mb() {
            Some(growth) => CheckResult::new(
                "Memory stability",
                Outcome::from_bool(growth < stress_settings.max_memory_growth_mb),
            )
            .with_details(format!("Memory increased by {:.2}MB", growth)),
            None => CheckResult::skip("Memory stability").with_details("Server memory could not be sampled"),
        };
        checks.push(ctx.reporter.record(memory));

        let connections = match stress::established_connections(ctx.probe.port()) {
            Some(count) => CheckResult::new(
                "No hanging connections",
                Outcome::from_bool(count < stress_settings.max_established),
            )
            .with_details(format!("{} established connections", count)),
            None => CheckResult::skip("No hanging connections").with_details("/proc/net/tcp not available"),
        };
        checks.push(ctx.reporter.record(connections));

        Ok(checks)
    }
}

pub struct BonusFeatures;

#[async_trait]
impl Section for BonusFeatures {
    fn name(&self) -> &str {
        "Bonus Features"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Fresh
    }

    fn weight(&self) -> Weight {
        Weight::Bonus
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let cookies = Cookies::check(ctx, "Cookie system", "Cookie system").await;

        let has_python = ctx.settings.cgi.python_script.exists();
        let has_shell = ctx.settings.cgi.shell_script.exists();
        let mark = |present: bool| if present { "✓" } else { "✗" };
        let cgi = CheckResult::new("Multiple CGI systems", Outcome::from_bool(has_python && has_shell))
            .with_details(format!("Python: {}, Shell: {}", mark(has_python), mark(has_shell)));

        Ok(vec![cookies, ctx.reporter.record(cgi)])
    }
}
