//! Sections of the general functional suite.

use crate::app::{case, run_status_cases, stop_quietly, StatusCase};
use crate::core::fixtures::FixtureConfig;
use crate::core::runner::SuiteContext;
use crate::core::server::ExitProbe;
use crate::domain::model::{CheckResult, Probe, ProbeRequest};
use crate::domain::ports::{Section, ServerMode};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// How long a rejected config may take to make the server exit.
const CONFIG_REJECT_TIMEOUT: Duration = Duration::from_secs(2);

fn text_post(path: &str, size: usize) -> ProbeRequest {
    ProbeRequest::post(path, vec![b'X'; size]).with_header("Content-Type", "text/plain")
}

pub struct ErrorCodes;

#[async_trait]
impl Section for ErrorCodes {
    fn name(&self) -> &str {
        "Error Codes"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let authority = format!("{}:{}", ctx.settings.server.host, ctx.settings.server.port);
        let oversized = ctx.settings.body_limit() + 10000;

        let cases: Vec<StatusCase> = vec![
            // 400 Bad Request
            case(ProbeRequest::new("INVALID", "/"), &[400]),
            case(
                Probe::raw("GET / without Host header", "GET / HTTP/1.1\r\nConnection: close\r\n\r\n"),
                &[400],
            ),
            case(
                Probe::raw(
                    "GET * request target",
                    format!("GET * HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n", authority),
                ),
                &[400],
            ),
            // 403 Forbidden
            case(ProbeRequest::new("POST", "/"), &[403]),
            case(ProbeRequest::delete("/index.html"), &[403]),
            // 404 Not Found
            case(ProbeRequest::get("/nonexistent"), &[404]),
            case(ProbeRequest::get("/no_such_file.html"), &[404]),
            case(ProbeRequest::get("/uploads/"), &[404]),
            // 405 Method Not Allowed
            case(ProbeRequest::new("PUT", "/"), &[405]),
            case(ProbeRequest::new("PATCH", "/"), &[405]),
            case(ProbeRequest::new("OPTIONS", "/"), &[405]),
            // 413 Payload Too Large
            case(text_post("/methods", oversized), &[413]),
        ];

        Ok(run_status_cases(ctx, &cases).await)
    }
}

/// Bodies just under and just over the configured limit.
pub struct FileUploads;

impl FileUploads {
    pub fn sizes(limit: usize) -> [usize; 5] {
        [100, 1000, 10000, limit - 1, limit + 1]
    }
}

#[async_trait]
impl Section for FileUploads {
    fn name(&self) -> &str {
        "File Uploads"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let limit = ctx.settings.body_limit();
        let mut checks = Vec::new();
        for size in Self::sizes(limit) {
            let expected: &[u16] = if size <= limit { &[201] } else { &[413] };
            let probe = Probe::from(text_post("/methods", size));
            checks.push(ctx.expect_status(&probe, expected).await);
        }
        Ok(checks)
    }
}

pub struct Permissions;

#[async_trait]
impl Section for Permissions {
    fn name(&self) -> &str {
        "Permissions"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let post = |path: &str| ProbeRequest::post_form(path, "test");
        let cases: Vec<StatusCase> = vec![
            // Locations that don't allow POST
            case(post("/"), &[403]),
            case(post("/index.html"), &[403]),
            case(post("/dashboard"), &[403]),
            case(post("/autoindex"), &[403]),
            // Locations that don't allow DELETE
            case(ProbeRequest::delete("/"), &[403]),
            case(ProbeRequest::delete("/dashboard.html"), &[403]),
            // Locations that allow them
            case(ProbeRequest::get("/methods"), &[200]),
            case(post("/methods"), &[201]),
            case(ProbeRequest::delete("/uploads/file.txt"), &[200]),
        ];

        Ok(run_status_cases(ctx, &cases).await)
    }
}

pub struct Autoindex;

#[async_trait]
impl Section for Autoindex {
    fn name(&self) -> &str {
        "Autoindex"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let cases: Vec<StatusCase> = vec![
            case(ProbeRequest::get("/uploads"), &[404]),
            case(ProbeRequest::get("/uploads/"), &[200]),
            case(ProbeRequest::get("/uploads/01/"), &[200]),
            case(ProbeRequest::get("/cgi-bin/"), &[200]),
        ];

        Ok(run_status_cases(ctx, &cases).await)
    }
}

pub struct Cgi;

#[async_trait]
impl Section for Cgi {
    fn name(&self) -> &str {
        "CGI"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let form = "username=test&message=hello";
        let cases: Vec<StatusCase> = vec![
            case(ProbeRequest::get("/cgi-bin/lotr"), &[200]),
            case(ProbeRequest::get("/cgi-bin/lotr?action=time"), &[200]),
            case(ProbeRequest::get("/cgi-bin/star-wars"), &[200]),
            case(ProbeRequest::post_form("/cgi-bin/lotr", form), &[200]),
            case(ProbeRequest::post_form("/cgi-bin/star-wars", form), &[200]),
        ];

        Ok(run_status_cases(ctx, &cases).await)
    }
}

pub struct Cookies;

impl Cookies {
    pub async fn check(ctx: &SuiteContext, pass_name: &str, fail_name: &str) -> CheckResult {
        let check = match ctx.probe.send(&ProbeRequest::get("/register")).await {
            Ok(response) if response.headers.contains_key("set-cookie") => CheckResult::pass(pass_name),
            Ok(response) => CheckResult::fail(fail_name).with_details(format!("status {}", response.status)),
            Err(e) => CheckResult::fail(fail_name).with_details(e.to_string()),
        };
        ctx.reporter.record(check)
    }
}

#[async_trait]
impl Section for Cookies {
    fn name(&self) -> &str {
        "Cookies"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let check = Self::check(
            ctx,
            "Server sets cookies on /register",
            "Server doesn't set cookies on /register",
        )
        .await;
        Ok(vec![check])
    }
}

/// Invalid configurations must make the server exit with an error.
pub struct ConfigErrors;

#[async_trait]
impl Section for ConfigErrors {
    fn name(&self) -> &str {
        "Config Errors"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Standalone
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let ports = &ctx.settings.ports;
        let fixtures = [
            (ctx.fixtures.duplicate_ports(ports.fixture_primary), "duplicate ports"),
            (
                ctx.fixtures.duplicate_names(ports.fixture_primary, ports.fixture_secondary),
                "duplicate server names",
            ),
            (ctx.fixtures.duplicate_locations(ports.fixture_primary), "duplicate locations"),
        ];

        let mut checks = Vec::new();
        for (blocks, description) in fixtures {
            let config = FixtureConfig::write(&blocks)?;
            let check = match ctx.launcher().run_to_exit(config.path(), CONFIG_REJECT_TIMEOUT).await {
                Ok(ExitProbe::Exited(status)) if !status.success() => {
                    CheckResult::pass(format!("Server correctly rejected config with {}", description))
                }
                Ok(ExitProbe::Exited(_)) => {
                    CheckResult::fail(format!("Server accepted invalid config with {}", description))
                }
                Ok(ExitProbe::Hung) => CheckResult::fail(format!("Server hung with {}", description)),
                Err(e) => CheckResult::fail(format!("Error testing {}", description)).with_details(e.to_string()),
            };
            checks.push(ctx.reporter.record(check));
        }
        Ok(checks)
    }
}

/// A second instance on its own port, alongside the main one.
pub struct MultipleServers;

#[async_trait]
impl Section for MultipleServers {
    fn name(&self) -> &str {
        "Multiple Servers"
    }

    fn server_mode(&self) -> ServerMode {
        ServerMode::Shared
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
        let port = ctx.settings.ports.second_server;
        let config = FixtureConfig::write(&ctx.fixtures.single(port, "second_server"))?;

        let second = match ctx.launcher().start(config.path()).await {
            Ok(server) => server,
            Err(e) => {
                let check = CheckResult::fail("Second server failed to start").with_details(e.to_string());
                return Ok(vec![ctx.reporter.record(check)]);
            }
        };

        let root = Probe::from(ProbeRequest::get("/"));
        let first_check = ctx.expect_status(&root, &[200]).await;
        let second_probe = ctx.probe.for_port(port);
        let second_check = ctx.expect_status_with(&second_probe, &root, &[200]).await;

        let both = !first_check.outcome.is_failure() && !second_check.outcome.is_failure();
        let summary = if both {
            CheckResult::pass("Both servers responding correctly")
        } else {
            CheckResult::fail("One or both servers not responding")
        };
        let summary = ctx.reporter.record(summary);

        stop_quietly(second, ctx).await;
        Ok(vec![first_check, second_check, summary])
    }
}
