//! Sections that launch their own server instances, run against `/bin/sh` stand-ins.
#![cfg(unix)]

mod support;

use anyhow::Result;
use httpmock::prelude::*;
use std::path::Path;
use support::server_script;
use tempfile::TempDir;
use webserv_tester::app::correction::{Configuration, PortIssues};
use webserv_tester::app::general::MultipleServers;
use webserv_tester::core::Section;
use webserv_tester::domain::model::CheckResult;
use webserv_tester::utils::report::{ReportStyle, Reporter};
use webserv_tester::{Outcome, SuiteContext, TesterSettings};

fn context(binary: &Path, settings: TesterSettings) -> Result<SuiteContext> {
    let mut settings = settings;
    settings.server.startup_wait_ms = 200;
    settings.server.shutdown_timeout_ms = 2000;
    settings.http.request_timeout_ms = 2000;
    Ok(SuiteContext::new(
        binary,
        "config/example.conf",
        settings,
        Reporter::new(ReportStyle::Inline),
    )?)
}

fn named_outcomes(checks: &[CheckResult]) -> Vec<(&str, Outcome)> {
    checks.iter().map(|c| (c.name.as_str(), c.outcome)).collect()
}

async fn serving(body: &'static str) -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200).header("Content-Type", "text/html").body(body);
        })
        .await;
    server
}

/// Main instance plus the two virtual servers of the multi-port config.
async fn configuration_settings() -> (MockServer, MockServer, MockServer, TesterSettings) {
    let main = serving("<h1>Home</h1>").await;
    main.mock_async(|when, then| {
        when.method(DELETE).path("/");
        then.status(405);
    })
    .await;
    let primary = serving("<h1>Welcome</h1>").await;
    let secondary = serving("<h1>Dashboard</h1>").await;

    let mut settings = TesterSettings::default();
    settings.server.port = main.port();
    settings.ports.fixture_primary = primary.port();
    settings.ports.fixture_secondary = secondary.port();
    (main, primary, secondary, settings)
}

#[tokio::test]
async fn test_configuration_section_all_checks() -> Result<()> {
    let dir = TempDir::new()?;
    let binary = server_script(dir.path(), "webserv", "exec sleep 30");
    let (_main, _primary, _secondary, settings) = configuration_settings().await;
    let mut ctx = context(&binary, settings)?;

    let checks = Configuration.run(&mut ctx).await?;
    ctx.stop_server().await;

    assert_eq!(
        named_outcomes(&checks),
        vec![
            ("Multiple servers with different ports", Outcome::Pass),
            ("Different hostnames support", Outcome::Pass),
            ("Multiple routes configuration", Outcome::Pass),
            ("Method restrictions", Outcome::Pass),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_configuration_keeps_multi_port_check_when_main_server_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let marker = dir.path().join("started");
    let body = format!(
        "if [ -e {0} ]; then exit 1; fi\ntouch {0}\nexec sleep 30",
        marker.display()
    );
    let binary = server_script(dir.path(), "webserv", &body);
    let (_main, _primary, _secondary, settings) = configuration_settings().await;
    let mut ctx = context(&binary, settings)?;

    let checks = Configuration.run(&mut ctx).await?;

    assert_eq!(
        named_outcomes(&checks),
        vec![
            ("Multiple servers with different ports", Outcome::Pass),
            ("Server failed to start", Outcome::Fail),
        ]
    );
    assert!(checks[1]
        .details
        .as_deref()
        .unwrap_or_default()
        .contains("exited during startup"));
    Ok(())
}

#[tokio::test]
async fn test_multiple_servers_section() -> Result<()> {
    let dir = TempDir::new()?;
    let binary = server_script(dir.path(), "webserv", "exec sleep 30");
    let main = serving("<h1>Home</h1>").await;
    let second = serving("<h1>Second</h1>").await;

    let mut settings = TesterSettings::default();
    settings.server.port = main.port();
    settings.ports.second_server = second.port();
    let mut ctx = context(&binary, settings)?;

    let checks = MultipleServers.run(&mut ctx).await?;

    assert_eq!(
        named_outcomes(&checks),
        vec![
            ("GET / returned 200 as expected", Outcome::Pass),
            ("GET / returned 200 as expected", Outcome::Pass),
            ("Both servers responding correctly", Outcome::Pass),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_port_issues_with_strict_server() -> Result<()> {
    let dir = TempDir::new()?;
    let bound = dir.path().join("bound");
    // Refuses a config listing a port twice, and a port some instance already holds.
    let body = format!(
        "if [ \"$(grep -c listen \"$1\")\" -gt 1 ]; then exit 1; fi\n\
         if [ -e {0} ]; then exit 1; fi\n\
         touch {0}\n\
         exec sleep 30",
        bound.display()
    );
    let binary = server_script(dir.path(), "webserv", &body);
    let mut ctx = context(&binary, TesterSettings::default())?;

    let checks = PortIssues.run(&mut ctx).await?;

    assert_eq!(
        named_outcomes(&checks),
        vec![
            ("Reject duplicate ports in same server", Outcome::Pass),
            ("Prevent binding to same port twice", Outcome::Pass),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_port_issues_with_accepting_server() -> Result<()> {
    let dir = TempDir::new()?;
    let binary = server_script(dir.path(), "webserv", "exec sleep 30");
    let mut ctx = context(&binary, TesterSettings::default())?;

    let checks = PortIssues.run(&mut ctx).await?;

    assert_eq!(
        named_outcomes(&checks),
        vec![
            ("Reject duplicate ports in same server", Outcome::Fail),
            ("Prevent binding to same port twice", Outcome::Fail),
        ]
    );
    assert_eq!(checks[0].details.as_deref(), Some("Server kept running"));
    Ok(())
}
