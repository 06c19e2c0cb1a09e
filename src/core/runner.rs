use crate::config::TesterSettings;
use crate::core::fixtures::Fixtures;
use crate::core::probe::HttpProbe;
use crate::core::server::{ServerLauncher, ServerProcess, StopOutcome};
use crate::domain::model::{CheckResult, Probe, SectionResult};
use crate::domain::ports::{Section, ServerMode};
use crate::utils::error::{Result, TesterError};
use crate::utils::report::Reporter;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything a section needs: targets, settings, output and the main server.
pub struct SuiteContext {
    pub settings: TesterSettings,
    pub probe: HttpProbe,
    pub reporter: Reporter,
    pub fixtures: Fixtures,
    launcher: ServerLauncher,
    config: PathBuf,
    server: Option<ServerProcess>,
}

impl SuiteContext {
    pub fn new(binary: impl Into<PathBuf>, config: impl Into<PathBuf>, settings: TesterSettings, reporter: Reporter) -> Result<Self> {
        let probe = HttpProbe::new(&settings.server.host, settings.server.port, settings.request_timeout())?;
        let fixtures = Fixtures::new(&settings.server.host, &settings.server.root);
        let launcher = ServerLauncher::new(binary, settings.startup_wait());
        Ok(Self {
            settings,
            probe,
            reporter,
            fixtures,
            launcher,
            config: config.into(),
            server: None,
        })
    }

    pub fn launcher(&self) -> &ServerLauncher {
        &self.launcher
    }

    pub fn binary(&self) -> &Path {
        self.launcher.binary()
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    pub fn server_pid(&self) -> Option<u32> {
        self.server.as_ref().map(|s| s.pid())
    }

    pub fn server_running(&mut self) -> bool {
        self.server.as_mut().map(|s| s.is_running()).unwrap_or(false)
    }

    /// Starts the main server unless it is already up.
    pub async fn ensure_server(&mut self) -> Result<()> {
        if self.server_running() {
            return Ok(());
        }
        self.server = None;
        self.reporter
            .notice(&format!("Starting webserv with config: {}", self.config.display()));
        let server = self.launcher.start(&self.config).await?;
        self.reporter.success("Server started successfully");
        self.server = Some(server);
        Ok(())
    }

    pub async fn stop_server(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };
        self.reporter.notice("Stopping server...");
        match server.stop(self.settings.shutdown_timeout()).await {
            Ok(StopOutcome::Exited) => self.reporter.success("Server stopped"),
            Ok(StopOutcome::Killed) => self.reporter.notice("Server killed"),
            Err(e) => tracing::warn!("Failed to stop server: {}", e),
        }
    }

    /// Compares the status of `probe` with the accepted codes.
    pub async fn expect_status(&self, probe: &Probe, accepted: &[u16]) -> CheckResult {
        self.expect_status_with(&self.probe, probe, accepted).await
    }

    pub async fn expect_status_with(&self, target: &HttpProbe, probe: &Probe, accepted: &[u16]) -> CheckResult {
        let check = match target.status(probe).await {
            Ok(status) if accepted.contains(&status) => {
                CheckResult::pass(format!("{} returned {} as expected", probe, status))
            }
            Ok(status) => CheckResult::fail(format!(
                "{} returned {}, expected {}",
                probe,
                status,
                join_codes(accepted)
            )),
            Err(TesterError::Timeout { .. }) => CheckResult::fail(format!("{} timed out", probe)),
            Err(TesterError::HttpError(e)) if e.is_timeout() => CheckResult::fail(format!("{} timed out", probe)),
            Err(e) => CheckResult::fail(format!("{} failed: {}", probe, e)),
        };
        self.reporter.record(check)
    }
}

fn join_codes(codes: &[u16]) -> String {
    codes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" or ")
}

/// Runs sections in order, arranging the main server for each.
pub struct SuiteRunner {
    title: String,
    sections: Vec<Box<dyn Section>>,
    abort_on_start_failure: bool,
}

impl SuiteRunner {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
            abort_on_start_failure: false,
        }
    }

    /// Abort the whole run when the main server does not come up.
    pub fn abort_on_start_failure(mut self, abort: bool) -> Self {
        self.abort_on_start_failure = abort;
        self
    }

    pub fn add_section(&mut self, section: Box<dyn Section>) {
        self.sections.push(section);
    }

    pub fn with_section(mut self, section: impl Section + 'static) -> Self {
        self.add_section(Box::new(section));
        self
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name()).collect()
    }

    pub async fn execute_all(&self, ctx: &mut SuiteContext) -> Result<Vec<SectionResult>> {
        let outcome = self.execute_sections(ctx).await;
        ctx.stop_server().await;
        outcome
    }

    async fn execute_sections(&self, ctx: &mut SuiteContext) -> Result<Vec<SectionResult>> {
        let mut results = Vec::new();
        ctx.reporter.banner(&self.title);

        for section in &self.sections {
            let start_time = Instant::now();

            if let Err(e) = self.prepare_server(section.as_ref(), ctx).await {
                // Only the first start aborts; later restarts fail their own section.
                if self.abort_on_start_failure && results.is_empty() {
                    ctx.reporter.failure("Server failed to start");
                    ctx.reporter.error("Failed to start server, aborting tests");
                    return Err(e);
                }
                ctx.reporter.section(section.name());
                let check = ctx
                    .reporter
                    .record(CheckResult::fail("Server failed to start").with_details(e.to_string()));
                results.push(SectionResult::new(section.name(), section.weight(), vec![check], start_time.elapsed()));
                continue;
            }

            ctx.reporter.section(section.name());
            let checks = match section.run(ctx).await {
                Ok(checks) => checks,
                Err(e) => {
                    tracing::error!("Section {} failed: {}", section.name(), e);
                    ctx.reporter.error(&format!("Error in {}: {}", section.name(), e));
                    vec![CheckResult::fail(format!("Error in {}", section.name())).with_details(e.to_string())]
                }
            };
            ctx.reporter.tally(section.name(), &checks);

            if section.server_mode() != ServerMode::Shared {
                ctx.stop_server().await;
            }

            let result = SectionResult::new(section.name(), section.weight(), checks, start_time.elapsed());
            tracing::info!(
                "Section {} finished: {:?} ({} checks, {:?})",
                result.name,
                result.outcome,
                result.checks.len(),
                result.duration
            );
            results.push(result);
        }

        Ok(results)
    }

    async fn prepare_server(&self, section: &dyn Section, ctx: &mut SuiteContext) -> Result<()> {
        match section.server_mode() {
            ServerMode::Shared => ctx.ensure_server().await,
            ServerMode::Fresh => {
                ctx.stop_server().await;
                ctx.ensure_server().await
            }
            ServerMode::Standalone => {
                ctx.stop_server().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Outcome, Weight};
    use crate::utils::report::ReportStyle;
    use async_trait::async_trait;

    struct FixedSection {
        name: &'static str,
        mode: ServerMode,
        checks: Vec<CheckResult>,
        error: bool,
    }

    #[async_trait]
    impl Section for FixedSection {
        fn name(&self) -> &str {
            self.name
        }

        fn server_mode(&self) -> ServerMode {
            self.mode
        }

        fn weight(&self) -> Weight {
            Weight::Major
        }

        async fn run(&self, _ctx: &mut SuiteContext) -> Result<Vec<CheckResult>> {
            if self.error {
                return Err(TesterError::ProtocolError {
                    message: "boom".to_string(),
                });
            }
            Ok(self.checks.clone())
        }
    }

    fn context(binary: &str) -> SuiteContext {
        let mut settings = TesterSettings::default();
        settings.server.startup_wait_ms = 100;
        SuiteContext::new(binary, "config/example.conf", settings, Reporter::new(ReportStyle::Sheet)).unwrap()
    }

    #[tokio::test]
    async fn test_standalone_sections_and_errors() {
        let runner = SuiteRunner::new("RUNNER TEST")
            .with_section(FixedSection {
                name: "Passing",
                mode: ServerMode::Standalone,
                checks: vec![CheckResult::pass("ok")],
                error: false,
            })
            .with_section(FixedSection {
                name: "Broken",
                mode: ServerMode::Standalone,
                checks: vec![],
                error: true,
            });

        let mut ctx = context("/no/such/webserv");
        let results = runner.execute_all(&mut ctx).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, Outcome::Pass);
        assert_eq!(results[1].outcome, Outcome::Fail);
        assert_eq!(results[1].checks[0].name, "Error in Broken");
        assert_eq!(results[1].checks[0].details.as_deref(), Some("Malformed response: boom"));
    }

    #[tokio::test]
    async fn test_start_failure_fails_section_or_aborts() {
        let section = || FixedSection {
            name: "Needs server",
            mode: ServerMode::Fresh,
            checks: vec![CheckResult::pass("never reached")],
            error: false,
        };

        let lenient = SuiteRunner::new("LENIENT").with_section(section());
        let results = lenient.execute_all(&mut context("/no/such/webserv")).await.unwrap();
        assert_eq!(results[0].outcome, Outcome::Fail);
        assert_eq!(results[0].checks[0].name, "Server failed to start");

        let strict = SuiteRunner::new("STRICT")
            .abort_on_start_failure(true)
            .with_section(section());
        let err = strict.execute_all(&mut context("/no/such/webserv")).await.unwrap_err();
        assert!(matches!(err, TesterError::ServerStartError { .. }));
    }

    // Starts once: later launches find the marker and exit 1.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_restart_keeps_earlier_results() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("started");
        let script = dir.path().join("webserv.sh");
        std::fs::write(
            &script,
            format!("if [ -e {0} ]; then exit 1; fi\ntouch {0}\nexec sleep 30\n", marker.display()),
        )
        .unwrap();

        let mut settings = TesterSettings::default();
        settings.server.startup_wait_ms = 200;
        let mut ctx = SuiteContext::new("/bin/sh", &script, settings, Reporter::new(ReportStyle::Inline)).unwrap();

        let section = |name: &'static str, mode: ServerMode| FixedSection {
            name,
            mode,
            checks: vec![CheckResult::pass("ok")],
            error: false,
        };
        let runner = SuiteRunner::new("RESTART")
            .abort_on_start_failure(true)
            .with_section(section("Shared first", ServerMode::Shared))
            .with_section(section("Own processes", ServerMode::Standalone))
            .with_section(section("Shared again", ServerMode::Shared));

        let results = runner.execute_all(&mut ctx).await.unwrap();

        let outcomes: Vec<Outcome> = results.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::Pass, Outcome::Pass, Outcome::Fail]);
        assert_eq!(results[2].checks[0].name, "Server failed to start");
        assert!(results[2].checks[0]
            .details
            .as_deref()
            .unwrap_or_default()
            .contains("exited during startup"));
    }

    #[test]
    fn test_join_codes() {
        assert_eq!(join_codes(&[200]), "200");
        assert_eq!(join_codes(&[200, 204, 404]), "200 or 204 or 404");
    }
}
