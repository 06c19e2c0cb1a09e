use crate::core::runner::SuiteContext;
use crate::domain::model::{CheckResult, Weight};
use crate::utils::error::Result;
use async_trait::async_trait;

/// How a section needs the main server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Running; reused across consecutive sections.
    Shared,
    /// Restarted for this section and stopped afterwards.
    Fresh,
    /// Stopped; the section launches whatever it needs.
    Standalone,
}

#[async_trait]
pub trait Section: Send + Sync {
    fn name(&self) -> &str;

    fn server_mode(&self) -> ServerMode;

    fn weight(&self) -> Weight {
        Weight::Minor
    }

    async fn run(&self, ctx: &mut SuiteContext) -> Result<Vec<CheckResult>>;
}
