pub mod fixtures;
pub mod leaks;
pub mod probe;
pub mod runner;
pub mod server;
pub mod stress;
pub mod syscalls;

pub use crate::domain::model::{CheckResult, Outcome, Probe, ProbeRequest, SectionResult, Weight};
pub use crate::domain::ports::{Section, ServerMode};
pub use crate::utils::error::Result;
