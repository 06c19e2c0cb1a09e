pub mod error;
pub mod logger;
pub mod monitor;
pub mod report;
pub mod validation;
pub mod which;
