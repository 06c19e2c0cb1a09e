use crate::core::server::send_terminate;
use crate::utils::error::{Result, TesterError};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeakVerdict {
    Clean,
    /// The `lost` lines of the summary.
    Leaking(Vec<String>),
    /// No leak summary in the output.
    Unknown,
}

pub fn parse_leak_summary(output: &str) -> LeakVerdict {
    if output.contains("All heap blocks were freed") {
        return LeakVerdict::Clean;
    }
    if !output.contains("definitely lost:") {
        return LeakVerdict::Unknown;
    }
    if output.contains("definitely lost: 0 bytes") && output.contains("indirectly lost: 0 bytes") {
        return LeakVerdict::Clean;
    }

    let lines = output
        .lines()
        .filter(|line| line.to_lowercase().contains("lost"))
        .map(|line| line.trim().to_string())
        .collect();
    LeakVerdict::Leaking(lines)
}

/// Runs the server under valgrind, drives `traffic`, then SIGTERMs and returns valgrind's report.
pub async fn run_under_valgrind<F>(
    valgrind: &Path,
    binary: &Path,
    config: &Path,
    startup: Duration,
    traffic: F,
) -> Result<String>
where
    F: Future,
{
    let child = Command::new(valgrind)
        .args(["--leak-check=full", "--show-leak-kinds=all"])
        .arg(binary)
        .arg(config)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TesterError::ProcessError {
            command: valgrind.display().to_string(),
            message: e.to_string(),
        })?;
    let pid = child.id();

    tokio::time::sleep(startup).await;
    traffic.await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    // valgrind runs the guest in-process, so the pid is the server's.
    if let Some(pid) = pid {
        send_terminate(pid);
    }

    let output = tokio::time::timeout(Duration::from_secs(15), child.wait_with_output())
        .await
        .map_err(|_| TesterError::Timeout {
            operation: "valgrind shutdown".to_string(),
            after_ms: 15000,
        })??;

    Ok(String::from_utf8_lossy(&output.stderr).into_owned())
}

/// A second `make` right after the first must have nothing left to do.
pub fn is_up_to_date(make_output: &str) -> bool {
    make_output.contains("Nothing to be done") || make_output.contains("is up to date")
}

/// Runs `make` twice in `dir` and reports whether the second run had nothing to do.
pub async fn check_relink(make: &Path, dir: &Path) -> Result<bool> {
    run_make(make, dir).await?;
    let second = run_make(make, dir).await?;
    Ok(is_up_to_date(&second))
}

async fn run_make(make: &Path, dir: &Path) -> Result<String> {
    let output = Command::new(make)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| TesterError::ProcessError {
            command: make.display().to_string(),
            message: e.to_string(),
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_summary() {
        let output = "==4242== LEAK SUMMARY:
==4242==    definitely lost: 0 bytes in 0 blocks
==4242==    indirectly lost: 0 bytes in 0 blocks
==4242==      possibly lost: 0 bytes in 0 blocks
==4242==    still reachable: 72,704 bytes in 1 blocks";
        assert_eq!(parse_leak_summary(output), LeakVerdict::Clean);
    }

    #[test]
    fn test_all_blocks_freed() {
        let output = "==4242== HEAP SUMMARY:\n==4242== All heap blocks were freed -- no leaks are possible";
        assert_eq!(parse_leak_summary(output), LeakVerdict::Clean);
    }

    #[test]
    fn test_leaking_summary_keeps_lost_lines() {
        let output = "==4242== LEAK SUMMARY:
==4242==    definitely lost: 48 bytes in 2 blocks
==4242==    indirectly lost: 0 bytes in 0 blocks
==4242==    still reachable: 0 bytes in 0 blocks";
        match parse_leak_summary(output) {
            LeakVerdict::Leaking(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0], "==4242==    definitely lost: 48 bytes in 2 blocks");
            }
            other => panic!("expected leak, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_summary() {
        assert_eq!(parse_leak_summary("valgrind: command failed"), LeakVerdict::Unknown);
    }

    #[test]
    fn test_relink_detection() {
        assert!(is_up_to_date("make: Nothing to be done for 'all'."));
        assert!(is_up_to_date("make: 'webserv' is up to date."));
        assert!(!is_up_to_date("c++ -Wall -Wextra -Werror -o webserv main.o"));
    }
}
