use crate::core::server::send_terminate;
use crate::utils::error::{Result, TesterError};
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplexer {
    Select,
    Poll,
    Epoll,
}

impl fmt::Display for Multiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Multiplexer::Select => "select",
            Multiplexer::Poll => "poll",
            Multiplexer::Epoll => "epoll",
        })
    }
}

fn syscall_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)(?:^|[\s\]])(pselect6|select|ppoll|poll|epoll_[a-z_]+)\(")
            .expect("valid syscall pattern")
    })
}

/// First multiplexing family found, preferring select over poll over epoll.
pub fn detect_multiplexer(trace: &str) -> Option<Multiplexer> {
    let mut found = [false; 3];
    for caps in syscall_pattern().captures_iter(trace) {
        match &caps[1] {
            "select" | "pselect6" => found[0] = true,
            "poll" | "ppoll" => found[1] = true,
            _ => found[2] = true,
        }
    }

    [Multiplexer::Select, Multiplexer::Poll, Multiplexer::Epoll]
        .into_iter()
        .zip(found)
        .find_map(|(kind, hit)| hit.then_some(kind))
}

pub fn ptrace_denied(trace: &str) -> bool {
    trace.contains("Operation not permitted") && trace.contains("attach")
}

/// Attaches strace to `pid` for `window` while `activity` runs, returning its output.
pub async fn trace_syscalls<F>(strace: &Path, pid: u32, window: Duration, activity: F) -> Result<String>
where
    F: Future,
{
    let started = Instant::now();
    let tracer = Command::new(strace)
        .args(["-f", "-p", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TesterError::ProcessError {
            command: strace.display().to_string(),
            message: e.to_string(),
        })?;
    let tracer_pid = tracer.id();

    // Let the attach settle before generating traffic.
    tokio::time::sleep(window / 4).await;
    activity.await;
    if let Some(remaining) = window.checked_sub(started.elapsed()) {
        tokio::time::sleep(remaining).await;
    }

    if let Some(tracer_pid) = tracer_pid {
        send_terminate(tracer_pid);
    }

    let output = tokio::time::timeout(Duration::from_secs(5), tracer.wait_with_output())
        .await
        .map_err(|_| TesterError::Timeout {
            operation: "strace detach".to_string(),
            after_ms: 5000,
        })??;

    let mut trace = String::from_utf8_lossy(&output.stderr).into_owned();
    trace.push_str(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!("strace captured {} bytes", trace.len());
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_epoll() {
        let trace = "strace: Process 4242 attached\n\
                     epoll_wait(4, [{events=EPOLLIN, data={u32=5, u64=5}}], 64, -1) = 1\n\
                     accept4(3, NULL, NULL, SOCK_NONBLOCK) = 6\n";
        assert_eq!(detect_multiplexer(trace), Some(Multiplexer::Epoll));
    }

    #[test]
    fn test_detects_poll_and_variants() {
        assert_eq!(
            detect_multiplexer("poll([{fd=3, events=POLLIN}], 1, -1) = 1"),
            Some(Multiplexer::Poll)
        );
        assert_eq!(
            detect_multiplexer("[pid  12] ppoll([{fd=3, events=POLLIN}], 1, NULL, NULL, 8) = 1"),
            Some(Multiplexer::Poll)
        );
        assert_eq!(
            detect_multiplexer("pselect6(4, [3], NULL, NULL, NULL, NULL) = 1"),
            Some(Multiplexer::Select)
        );
    }

    #[test]
    fn test_select_takes_priority() {
        let trace = "epoll_wait(4, [], 64, 0) = 0\nselect(4, [3], NULL, NULL, NULL) = 1\n";
        assert_eq!(detect_multiplexer(trace), Some(Multiplexer::Select));
    }

    #[test]
    fn test_blocking_server_has_no_multiplexer() {
        let trace = "accept(3, {sa_family=AF_INET}, [16]) = 4\nread(4, \"GET / HTTP/1.1\", 1024) = 14\n";
        assert_eq!(detect_multiplexer(trace), None);
        // Substrings of unrelated calls must not match.
        assert_eq!(detect_multiplexer("epollution(1) = 0\nrt_sigpoll = 3"), None);
    }

    #[test]
    fn test_ptrace_denied() {
        let trace = "strace: attach: ptrace(PTRACE_SEIZE, 4242): Operation not permitted\n";
        assert!(ptrace_denied(trace));
        assert!(!ptrace_denied("epoll_wait(4, [], 64, 0) = 0"));
    }
}
