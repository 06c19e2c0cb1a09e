use crate::utils::error::{Result, TesterError};
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

/// TCP state code for ESTABLISHED in `/proc/net/tcp`.
const TCP_ESTABLISHED: &str = "01";

#[derive(Debug, Clone)]
pub struct SiegeRun {
    pub availability: Option<f64>,
    pub output: String,
}

/// Benchmark mode (`-b`) against `url` for `duration`.
pub async fn run_siege(siege: &Path, url: &str, duration: Duration) -> Result<SiegeRun> {
    let secs = duration.as_secs().max(1);
    tracing::info!("Running siege against {} for {}s", url, secs);

    let mut command = Command::new(siege);
    command
        .args(["-b", &format!("-t{}s", secs), url])
        .stdin(Stdio::null())
        .kill_on_drop(true);

    // siege stops itself at -t; the margin covers its shutdown and report.
    let deadline = Duration::from_secs(secs + 30);
    let output = tokio::time::timeout(deadline, command.output())
        .await
        .map_err(|_| TesterError::Timeout {
            operation: "siege".to_string(),
            after_ms: deadline.as_millis() as u64,
        })?
        .map_err(|e| TesterError::ProcessError {
            command: siege.display().to_string(),
            message: e.to_string(),
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(SiegeRun {
        availability: parse_availability(&text),
        output: text,
    })
}

fn availability_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)"?availability"?\s*:\s*([0-9]+(?:\.[0-9]+)?)"#).expect("valid availability pattern")
    })
}

/// Reads the availability percentage from siege's text or JSON summary.
pub fn parse_availability(output: &str) -> Option<f64> {
    availability_pattern()
        .captures(output)
        .and_then(|caps| caps[1].parse().ok())
}

/// Counts ESTABLISHED sockets with `port` on either end in a `/proc/net/tcp` table.
pub fn count_established(table: &str, port: u16) -> usize {
    table
        .lines()
        .skip(1)
        .filter(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 || fields[3] != TCP_ESTABLISHED {
                return false;
            }
            [fields[1], fields[2]]
                .iter()
                .any(|endpoint| endpoint_port(endpoint) == Some(port))
        })
        .count()
}

fn endpoint_port(endpoint: &str) -> Option<u16> {
    let (_, port_hex) = endpoint.rsplit_once(':')?;
    u16::from_str_radix(port_hex, 16).ok()
}

/// ESTABLISHED connections touching `port`, or `None` where `/proc/net` is unavailable.
pub fn established_connections(port: u16) -> Option<usize> {
    let tables: Vec<String> = ["/proc/net/tcp", "/proc/net/tcp6"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .collect();

    if tables.is_empty() {
        return None;
    }
    Some(tables.iter().map(|table| count_established(table, port)).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_NET_TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:22B8 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31337 1 0000000000000000 100 0 0 10 0
   1: 0100007F:22B8 0100007F:C350 01 00000000:00000000 00:00000000 00000000  1000        0 31338 1 0000000000000000 20 4 30 10 -1
   2: 0100007F:C350 0100007F:22B8 01 00000000:00000000 00:00000000 00000000  1000        0 31339 1 0000000000000000 20 4 30 10 -1
   3: 0100007F:C351 0100007F:22B8 06 00000000:00000000 03:00000F8F 00000000     0        0 0 3 0000000000000000
   4: 0100007F:1F90 0100007F:C352 01 00000000:00000000 00:00000000 00000000  1000        0 31340 1 0000000000000000 20 4 30 10 -1
";

    #[test]
    fn test_parse_text_availability() {
        let output = "Transactions:\t\t       12456 hits\nAvailability:\t\t       99.87 %\nElapsed time:\t\t        9.99 secs\n";
        assert_eq!(parse_availability(output), Some(99.87));
    }

    #[test]
    fn test_parse_json_availability() {
        let output = r#"{
        "transactions":                        12456,
        "availability":                       100.00,
        "elapsed_time":                         9.99
}"#;
        assert_eq!(parse_availability(output), Some(100.0));
    }

    #[test]
    fn test_missing_availability() {
        assert_eq!(parse_availability("[error] socket: unable to connect"), None);
    }

    #[test]
    fn test_count_established_on_server_port() {
        // 0x22B8 = 8888: one socket on each side of the same connection.
        assert_eq!(count_established(PROC_NET_TCP, 8888), 2);
        // 0x1F90 = 8080
        assert_eq!(count_established(PROC_NET_TCP, 8080), 1);
        assert_eq!(count_established(PROC_NET_TCP, 9999), 0);
    }

    #[test]
    fn test_endpoint_port_ipv6() {
        assert_eq!(endpoint_port("00000000000000000000000001000000:22B8"), Some(8888));
        assert_eq!(endpoint_port("garbage"), None);
    }
}
