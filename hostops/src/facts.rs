use crate::exec::{stdout_text, Cmd, ExecError};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Host inspection errors
#[derive(Error, Debug)]
pub enum FactsError {
    /// Output from a host tool did not have the expected shape
    #[error("Could not parse {what}: {detail}")]
    Unparseable { what: String, detail: String },

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    Exec(#[from] ExecError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FactsResult<T> = Result<T, FactsError>;

/// Facts about the host the sequence is about to mutate
#[derive(Debug, Clone, Serialize)]
pub struct HostFacts {
    pub hostname: String,
    pub is_root: bool,
    /// Space available on the filesystem holding the install root, in MiB
    pub disk_available_mb: u64,
    /// MemTotal from /proc/meminfo, in MiB
    pub total_memory_mb: u64,
}

impl HostFacts {
    /// Gather facts. `probe_path` selects the filesystem the disk figure is
    /// measured on; it is walked up to the nearest existing ancestor so a
    /// not-yet-created install root still resolves to the right mount.
    pub fn gather(probe_path: &Path) -> FactsResult<Self> {
        let mut path = probe_path;
        while !path.exists() {
            path = path.parent().unwrap_or(Path::new("/"));
        }

        Ok(Self {
            hostname: hostname()?,
            is_root: is_root()?,
            disk_available_mb: disk_available_mb(path)?,
            total_memory_mb: total_memory_mb()?,
        })
    }
}

/// Whether the current process runs with root privileges.
pub fn is_root() -> FactsResult<bool> {
    let output = Cmd::new("id").arg("-u").run()?;
    let uid = stdout_text(&output);
    Ok(uid == "0")
}

fn hostname() -> FactsResult<String> {
    let output = Cmd::new("hostname").run()?;
    Ok(stdout_text(&output))
}

fn disk_available_mb(path: &Path) -> FactsResult<u64> {
    let output = Cmd::new("df")
        .arg("-Pm")
        .arg(path.display().to_string())
        .run()?;
    let text = String::from_utf8_lossy(&output.stdout);
    parse_df_output(&text).ok_or_else(|| FactsError::Unparseable {
        what: "df output".to_string(),
        detail: text.trim().to_string(),
    })
}

fn total_memory_mb() -> FactsResult<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo")?;
    parse_meminfo(&meminfo).ok_or_else(|| FactsError::Unparseable {
        what: "/proc/meminfo".to_string(),
        detail: "no MemTotal line".to_string(),
    })
}

/// Available MiB from POSIX `df -Pm` output: second line, fourth column.
fn parse_df_output(text: &str) -> Option<u64> {
    let data_line = text.lines().nth(1)?;
    let available = data_line.split_whitespace().nth(3)?;
    available.parse().ok()
}

/// MemTotal in MiB from /proc/meminfo (reported in kB).
fn parse_meminfo(text: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_df_output() {
        let sample = "\
Filesystem     1048576-blocks   Used Available Capacity Mounted on
/dev/sda1              489620 121460    343233      27% /
";
        assert_eq!(parse_df_output(sample), Some(343233));
    }

    #[test]
    fn test_parse_df_output_rejects_garbage() {
        assert_eq!(parse_df_output(""), None);
        assert_eq!(parse_df_output("Filesystem\n"), None);
        assert_eq!(parse_df_output("Filesystem\n/dev/sda1 a b not-a-number"), None);
    }

    #[test]
    fn test_parse_meminfo() {
        let sample = "\
MemTotal:       16303428 kB
MemFree:         1282412 kB
MemAvailable:    9804564 kB
";
        assert_eq!(parse_meminfo(sample), Some(16303428 / 1024));
    }

    #[test]
    fn test_parse_meminfo_missing_line() {
        assert_eq!(parse_meminfo("MemFree: 100 kB\n"), None);
    }

    #[test]
    fn test_gather_on_this_host() {
        let facts = HostFacts::gather(Path::new("/")).unwrap();
        assert!(!facts.hostname.is_empty());
        assert!(facts.total_memory_mb > 0);
        assert!(facts.disk_available_mb > 0);
    }

    #[test]
    fn test_gather_walks_up_missing_paths() {
        let facts = HostFacts::gather(Path::new("/no/such/install/root")).unwrap();
        assert!(facts.disk_available_mb > 0);
    }
}
