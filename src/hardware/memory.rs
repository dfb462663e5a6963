//! System and process memory readings

use std::io;
use std::process::Command;

#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::io::BufRead;

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// System memory snapshot in bytes
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    pub system_total_bytes: u64,
    pub system_available_bytes: u64,
}

impl MemoryInfo {
    pub fn current() -> io::Result<Self> {
        #[cfg(target_os = "macos")]
        {
            Self::from_macos()
        }

        #[cfg(target_os = "linux")]
        {
            Self::from_linux()
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Memory monitoring not supported on this platform",
            ))
        }
    }

    #[cfg(target_os = "macos")]
    fn from_macos() -> io::Result<Self> {
        let sys_output = Command::new("sysctl").args(["-n", "hw.memsize"]).output()?;
        let total_bytes: u64 = String::from_utf8_lossy(&sys_output.stdout)
            .trim()
            .parse()
            .unwrap_or(0);

        let vm_output = Command::new("vm_stat").output()?;
        let vm_str = String::from_utf8_lossy(&vm_output.stdout);
        let page_size = vm_str
            .lines()
            .next()
            .and_then(|header| header.split("page size of").nth(1))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(4096);

        let pages = |prefix: &str| -> u64 {
            vm_str
                .lines()
                .find(|line| line.starts_with(prefix))
                .and_then(|line| line.split(':').nth(1))
                .and_then(|s| s.trim().trim_end_matches('.').parse().ok())
                .unwrap_or(0)
        };

        // Inactive and purgeable pages are reclaimable without swapping
        let available_pages =
            pages("Pages free:") + pages("Pages inactive:") + pages("Pages purgeable:");

        Ok(Self {
            system_total_bytes: total_bytes,
            system_available_bytes: available_pages * page_size,
        })
    }

    #[cfg(target_os = "linux")]
    fn from_linux() -> io::Result<Self> {
        let reader = io::BufReader::new(fs::File::open("/proc/meminfo")?);

        let mut total_kb = 0u64;
        let mut available_kb = 0u64;

        for line in reader.lines() {
            let line = line?;
            if line.starts_with("MemTotal:") {
                total_kb = parse_kb_field(&line).unwrap_or(0);
            } else if line.starts_with("MemAvailable:") {
                available_kb = parse_kb_field(&line).unwrap_or(0);
            }
        }

        Ok(Self {
            system_total_bytes: total_kb * 1024,
            system_available_bytes: available_kb * 1024,
        })
    }

    pub fn available_gb(&self) -> f64 {
        self.system_available_bytes as f64 / BYTES_PER_GB
    }

    pub fn total_gb(&self) -> f64 {
        self.system_total_bytes as f64 / BYTES_PER_GB
    }

    /// Format bytes as human-readable string
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Parse the numeric kB column of a `/proc` status line such as `VmHWM:  1234 kB`
pub(crate) fn parse_kb_field(line: &str) -> Option<u64> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Peak resident memory of another process, in bytes.
///
/// Linux reports the high-water mark (`VmHWM`) directly; elsewhere the current
/// RSS from `ps` is the best available reading.
pub fn process_peak_memory(pid: u32) -> io::Result<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = fs::read_to_string(format!("/proc/{}/status", pid))?;
        let field = |prefix: &str| {
            status
                .lines()
                .find(|line| line.starts_with(prefix))
                .and_then(parse_kb_field)
        };
        if let Some(kb) = field("VmHWM:").or_else(|| field("VmRSS:")) {
            return Ok(kb * 1024);
        }
    }

    let output = Command::new("ps")
        .args(["-o", "rss=", "-p", &pid.to_string()])
        .output()?;
    let rss_kb: u64 = String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Failed to parse RSS"))?;
    Ok(rss_kb * 1024)
}

/// Source of the "currently available memory" reading used by admission checks
pub trait MemoryProbe {
    fn available_gb(&mut self) -> anyhow::Result<f64>;
}

/// Reads live system memory
#[derive(Debug, Default)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_gb(&mut self) -> anyhow::Result<f64> {
        Ok(MemoryInfo::current()?.available_gb())
    }
}
