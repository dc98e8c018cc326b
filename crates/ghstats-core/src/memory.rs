//! Process memory probe for progress logs.

use std::fs;

/// Virtual memory size of the current process in bytes.
///
/// Reads `VmSize` from `/proc/self/status`. Returns 0 when the file is
/// missing (non-Linux) or cannot be parsed.
pub fn process_memory() -> u64 {
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_vm_size(&status))
        .unwrap_or(0)
}

fn parse_vm_size(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmSize:"))?;
    let mut parts = line["VmSize:".len()..].split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    let scale = match parts.next()?.to_lowercase().as_str() {
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    Some(value * scale)
}

/// Human-readable byte count (`1.5 GB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_size() {
        let status = "Name:\tcat\nVmPeak:\t  9000 kB\nVmSize:\t    8192 kB\nVmRSS:\t 100 kB\n";
        assert_eq!(parse_vm_size(status), Some(8192 * 1024));
    }

    #[test]
    fn test_parse_vm_size_missing() {
        assert_eq!(parse_vm_size("Name:\tcat\n"), None);
        assert_eq!(parse_vm_size("VmSize:\t12 parsecs\n"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
