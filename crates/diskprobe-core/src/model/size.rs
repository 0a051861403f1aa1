/// Size formatting utilities — human-readable byte counts and percentages.
///
/// All internal sizes are `u64` bytes. Floating point is only used
/// at the display-formatting boundary.
use super::file_node::MAX_PERCENT;
use serde::{Deserialize, Serialize};

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Unit used when rendering byte counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Pick the largest unit that keeps the value ≥ 1.
    #[default]
    Auto,
    Bytes,
    Kb,
    Mb,
    Gb,
}

/// Format a byte count into a human-readable string with appropriate unit.
///
/// Uses binary units (KiB = 1024) but labels them with common short forms
/// (KB, MB, GB, TB) because that is what users expect in a disk tool.
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}

/// Format a byte count in a fixed unit, or automatically for [`SizeUnit::Auto`].
pub fn format_size_in(bytes: u64, unit: SizeUnit) -> String {
    let b = bytes as f64;
    match unit {
        SizeUnit::Auto => format_size(bytes),
        SizeUnit::Bytes => format!("{} B", format_count(bytes)),
        SizeUnit::Kb => format!("{:.1} KB", b / KB),
        SizeUnit::Mb => format!("{:.1} MB", b / MB),
        SizeUnit::Gb => format!("{:.2} GB", b / GB),
    }
}

/// Render a fixed-point percent-of-parent value (0–1000) as `"42.5 %"`.
pub fn format_percent(per_mille: u16) -> String {
    let per_mille = per_mille.min(MAX_PERCENT);
    format!("{}.{} %", per_mille / 10, per_mille % 10)
}

/// Format a file count with thousand separators.
pub fn format_count(count: u64) -> String {
    if count < 1_000 {
        return count.to_string();
    }
    let s = count.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_auto() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(1_099_511_627_776), "1.00 TB");
    }

    #[test]
    fn test_format_size_fixed_units() {
        assert_eq!(format_size_in(8192, SizeUnit::Bytes), "8,192 B");
        assert_eq!(format_size_in(8192, SizeUnit::Kb), "8.0 KB");
        assert_eq!(format_size_in(524_288, SizeUnit::Mb), "0.5 MB");
        assert_eq!(format_size_in(1_073_741_824, SizeUnit::Gb), "1.00 GB");
        assert_eq!(format_size_in(1536, SizeUnit::Auto), "1.5 KB");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0), "0.0 %");
        assert_eq!(format_percent(425), "42.5 %");
        assert_eq!(format_percent(1000), "100.0 %");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }
}
