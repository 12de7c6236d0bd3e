//! Size deltas and the per-pass report
//!
//! A delta is `(input_size - output_size) / 1000`: kilobytes saved by one
//! conversion, negative when the output grew.

use crate::config::NAMESPACE;
use convcache_store::SkipReason;
use std::path::PathBuf;

const UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Kilobyte-scaled size difference
#[inline]
#[must_use]
pub fn delta_kb(input_size: usize, output_size: usize) -> f64 {
    (input_size as f64 - output_size as f64) / 1000.0
}

/// Render a kilobyte quantity as a human readable size
///
/// Decimal units, at most three significant digits. With `signed`, positive
/// values get a leading `+`.
#[must_use]
pub fn format_size(kb: f64, signed: bool) -> String {
    format_bytes(kb * 1000.0, signed)
}

fn format_bytes(bytes: f64, signed: bool) -> String {
    if bytes == 0.0 || !bytes.is_finite() {
        return "0 B".to_string();
    }

    let prefix = if bytes < 0.0 {
        "-"
    } else if signed {
        "+"
    } else {
        ""
    };
    let mut value = bytes.abs();

    if value < 1.0 {
        return format!("{prefix}{} B", to_precision(value, 3));
    }

    let exponent = ((value.log10() / 3.0).floor() as usize).min(UNITS.len() - 1);
    value /= 1000f64.powi(exponent as i32);

    format!("{prefix}{} {}", to_precision(value, 3), UNITS[exponent])
}

fn to_precision(value: f64, digits: i32) -> String {
    let magnitude = value.log10().floor() as i32 + 1;
    let decimals = (digits - magnitude).max(0) as usize;
    let rendered = format!("{value:.decimals$}");
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

/// Outcome of one matching (asset, config) pair
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRecord {
    /// Input asset name
    pub asset: String,
    /// Name the converted asset was registered under
    pub output: String,
    /// Input length in bytes
    pub input_size: usize,
    /// Output length in bytes
    pub output_size: usize,
    /// Output came from the cache
    pub cache_hit: bool,
}

impl DeltaRecord {
    /// Kilobytes saved
    #[inline]
    #[must_use]
    pub fn delta(&self) -> f64 {
        delta_kb(self.input_size, self.output_size)
    }

    /// Line logged for verbose configs
    #[must_use]
    pub fn log_line(&self) -> String {
        let marker = if self.cache_hit { " (cache)" } else { "" };
        format!(
            "{marker} {} -> {}: {}",
            self.asset,
            self.output,
            format_size(self.delta(), true)
        )
    }
}

/// Recoverable cache problem seen during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWarning {
    /// Entry exists but could not be read; the transform ran instead
    ReadPermissionDenied {
        /// Entry path
        path: PathBuf,
    },
    /// Converted bytes were used but not persisted
    WriteSkipped {
        /// Entry path
        path: PathBuf,
        /// Why the write was skipped
        reason: SkipReason,
    },
}

/// Two registrations under the same output name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    /// Contested output name
    pub name: String,
    /// Input asset whose output won (registered last)
    pub asset: String,
}

/// Aggregate result of one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Matching pairs, in dispatch order
    pub records: Vec<DeltaRecord>,
    /// Pairs whose predicate did not match
    pub unmatched: usize,
    /// Recoverable cache problems
    pub warnings: Vec<CacheWarning>,
    /// Output name collisions
    pub collisions: Vec<NameCollision>,
}

impl PassReport {
    /// Sum of all pair deltas; unmatched pairs count as zero
    #[must_use]
    pub fn total_delta(&self) -> f64 {
        self.records.iter().map(DeltaRecord::delta).sum()
    }

    /// Number of pairs served from the cache
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.records.iter().filter(|r| r.cache_hit).count()
    }

    /// Line logged once the pass settles
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{NAMESPACE} {}", format_size(self.total_delta(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(input_size: usize, output_size: usize, cache_hit: bool) -> DeltaRecord {
        DeltaRecord {
            asset: "a.css".to_string(),
            output: "a.min".to_string(),
            input_size,
            output_size,
            cache_hit,
        }
    }

    #[test]
    fn delta_is_kilobytes_saved() {
        assert_eq!(delta_kb(4000, 1000), 3.0);
        assert_eq!(delta_kb(1000, 4000), -3.0);
        assert_eq!(delta_kb(10, 10), 0.0);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0.0, false), "0 B");
        assert_eq!(format_size(0.5, false), "500 B");
        assert_eq!(format_size(3.0, false), "3 kB");
        assert_eq!(format_size(1.5, false), "1.5 kB");
        assert_eq!(format_size(1337.0, false), "1.34 MB");
        assert_eq!(format_size(0.0005, false), "0.5 B");
    }

    #[test]
    fn format_size_signed() {
        assert_eq!(format_size(3.0, true), "+3 kB");
        assert_eq!(format_size(-3.0, true), "-3 kB");
        assert_eq!(format_size(-3.0, false), "-3 kB");
        assert_eq!(format_size(0.0, true), "0 B");
    }

    #[test]
    fn format_size_absorbs_float_noise() {
        assert_eq!(format_size(0.1 + 0.2, false), "300 B");
    }

    #[test]
    fn total_is_exact_sum() {
        let report = PassReport {
            records: vec![record(4000, 1000, false), record(2000, 2500, true)],
            unmatched: 3,
            ..PassReport::default()
        };
        assert_eq!(report.total_delta(), 2.5);
        assert_eq!(report.cache_hits(), 1);
        assert_eq!(report.summary(), format!("{NAMESPACE} 2.5 kB"));
    }

    #[test]
    fn empty_report_totals_zero() {
        let report = PassReport::default();
        assert_eq!(report.total_delta(), 0.0);
        assert_eq!(report.summary(), format!("{NAMESPACE} 0 B"));
    }

    #[test]
    fn log_line_marks_cache_hits() {
        assert_eq!(record(4000, 1000, true).log_line(), " (cache) a.css -> a.min: +3 kB");
        assert_eq!(record(4000, 1000, false).log_line(), " a.css -> a.min: +3 kB");
    }
}
