//! Report-severity classification.

use serde::{Deserialize, Serialize};

use crate::admin_config::ReportThresholds;

/// Severity tier of a post's report count. Ordered: Normal < Warning < Urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Urgent,
}

/// The highest tier whose threshold the report count meets or exceeds.
/// Counts below the warning threshold are Normal.
pub fn severity_of(report_count: i64, thresholds: &ReportThresholds) -> Severity {
    if report_count >= thresholds.urgent {
        Severity::Urgent
    } else if report_count >= thresholds.warning {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Whether a report count puts a post in the urgent tier.
pub fn is_urgent(report_count: i64, thresholds: &ReportThresholds) -> bool {
    report_count >= thresholds.urgent
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: ReportThresholds = ReportThresholds {
        normal: 2,
        warning: 5,
        urgent: 10,
    };

    #[test]
    fn classifies_tiers() {
        assert_eq!(severity_of(0, &THRESHOLDS), Severity::Normal);
        assert_eq!(severity_of(4, &THRESHOLDS), Severity::Normal);
        assert_eq!(severity_of(5, &THRESHOLDS), Severity::Warning);
        assert_eq!(severity_of(9, &THRESHOLDS), Severity::Warning);
        assert_eq!(severity_of(10, &THRESHOLDS), Severity::Urgent);
        assert_eq!(severity_of(250, &THRESHOLDS), Severity::Urgent);
    }

    #[test]
    fn urgent_predicate_matches_tier() {
        assert!(!is_urgent(9, &THRESHOLDS));
        assert!(is_urgent(10, &THRESHOLDS));
        assert_eq!(
            severity_of(10, &THRESHOLDS) == Severity::Urgent,
            is_urgent(10, &THRESHOLDS)
        );
    }

    #[test]
    fn monotonic_in_report_count() {
        let mut last = Severity::Normal;
        for count in 0..32 {
            let tier = severity_of(count, &THRESHOLDS);
            assert!(tier >= last, "severity decreased at count {count}");
            last = tier;
        }
    }
}
