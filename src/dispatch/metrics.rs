//! Derived turnaround and progress figures.
//!
//! Both calculations work on formatted duration labels, not measured signals.
//! They exist to keep the dashboards the platform inherited rendering the
//! same numbers; see [`progress_percent`] for the caveats.

use super::domain::Lab;

/// Reference duration against which a processing-time label is scored.
pub const PROGRESS_REFERENCE_MINUTES: u64 = 120;

/// Averages the labs' stated turnaround labels ("24h" format) to the nearest
/// hour. Unparseable labels count as zero hours but still count toward the
/// divisor; an empty roster yields "N/A".
pub fn average_turnaround(labs: &[Lab]) -> String {
    if labs.is_empty() {
        return "N/A".to_string();
    }
    let total = labs
        .iter()
        .map(|lab| parse_hours(&lab.turnaround_time))
        .fold(0u64, u64::saturating_add);
    let count = labs.len() as u64;
    let average = total.saturating_add(count / 2) / count;
    format!("{average}h")
}

/// Scores an elapsed processing-time label ("1h 15m" format, either part
/// optional) against a fixed two-hour reference, clamped to 100.
///
/// This is a presentation heuristic carried over from the original hub
/// dashboard: it fabricates a progress figure purely from elapsed-time
/// formatting and says nothing about how far the lab actually is with the
/// sample. "N/A" and unparseable labels score zero.
pub fn progress_percent(label: &str) -> u8 {
    let minutes = parse_minutes(label);
    if minutes == 0 {
        return 0;
    }
    // Labels come from external feeds, so the arithmetic saturates instead of
    // trusting them to stay small; the clamp at 100 absorbs the difference.
    let percent = minutes
        .saturating_mul(100)
        .saturating_add(PROGRESS_REFERENCE_MINUTES / 2)
        / PROGRESS_REFERENCE_MINUTES;
    percent.min(100) as u8
}

fn parse_hours(label: &str) -> u64 {
    label
        .trim()
        .strip_suffix('h')
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

fn parse_minutes(label: &str) -> u64 {
    let mut total = 0u64;
    for token in label.split_whitespace() {
        if let Some(hours) = token.strip_suffix('h').and_then(|v| v.parse::<u64>().ok()) {
            total = total.saturating_add(hours.saturating_mul(60));
        } else if let Some(minutes) = token.strip_suffix('m').and_then(|v| v.parse::<u64>().ok()) {
            total = total.saturating_add(minutes);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::domain::{LabId, LabStatus};

    fn lab_with_turnaround(turnaround: &str) -> Lab {
        Lab {
            id: LabId(format!("LAB-{turnaround}")),
            name: "Lab".to_string(),
            location: "Downtown".to_string(),
            status: LabStatus::Operational,
            current_load: 0,
            max_capacity: 10,
            turnaround_time: turnaround.to_string(),
        }
    }

    #[test]
    fn average_turnaround_rounds_to_nearest_hour() {
        let labs = vec![lab_with_turnaround("24h"), lab_with_turnaround("36h")];
        assert_eq!(average_turnaround(&labs), "30h");

        let labs = vec![lab_with_turnaround("24h"), lab_with_turnaround("27h")];
        assert_eq!(average_turnaround(&labs), "26h");
    }

    #[test]
    fn average_turnaround_guards_empty_input() {
        assert_eq!(average_turnaround(&[]), "N/A");
    }

    #[test]
    fn unparseable_turnarounds_count_as_zero_hours() {
        let labs = vec![lab_with_turnaround("24h"), lab_with_turnaround("same day")];
        assert_eq!(average_turnaround(&labs), "12h");
    }

    #[test]
    fn progress_scores_against_the_two_hour_reference() {
        assert_eq!(progress_percent("1h 15m"), 63);
        assert_eq!(progress_percent("45m"), 38);
        assert_eq!(progress_percent("2h"), 100);
    }

    #[test]
    fn progress_clamps_at_one_hundred() {
        assert_eq!(progress_percent("3h"), 100);
        assert_eq!(progress_percent("47h 59m"), 100);
    }

    #[test]
    fn oversized_labels_saturate_instead_of_overflowing() {
        assert_eq!(progress_percent("100000000h"), 100);
        assert_eq!(progress_percent("18446744073709551615h 18446744073709551615m"), 100);

        let labs = vec![lab_with_turnaround("18446744073709551615h")];
        assert_eq!(average_turnaround(&labs), format!("{}h", u64::MAX));
    }

    #[test]
    fn progress_is_zero_for_missing_or_garbage_labels() {
        assert_eq!(progress_percent("N/A"), 0);
        assert_eq!(progress_percent(""), 0);
        assert_eq!(progress_percent("soon"), 0);
        assert_eq!(progress_percent("0m"), 0);
    }
}
