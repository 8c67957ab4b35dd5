use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical order lifecycle states shared by every consumer.
///
/// The original views compared loosely formatted status strings; this closed
/// enumeration and the single transition table below replace those checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Unassigned,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Delayed,
}

impl OrderStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Unassigned,
            Self::Assigned,
            Self::InProgress,
            Self::Delayed,
            Self::Completed,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Unassigned => "Unassigned",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Delayed => "Delayed",
        }
    }

    /// Completed and Cancelled accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States that count against a phlebotomist's assignment ceiling.
    pub const fn occupies_phlebotomist(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }

    /// States that count against a lab's load ceiling.
    pub const fn occupies_lab(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress | Self::Delayed)
    }

    /// Accepts API/query spellings of a status, tolerating case and
    /// hyphen/underscore variation ("in_progress", "In Progress", "in-progress").
    pub fn parse_param(value: &str) -> Option<Self> {
        let normalized = value
            .trim()
            .chars()
            .map(|c| match c {
                '-' | '_' => ' ',
                other => other.to_ascii_lowercase(),
            })
            .collect::<String>();

        match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "unassigned" => Some(Self::Unassigned),
            "assigned" => Some(Self::Assigned),
            "in progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "delayed" => Some(Self::Delayed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejection raised for a (state, event) pair outside the transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no legal transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("order is {status}, a terminal state that accepts no further transitions")]
    TerminalState { status: OrderStatus },
}

/// Validates a status transition against the canonical table.
///
/// Legal edges: Unassigned → Assigned; Assigned → InProgress/Delayed;
/// InProgress → Completed/Delayed; Delayed → InProgress; and any non-terminal
/// state → Cancelled. Everything else is rejected and must leave the order
/// untouched.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
    use OrderStatus::*;

    if from.is_terminal() {
        return Err(TransitionError::TerminalState { status: from });
    }

    let legal = match (from, to) {
        (_, Cancelled) => true,
        (Unassigned, Assigned) => true,
        (Assigned, InProgress) | (Assigned, Delayed) => true,
        (InProgress, Completed) | (InProgress, Delayed) => true,
        (Delayed, InProgress) => true,
        _ => false,
    };

    if legal {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn legal_transitions_follow_the_lifecycle() {
        let legal = [
            (Unassigned, Assigned),
            (Assigned, InProgress),
            (Assigned, Delayed),
            (Assigned, Cancelled),
            (InProgress, Completed),
            (InProgress, Delayed),
            (InProgress, Cancelled),
            (Delayed, InProgress),
            (Delayed, Cancelled),
            (Unassigned, Cancelled),
        ];

        for (from, to) in legal {
            assert!(
                check_transition(from, to).is_ok(),
                "{from} -> {to} should be legal"
            );
        }
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        for from in OrderStatus::ordered() {
            for to in OrderStatus::ordered() {
                let result = check_transition(from, to);
                if from.is_terminal() {
                    assert_eq!(result, Err(TransitionError::TerminalState { status: from }));
                } else if result.is_err() {
                    assert_eq!(result, Err(TransitionError::InvalidTransition { from, to }));
                }
            }
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for to in OrderStatus::ordered() {
            assert!(matches!(
                check_transition(Completed, to),
                Err(TransitionError::TerminalState { .. })
            ));
            assert!(matches!(
                check_transition(Cancelled, to),
                Err(TransitionError::TerminalState { .. })
            ));
        }
    }

    #[test]
    fn self_transitions_are_rejected_for_non_terminal_states() {
        assert!(check_transition(Assigned, Assigned).is_err());
        assert!(check_transition(InProgress, InProgress).is_err());
    }

    #[test]
    fn parse_param_tolerates_spelling_variants() {
        assert_eq!(OrderStatus::parse_param("In Progress"), Some(InProgress));
        assert_eq!(OrderStatus::parse_param("in_progress"), Some(InProgress));
        assert_eq!(OrderStatus::parse_param("IN-PROGRESS"), Some(InProgress));
        assert_eq!(OrderStatus::parse_param("unassigned"), Some(Unassigned));
        assert_eq!(OrderStatus::parse_param("bogus"), None);
    }
}
