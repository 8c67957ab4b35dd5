use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics;
use super::status::OrderStatus;

/// Identifier wrapper for test orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

/// Identifier wrapper for phlebotomists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhlebotomistId(pub String);

/// Identifier wrapper for labs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const fn ordered() -> [Self; 3] {
        [Self::High, Self::Medium, Self::Low]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhlebotomistStatus {
    Available,
    Unavailable,
}

impl PhlebotomistStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Unavailable => "Unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Operational,
    Offline,
}

impl LabStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Operational => "Operational",
            Self::Offline => "Offline",
        }
    }
}

/// A single diagnostic test request moving through intake, assignment,
/// processing, and completion. Created Unassigned by the intake boundary and
/// mutated only through the dispatch engine; never deleted, only
/// terminal-stated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub patient_name: String,
    pub test_name: String,
    pub location: String,
    pub priority: Priority,
    pub status: OrderStatus,
    pub assigned_phlebotomist: Option<PhlebotomistId>,
    pub assigned_lab: Option<LabId>,
    pub received_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    /// Elapsed processing-time label (e.g. "1h 15m") reported by the lab feed.
    pub processing_time: Option<String>,
}

impl Order {
    pub fn new(
        id: OrderId,
        patient_name: impl Into<String>,
        test_name: impl Into<String>,
        location: impl Into<String>,
        priority: Priority,
        received_at: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            patient_name: patient_name.into(),
            test_name: test_name.into(),
            location: location.into(),
            priority,
            status: OrderStatus::Unassigned,
            assigned_phlebotomist: None,
            assigned_lab: None,
            received_at,
            due_at,
            processing_time: None,
        }
    }

    /// Both resource bindings are present.
    pub fn is_bound(&self) -> bool {
        self.assigned_phlebotomist.is_some() && self.assigned_lab.is_some()
    }

    pub fn to_view(&self) -> OrderView {
        OrderView {
            id: self.id.0.clone(),
            patient_name: self.patient_name.clone(),
            test_name: self.test_name.clone(),
            location: self.location.clone(),
            priority: self.priority,
            priority_label: self.priority.label().to_string(),
            status: self.status,
            status_label: self.status.label().to_string(),
            assigned_phlebotomist: self.assigned_phlebotomist.as_ref().map(|id| id.0.clone()),
            assigned_lab: self.assigned_lab.as_ref().map(|id| id.0.clone()),
            received_at: self.received_at,
            due_at: self.due_at,
            processing_time: self.processing_time.clone(),
            progress: metrics::progress_percent(self.processing_time.as_deref().unwrap_or("N/A")),
        }
    }
}

/// Sanitized order representation returned by the service surface.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: String,
    pub patient_name: String,
    pub test_name: String,
    pub location: String,
    pub priority: Priority,
    pub priority_label: String,
    pub status: OrderStatus,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_phlebotomist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_lab: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    pub progress: u8,
}

/// A phlebotomist with a bounded number of concurrent assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phlebotomist {
    pub id: PhlebotomistId,
    pub name: String,
    pub current_location: String,
    pub status: PhlebotomistStatus,
    pub current_assignments: u32,
    pub max_capacity: u32,
}

impl Phlebotomist {
    pub fn is_available(&self) -> bool {
        self.status == PhlebotomistStatus::Available
    }

    pub fn has_capacity(&self) -> bool {
        self.current_assignments < self.max_capacity
    }
}

/// A lab with a bounded processing load and a stated turnaround label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lab {
    pub id: LabId,
    pub name: String,
    pub location: String,
    pub status: LabStatus,
    pub current_load: u32,
    pub max_capacity: u32,
    /// Stated turnaround duration label, e.g. "24h".
    pub turnaround_time: String,
}

impl Lab {
    pub fn is_operational(&self) -> bool {
        self.status == LabStatus::Operational
    }

    pub fn has_capacity(&self) -> bool {
        self.current_load < self.max_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_start_unassigned_and_unbound() {
        let order = Order::new(
            OrderId("ORD-1".to_string()),
            "Rosa Delgado",
            "Complete Blood Count",
            "Downtown Clinic",
            Priority::High,
            Utc::now(),
            None,
        );
        assert_eq!(order.status, OrderStatus::Unassigned);
        assert!(!order.is_bound());
        assert!(order.processing_time.is_none());
    }

    #[test]
    fn order_view_carries_labels_and_progress() {
        let mut order = Order::new(
            OrderId("ORD-2".to_string()),
            "Hana Kobayashi",
            "Vitamin D",
            "Downtown Clinic",
            Priority::Low,
            Utc::now(),
            None,
        );
        order.processing_time = Some("1h 15m".to_string());

        let view = order.to_view();
        assert_eq!(view.status_label, "Unassigned");
        assert_eq!(view.priority_label, "Low");
        assert_eq!(view.progress, 63);
    }

    #[test]
    fn priority_parse_param_is_case_insensitive() {
        assert_eq!(Priority::parse_param(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse_param("medium"), Some(Priority::Medium));
        assert_eq!(Priority::parse_param("urgent"), None);
    }
}
