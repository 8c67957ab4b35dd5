use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Lab, Priority};
use super::engine::DispatchState;
use super::metrics;
use super::registry::ResourceKind;
use super::status::OrderStatus;

#[derive(Debug, Clone, Serialize)]
pub struct StatusCountEntry {
    pub status: OrderStatus,
    pub status_label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceUtilizationEntry {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    pub status_label: String,
    pub in_use: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverdueOrderView {
    pub id: String,
    pub patient_name: String,
    pub test_name: String,
    pub priority: Priority,
    pub priority_label: String,
    pub status_label: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderProgressView {
    pub id: String,
    pub test_name: String,
    pub processing_time: String,
    pub progress: u8,
}

/// Derived dispatch board: order counts per status, per-resource
/// utilization, overdue orders, in-flight progress, and the fleet's average
/// turnaround label.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub status_counts: Vec<StatusCountEntry>,
    pub utilization: Vec<ResourceUtilizationEntry>,
    pub overdue_orders: Vec<OverdueOrderView>,
    pub in_flight: Vec<OrderProgressView>,
    pub average_turnaround: String,
}

pub fn build_summary(state: &DispatchState, now: DateTime<Utc>) -> DispatchSummary {
    let status_counts = OrderStatus::ordered()
        .into_iter()
        .map(|status| StatusCountEntry {
            status,
            status_label: status.label().to_string(),
            count: state
                .store
                .orders()
                .filter(|order| order.status == status)
                .count(),
        })
        .collect();

    let mut utilization: Vec<ResourceUtilizationEntry> = state
        .registry
        .phlebotomists()
        .map(|p| ResourceUtilizationEntry {
            kind: ResourceKind::Phlebotomist,
            id: p.id.0.clone(),
            name: p.name.clone(),
            status_label: p.status.label().to_string(),
            in_use: p.current_assignments,
            capacity: p.max_capacity,
        })
        .collect();
    utilization.extend(state.registry.labs().map(|lab| ResourceUtilizationEntry {
        kind: ResourceKind::Lab,
        id: lab.id.0.clone(),
        name: lab.name.clone(),
        status_label: lab.status.label().to_string(),
        in_use: lab.current_load,
        capacity: lab.max_capacity,
    }));

    let mut overdue_orders: Vec<OverdueOrderView> = state
        .store
        .orders()
        .filter(|order| !order.status.is_terminal())
        .filter_map(|order| {
            let due_at = order.due_at?;
            (due_at < now).then(|| OverdueOrderView {
                id: order.id.0.clone(),
                patient_name: order.patient_name.clone(),
                test_name: order.test_name.clone(),
                priority: order.priority,
                priority_label: order.priority.label().to_string(),
                status_label: order.status.label().to_string(),
                due_at,
            })
        })
        .collect();
    overdue_orders.sort_by(|a, b| a.due_at.cmp(&b.due_at));

    let in_flight = state
        .store
        .orders()
        .filter(|order| order.status == OrderStatus::InProgress)
        .map(|order| {
            let processing_time = order
                .processing_time
                .clone()
                .unwrap_or_else(|| "N/A".to_string());
            OrderProgressView {
                id: order.id.0.clone(),
                test_name: order.test_name.clone(),
                progress: metrics::progress_percent(&processing_time),
                processing_time,
            }
        })
        .collect();

    let labs: Vec<Lab> = state.registry.labs().cloned().collect();
    let average_turnaround = metrics::average_turnaround(&labs);

    DispatchSummary {
        status_counts,
        utilization,
        overdue_orders,
        in_flight,
        average_turnaround,
    }
}
