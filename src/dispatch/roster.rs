//! Demo roster used by the CLI report, the default server state, and tests.

use chrono::{DateTime, Duration, Utc};

use super::domain::{
    Lab, LabId, LabStatus, Order, OrderId, Phlebotomist, PhlebotomistId, PhlebotomistStatus,
    Priority,
};
use super::engine::DispatchState;
use super::status::OrderStatus;

/// Builds the standard demo state: three phlebotomists, three labs, and a
/// day's worth of orders at various lifecycle points, with counters matching
/// the bound orders.
pub fn standard(now: DateTime<Utc>) -> DispatchState {
    let mut state = DispatchState::default();

    state.registry.add_phlebotomist(Phlebotomist {
        id: PhlebotomistId("PHL-001".to_string()),
        name: "Maya Okafor".to_string(),
        current_location: "Downtown Clinic".to_string(),
        status: PhlebotomistStatus::Available,
        current_assignments: 2,
        max_capacity: 5,
    });
    state.registry.add_phlebotomist(Phlebotomist {
        id: PhlebotomistId("PHL-002".to_string()),
        name: "Daniel Reyes".to_string(),
        current_location: "Northside Clinic".to_string(),
        status: PhlebotomistStatus::Available,
        current_assignments: 0,
        max_capacity: 4,
    });
    state.registry.add_phlebotomist(Phlebotomist {
        id: PhlebotomistId("PHL-003".to_string()),
        name: "Ingrid Svensson".to_string(),
        current_location: "Riverside Campus".to_string(),
        status: PhlebotomistStatus::Unavailable,
        current_assignments: 0,
        max_capacity: 6,
    });

    state.registry.add_lab(Lab {
        id: LabId("LAB-001".to_string()),
        name: "Central Diagnostics".to_string(),
        location: "Downtown".to_string(),
        status: LabStatus::Operational,
        current_load: 32,
        max_capacity: 50,
        turnaround_time: "24h".to_string(),
    });
    state.registry.add_lab(Lab {
        id: LabId("LAB-002".to_string()),
        name: "Northside Pathology".to_string(),
        location: "Northside".to_string(),
        status: LabStatus::Operational,
        current_load: 12,
        max_capacity: 40,
        turnaround_time: "36h".to_string(),
    });
    state.registry.add_lab(Lab {
        id: LabId("LAB-003".to_string()),
        name: "Riverside Reference Lab".to_string(),
        location: "Riverside".to_string(),
        status: LabStatus::Offline,
        current_load: 0,
        max_capacity: 30,
        turnaround_time: "48h".to_string(),
    });

    let orders = standard_orders(now);
    for order in orders {
        // Fixture ids are unique by construction.
        let _ = state.store.insert(order);
    }

    state
}

fn standard_orders(now: DateTime<Utc>) -> Vec<Order> {
    let mut orders = vec![
        Order::new(
            OrderId("ORD-1001".to_string()),
            "Rosa Delgado",
            "Complete Blood Count",
            "Downtown Clinic",
            Priority::High,
            now - Duration::hours(2),
            Some(now - Duration::hours(1)),
        ),
        Order::new(
            OrderId("ORD-1002".to_string()),
            "James Whitfield",
            "Lipid Panel",
            "Downtown Clinic",
            Priority::Medium,
            now - Duration::minutes(90),
            Some(now + Duration::hours(22)),
        ),
        Order::new(
            OrderId("ORD-1003".to_string()),
            "Priya Raman",
            "HbA1c",
            "Northside Clinic",
            Priority::Low,
            now - Duration::hours(1),
            None,
        ),
        Order::new(
            OrderId("ORD-1004".to_string()),
            "Elena Petrova",
            "Thyroid Panel",
            "Riverside Campus",
            Priority::Medium,
            now - Duration::minutes(30),
            Some(now + Duration::hours(30)),
        ),
    ];

    let mut assigned = Order::new(
        OrderId("ORD-1005".to_string()),
        "Samuel Adeyemi",
        "Basic Metabolic Panel",
        "Downtown Clinic",
        Priority::High,
        now - Duration::hours(3),
        Some(now + Duration::hours(6)),
    );
    assigned.status = OrderStatus::Assigned;
    assigned.assigned_phlebotomist = Some(PhlebotomistId("PHL-001".to_string()));
    assigned.assigned_lab = Some(LabId("LAB-001".to_string()));
    orders.push(assigned);

    let mut in_progress = Order::new(
        OrderId("ORD-1006".to_string()),
        "Hana Kobayashi",
        "Vitamin D",
        "Downtown Clinic",
        Priority::Low,
        now - Duration::hours(4),
        Some(now + Duration::hours(20)),
    );
    in_progress.status = OrderStatus::InProgress;
    in_progress.assigned_phlebotomist = Some(PhlebotomistId("PHL-001".to_string()));
    in_progress.assigned_lab = Some(LabId("LAB-001".to_string()));
    in_progress.processing_time = Some("1h 15m".to_string());
    orders.push(in_progress);

    let mut completed = Order::new(
        OrderId("ORD-1007".to_string()),
        "Marcus Bell",
        "Ferritin",
        "Northside Clinic",
        Priority::Medium,
        now - Duration::hours(26),
        Some(now - Duration::hours(2)),
    );
    completed.status = OrderStatus::Completed;
    completed.assigned_phlebotomist = Some(PhlebotomistId("PHL-002".to_string()));
    completed.assigned_lab = Some(LabId("LAB-002".to_string()));
    completed.processing_time = Some("5h 40m".to_string());
    orders.push(completed);

    orders
}
