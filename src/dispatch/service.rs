use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::domain::{Lab, LabId, Order, OrderId, OrderView, Phlebotomist, PhlebotomistId};
use super::engine::{DispatchError, DispatchState};
use super::report::{self, DispatchSummary};
use super::status::OrderStatus;
use super::store::{OrderFilters, StoreError};

/// Thread-safe facade over the dispatch state.
///
/// A single lock guards the registry and store together, so every write
/// operation lands as one atomic unit and every read observes a consistent
/// snapshot; reads run concurrently with each other.
#[derive(Debug)]
pub struct DispatchService {
    state: RwLock<DispatchState>,
}

impl DispatchService {
    pub fn new(state: DispatchState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DispatchState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DispatchState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn orders(&self, filters: &OrderFilters) -> Vec<OrderView> {
        self.read()
            .store
            .query(filters)
            .map(Order::to_view)
            .collect()
    }

    pub fn order(&self, id: &OrderId) -> Option<OrderView> {
        self.read().store.get(id).map(Order::to_view)
    }

    pub fn available_phlebotomists(&self) -> Vec<Phlebotomist> {
        self.read()
            .registry
            .list_available_phlebotomists()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn available_labs(&self) -> Vec<Lab> {
        self.read()
            .registry
            .list_available_labs()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn assign(
        &self,
        order_ids: &[OrderId],
        lab_id: &LabId,
        phlebotomist_id: &PhlebotomistId,
    ) -> Result<Vec<OrderView>, DispatchError> {
        let mut state = self.write();
        let orders = state.assign(order_ids, lab_id, phlebotomist_id)?;
        Ok(orders.iter().map(Order::to_view).collect())
    }

    pub fn unassign(&self, order_ids: &[OrderId]) -> Result<Vec<OrderView>, DispatchError> {
        let mut state = self.write();
        let orders = state.unassign(order_ids)?;
        Ok(orders.iter().map(Order::to_view).collect())
    }

    pub fn set_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<OrderView, DispatchError> {
        let mut state = self.write();
        let order = state.set_status(id, status)?;
        Ok(order.to_view())
    }

    /// Intake boundary: admits externally created orders into the store.
    pub fn add_orders(&self, orders: Vec<Order>) -> Result<usize, StoreError> {
        let mut state = self.write();
        let mut admitted = 0;
        for order in orders {
            state.store.insert(order)?;
            admitted += 1;
        }
        Ok(admitted)
    }

    pub fn summary(&self) -> DispatchSummary {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> DispatchSummary {
        report::build_summary(&self.read(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::roster;

    #[test]
    fn service_exposes_filtered_order_views() {
        let service = DispatchService::new(roster::standard(Utc::now()));
        let filters = OrderFilters {
            status: Some(OrderStatus::Unassigned),
            ..OrderFilters::default()
        };
        let views = service.orders(&filters);
        assert_eq!(views.len(), 4);
        assert!(views.iter().all(|view| view.status_label == "Unassigned"));
    }

    #[test]
    fn assignment_through_the_service_is_visible_to_readers() {
        let service = DispatchService::new(roster::standard(Utc::now()));
        let ids = vec![OrderId("ORD-1001".to_string()), OrderId("ORD-1002".to_string())];
        let assigned = service
            .assign(
                &ids,
                &LabId("LAB-002".to_string()),
                &PhlebotomistId("PHL-002".to_string()),
            )
            .expect("capacity available");
        assert_eq!(assigned.len(), 2);

        let available = service.available_phlebotomists();
        let daniel = available
            .iter()
            .find(|p| p.id.0 == "PHL-002")
            .expect("still has spare capacity");
        assert_eq!(daniel.current_assignments, 2);
    }

    #[test]
    fn add_orders_rejects_duplicates() {
        let service = DispatchService::new(roster::standard(Utc::now()));
        let duplicate = crate::dispatch::domain::Order::new(
            OrderId("ORD-1001".to_string()),
            "Rosa Delgado",
            "Complete Blood Count",
            "Downtown Clinic",
            crate::dispatch::domain::Priority::High,
            Utc::now(),
            None,
        );
        let err = service.add_orders(vec![duplicate]).expect_err("duplicate id");
        assert_eq!(err, StoreError::Duplicate("ORD-1001".to_string()));
    }
}
