use std::collections::BTreeMap;

use serde::Deserialize;

use super::domain::{LabId, Order, OrderId, PhlebotomistId, Priority};
use super::status::{self, OrderStatus, TransitionError};

/// Filter configuration for order queries. `None` means "All" for every
/// option; `search` is a case-insensitive substring match over order id,
/// patient name, and test name.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OrderFilters {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub priority: Option<Priority>,
    pub location: Option<String>,
}

impl OrderFilters {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                let needle = search.to_lowercase();
                let hit = order.id.0.to_lowercase().contains(&needle)
                    || order.patient_name.to_lowercase().contains(&needle)
                    || order.test_name.to_lowercase().contains(&needle);
                if !hit {
                    return false;
                }
            }
        }
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if order.priority != priority {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref() {
            if order.location != location {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown order '{0}'")]
    UnknownOrder(String),
    #[error("order '{0}' already exists")]
    Duplicate(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Exclusive owner of order status and resource bindings.
///
/// Binding mutations are crate-private so only the dispatch engine can touch
/// them together with the registry's counters.
#[derive(Debug, Default, Clone)]
pub struct OrderStore {
    orders: BTreeMap<String, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) -> Result<(), StoreError> {
        if self.orders.contains_key(order.id.0.as_str()) {
            return Err(StoreError::Duplicate(order.id.0.clone()));
        }
        self.orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id.0.as_str())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Lazily evaluated, restartable filtered view; never mutates storage.
    pub fn query<'a>(&'a self, filters: &'a OrderFilters) -> impl Iterator<Item = &'a Order> + 'a {
        self.orders.values().filter(|order| filters.matches(order))
    }

    /// Yields the stored orders for the given ids, in the caller's order,
    /// skipping ids that are not present.
    pub fn select_by_ids<'a>(&'a self, ids: &'a [OrderId]) -> impl Iterator<Item = &'a Order> + 'a {
        ids.iter().filter_map(|id| self.get(id))
    }

    /// Applies a validated status transition; on rejection the order is left
    /// unchanged and the transition error is surfaced.
    pub fn set_status(&mut self, id: &OrderId, new_status: OrderStatus) -> Result<&Order, StoreError> {
        let order = self
            .orders
            .get_mut(id.0.as_str())
            .ok_or_else(|| StoreError::UnknownOrder(id.0.clone()))?;
        status::check_transition(order.status, new_status)?;
        order.status = new_status;
        Ok(order)
    }

    pub(crate) fn bind_resources(
        &mut self,
        id: &OrderId,
        phlebotomist_id: &PhlebotomistId,
        lab_id: &LabId,
    ) -> Result<(), StoreError> {
        let order = self
            .orders
            .get_mut(id.0.as_str())
            .ok_or_else(|| StoreError::UnknownOrder(id.0.clone()))?;
        order.assigned_phlebotomist = Some(phlebotomist_id.clone());
        order.assigned_lab = Some(lab_id.clone());
        Ok(())
    }

    pub(crate) fn clear_resources(&mut self, id: &OrderId) -> Result<(), StoreError> {
        let order = self
            .orders
            .get_mut(id.0.as_str())
            .ok_or_else(|| StoreError::UnknownOrder(id.0.clone()))?;
        order.assigned_phlebotomist = None;
        order.assigned_lab = None;
        Ok(())
    }

    /// Engine-internal revert used by unassignment and assignment rollback;
    /// bypasses the public transition table.
    pub(crate) fn revert_to_unassigned(&mut self, id: &OrderId) -> Result<(), StoreError> {
        let order = self
            .orders
            .get_mut(id.0.as_str())
            .ok_or_else(|| StoreError::UnknownOrder(id.0.clone()))?;
        order.status = OrderStatus::Unassigned;
        order.assigned_phlebotomist = None;
        order.assigned_lab = None;
        Ok(())
    }
}
