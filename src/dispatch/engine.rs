use tracing::{debug, info};

use super::domain::{LabId, Order, OrderId, PhlebotomistId};
use super::registry::{RegistryError, ResourceKind, ResourceRegistry};
use super::status::{self, OrderStatus, TransitionError};
use super::store::{OrderStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The requested lab or phlebotomist is missing or not accepting work;
    /// the whole batch is rejected.
    #[error("invalid lab or phlebotomist selection: {0}")]
    InvalidResource(#[source] RegistryError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("unknown order '{0}'")]
    UnknownOrder(String),
    #[error("order '{failed_id}' blocked the batch: {source}")]
    PartialOrderFailure {
        failed_id: String,
        #[source]
        source: TransitionError,
    },
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownOrder(id) | StoreError::Duplicate(id) => Self::UnknownOrder(id),
            StoreError::Transition(err) => Self::Transition(err),
        }
    }
}

/// Combined dispatch state: the registry owns capacity counters, the store
/// owns order status and bindings, and only the operations here mutate both
/// in a single unit of work.
#[derive(Debug, Default, Clone)]
pub struct DispatchState {
    pub registry: ResourceRegistry,
    pub store: OrderStore,
}

impl DispatchState {
    pub fn new(registry: ResourceRegistry, store: OrderStore) -> Self {
        Self { registry, store }
    }

    /// Assigns a batch of orders to one (lab, phlebotomist) pair.
    ///
    /// All-or-nothing: resource validation, capacity reservation, and every
    /// per-order transition must succeed, otherwise reservations and any
    /// partially applied bindings are rolled back and the pre-call state is
    /// restored. Orders are processed in the caller-supplied sequence.
    pub fn assign(
        &mut self,
        order_ids: &[OrderId],
        lab_id: &LabId,
        phlebotomist_id: &PhlebotomistId,
    ) -> Result<Vec<Order>, DispatchError> {
        let order_ids = dedupe_ids(order_ids);

        let lab = self
            .registry
            .lab(lab_id)
            .ok_or_else(|| {
                DispatchError::InvalidResource(RegistryError::UnknownResource {
                    kind: ResourceKind::Lab,
                    id: lab_id.0.clone(),
                })
            })?;
        if !lab.is_operational() {
            return Err(DispatchError::InvalidResource(
                RegistryError::ResourceUnavailable {
                    kind: ResourceKind::Lab,
                    id: lab_id.0.clone(),
                },
            ));
        }
        let phlebotomist = self
            .registry
            .phlebotomist(phlebotomist_id)
            .ok_or_else(|| {
                DispatchError::InvalidResource(RegistryError::UnknownResource {
                    kind: ResourceKind::Phlebotomist,
                    id: phlebotomist_id.0.clone(),
                })
            })?;
        if !phlebotomist.is_available() {
            return Err(DispatchError::InvalidResource(
                RegistryError::ResourceUnavailable {
                    kind: ResourceKind::Phlebotomist,
                    id: phlebotomist_id.0.clone(),
                },
            ));
        }

        let count = order_ids.len() as u32;
        self.registry
            .reserve(ResourceKind::Lab, lab_id.0.as_str(), count)?;
        if let Err(err) =
            self.registry
                .reserve(ResourceKind::Phlebotomist, phlebotomist_id.0.as_str(), count)
        {
            self.registry
                .release(ResourceKind::Lab, lab_id.0.as_str(), count);
            return Err(err.into());
        }

        let mut applied: Vec<OrderId> = Vec::with_capacity(order_ids.len());
        for id in &order_ids {
            if self.store.get(id).is_none() {
                self.rollback_assignment(&applied, lab_id, phlebotomist_id, count);
                return Err(DispatchError::UnknownOrder(id.0.clone()));
            }
            match self.store.set_status(id, OrderStatus::Assigned) {
                Ok(_) => {}
                Err(StoreError::Transition(source)) => {
                    self.rollback_assignment(&applied, lab_id, phlebotomist_id, count);
                    return Err(DispatchError::PartialOrderFailure {
                        failed_id: id.0.clone(),
                        source,
                    });
                }
                Err(other) => {
                    self.rollback_assignment(&applied, lab_id, phlebotomist_id, count);
                    return Err(other.into());
                }
            }
            if let Err(err) = self.store.bind_resources(id, phlebotomist_id, lab_id) {
                self.rollback_assignment(&applied, lab_id, phlebotomist_id, count);
                return Err(err.into());
            }
            applied.push(id.clone());
        }

        info!(
            orders = order_ids.len(),
            lab = %lab_id.0,
            phlebotomist = %phlebotomist_id.0,
            "batch assigned"
        );

        Ok(self.store.select_by_ids(&order_ids).cloned().collect())
    }

    fn rollback_assignment(
        &mut self,
        applied: &[OrderId],
        lab_id: &LabId,
        phlebotomist_id: &PhlebotomistId,
        count: u32,
    ) {
        for id in applied {
            // Cannot fail for ids that were just mutated.
            let _ = self.store.revert_to_unassigned(id);
        }
        self.registry
            .release(ResourceKind::Lab, lab_id.0.as_str(), count);
        self.registry
            .release(ResourceKind::Phlebotomist, phlebotomist_id.0.as_str(), count);
        debug!(rolled_back = applied.len(), "assignment batch rolled back");
    }

    /// Returns bound, non-terminal orders to Unassigned, releasing the slots
    /// they occupy. Orders already Unassigned (or terminal) are skipped, so
    /// repeating the call is a no-op.
    pub fn unassign(&mut self, order_ids: &[OrderId]) -> Result<Vec<Order>, DispatchError> {
        let order_ids = dedupe_ids(order_ids);

        for id in &order_ids {
            if self.store.get(id).is_none() {
                return Err(DispatchError::UnknownOrder(id.0.clone()));
            }
        }

        for id in &order_ids {
            let order = match self.store.get(id) {
                Some(order) => order.clone(),
                None => continue,
            };
            if order.status == OrderStatus::Unassigned || order.status.is_terminal() {
                continue;
            }
            if let Some(phlebotomist_id) = &order.assigned_phlebotomist {
                if order.status.occupies_phlebotomist() {
                    self.registry
                        .release(ResourceKind::Phlebotomist, phlebotomist_id.0.as_str(), 1);
                }
            }
            if let Some(lab_id) = &order.assigned_lab {
                if order.status.occupies_lab() {
                    self.registry.release(ResourceKind::Lab, lab_id.0.as_str(), 1);
                }
            }
            self.store.revert_to_unassigned(id)?;
        }

        Ok(self.store.select_by_ids(&order_ids).cloned().collect())
    }

    /// Applies a direct status transition, keeping the capacity counters in
    /// step with the states they are defined over: entering Delayed frees the
    /// phlebotomist slot, resuming re-reserves it (and can fail with
    /// CapacityExceeded, leaving the order untouched), and terminal states
    /// release whatever the order still occupies. Cancellation through this
    /// path retains the bindings for audit.
    pub fn set_status(
        &mut self,
        id: &OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, DispatchError> {
        let order = self
            .store
            .get(id)
            .ok_or_else(|| DispatchError::UnknownOrder(id.0.clone()))?
            .clone();
        let old_status = order.status;
        // Assigned is only reachable through the assignment path, which
        // reserves capacity and records both bindings.
        if new_status == OrderStatus::Assigned {
            return Err(TransitionError::InvalidTransition {
                from: old_status,
                to: new_status,
            }
            .into());
        }
        status::check_transition(old_status, new_status)?;

        if let Some(phlebotomist_id) = &order.assigned_phlebotomist {
            if !old_status.occupies_phlebotomist() && new_status.occupies_phlebotomist() {
                self.registry
                    .reserve(ResourceKind::Phlebotomist, phlebotomist_id.0.as_str(), 1)?;
            }
        }

        if let Err(err) = self.store.set_status(id, new_status) {
            if let Some(phlebotomist_id) = &order.assigned_phlebotomist {
                if !old_status.occupies_phlebotomist() && new_status.occupies_phlebotomist() {
                    self.registry
                        .release(ResourceKind::Phlebotomist, phlebotomist_id.0.as_str(), 1);
                }
            }
            return Err(err.into());
        }

        if let Some(phlebotomist_id) = &order.assigned_phlebotomist {
            if old_status.occupies_phlebotomist() && !new_status.occupies_phlebotomist() {
                self.registry
                    .release(ResourceKind::Phlebotomist, phlebotomist_id.0.as_str(), 1);
            }
        }
        if let Some(lab_id) = &order.assigned_lab {
            if old_status.occupies_lab() && !new_status.occupies_lab() {
                self.registry.release(ResourceKind::Lab, lab_id.0.as_str(), 1);
            }
        }

        debug!(order = %id.0, from = %old_status, to = %new_status, "status updated");

        self.store
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownOrder(id.0.clone()))
    }
}

fn dedupe_ids(ids: &[OrderId]) -> Vec<OrderId> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.0.clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::domain::{
        Lab, LabStatus, Order, Phlebotomist, PhlebotomistStatus, Priority,
    };
    use chrono::Utc;

    fn state() -> DispatchState {
        let mut registry = ResourceRegistry::new();
        registry.add_phlebotomist(Phlebotomist {
            id: PhlebotomistId("PHL-1".to_string()),
            name: "Maya Okafor".to_string(),
            current_location: "Downtown Clinic".to_string(),
            status: PhlebotomistStatus::Available,
            current_assignments: 0,
            max_capacity: 5,
        });
        registry.add_lab(Lab {
            id: LabId("LAB-1".to_string()),
            name: "Central Diagnostics".to_string(),
            location: "Downtown".to_string(),
            status: LabStatus::Operational,
            current_load: 32,
            max_capacity: 50,
            turnaround_time: "24h".to_string(),
        });

        let mut store = OrderStore::new();
        for id in ["ORD-1", "ORD-2", "ORD-3"] {
            store
                .insert(Order::new(
                    OrderId(id.to_string()),
                    "Patient",
                    "Complete Blood Count",
                    "Downtown Clinic",
                    Priority::High,
                    Utc::now(),
                    None,
                ))
                .expect("insert");
        }
        DispatchState::new(registry, store)
    }

    fn ids(raw: &[&str]) -> Vec<OrderId> {
        raw.iter().map(|id| OrderId(id.to_string())).collect()
    }

    fn lab_id() -> LabId {
        LabId("LAB-1".to_string())
    }

    fn phl_id() -> PhlebotomistId {
        PhlebotomistId("PHL-1".to_string())
    }

    #[test]
    fn batch_assignment_updates_orders_and_counters_together() {
        let mut state = state();
        let assigned = state
            .assign(&ids(&["ORD-1", "ORD-2"]), &lab_id(), &phl_id())
            .expect("capacity available");

        assert_eq!(assigned.len(), 2);
        for order in &assigned {
            assert_eq!(order.status, OrderStatus::Assigned);
            assert_eq!(order.assigned_phlebotomist, Some(phl_id()));
            assert_eq!(order.assigned_lab, Some(lab_id()));
        }
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            2
        );
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 34);
    }

    #[test]
    fn duplicate_ids_in_a_batch_are_collapsed() {
        let mut state = state();
        let assigned = state
            .assign(&ids(&["ORD-1", "ORD-1"]), &lab_id(), &phl_id())
            .expect("assign");
        assert_eq!(assigned.len(), 1);
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            1
        );
    }

    #[test]
    fn missing_resource_rejects_the_whole_batch() {
        let mut state = state();
        let err = state
            .assign(&ids(&["ORD-1"]), &LabId("LAB-9".to_string()), &phl_id())
            .expect_err("unknown lab");
        assert!(matches!(err, DispatchError::InvalidResource(_)));
        assert_eq!(
            state
                .store
                .get(&OrderId("ORD-1".to_string()))
                .expect("order")
                .status,
            OrderStatus::Unassigned
        );
    }

    #[test]
    fn lab_reservation_is_rolled_back_when_phlebotomist_is_full() {
        let mut state = state();
        state
            .assign(&ids(&["ORD-1", "ORD-2", "ORD-3"]), &lab_id(), &phl_id())
            .expect("within capacity");

        let mut more = OrderStore::new();
        for id in ["ORD-4", "ORD-5", "ORD-6"] {
            more.insert(Order::new(
                OrderId(id.to_string()),
                "Patient",
                "Lipid Panel",
                "Downtown Clinic",
                Priority::Medium,
                Utc::now(),
                None,
            ))
            .expect("insert");
        }
        for order in more.orders().cloned().collect::<Vec<_>>() {
            state.store.insert(order).expect("insert");
        }

        let err = state
            .assign(&ids(&["ORD-4", "ORD-5", "ORD-6"]), &lab_id(), &phl_id())
            .expect_err("only two phlebotomist slots remain");
        assert!(matches!(
            err,
            DispatchError::Registry(RegistryError::CapacityExceeded { .. })
        ));
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 35);
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            3
        );
    }

    #[test]
    fn one_unassignable_order_aborts_and_rolls_back_the_batch() {
        let mut state = state();
        state
            .assign(&ids(&["ORD-3"]), &lab_id(), &phl_id())
            .expect("assign single");
        state
            .set_status(&OrderId("ORD-3".to_string()), OrderStatus::InProgress)
            .expect("start processing");
        state
            .set_status(&OrderId("ORD-3".to_string()), OrderStatus::Completed)
            .expect("complete");

        let before_lab = state.registry.lab(&lab_id()).expect("lab").current_load;
        let before_phl = state
            .registry
            .phlebotomist(&phl_id())
            .expect("phl")
            .current_assignments;

        let err = state
            .assign(&ids(&["ORD-1", "ORD-3"]), &lab_id(), &phl_id())
            .expect_err("completed order cannot be reassigned");
        match err {
            DispatchError::PartialOrderFailure { failed_id, .. } => {
                assert_eq!(failed_id, "ORD-3");
            }
            other => panic!("expected partial order failure, got {other:?}"),
        }

        assert_eq!(
            state
                .store
                .get(&OrderId("ORD-1".to_string()))
                .expect("order")
                .status,
            OrderStatus::Unassigned
        );
        assert!(state
            .store
            .get(&OrderId("ORD-1".to_string()))
            .expect("order")
            .assigned_lab
            .is_none());
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, before_lab);
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            before_phl
        );
    }

    #[test]
    fn unknown_order_in_batch_rolls_back_earlier_members() {
        let mut state = state();
        let err = state
            .assign(&ids(&["ORD-1", "ORD-404"]), &lab_id(), &phl_id())
            .expect_err("unknown order");
        assert_eq!(err, DispatchError::UnknownOrder("ORD-404".to_string()));
        assert_eq!(
            state
                .store
                .get(&OrderId("ORD-1".to_string()))
                .expect("order")
                .status,
            OrderStatus::Unassigned
        );
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 32);
    }

    #[test]
    fn unassign_is_idempotent() {
        let mut state = state();
        state
            .assign(&ids(&["ORD-1", "ORD-2"]), &lab_id(), &phl_id())
            .expect("assign");

        state.unassign(&ids(&["ORD-1", "ORD-2"])).expect("first unassign");
        let after_first: Vec<Order> = state.store.orders().cloned().collect();
        let lab_after_first = state.registry.lab(&lab_id()).expect("lab").current_load;

        state.unassign(&ids(&["ORD-1", "ORD-2"])).expect("second unassign");
        let after_second: Vec<Order> = state.store.orders().cloned().collect();

        assert_eq!(after_first, after_second);
        assert_eq!(lab_after_first, 32);
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            0
        );
    }

    #[test]
    fn delayed_orders_release_the_phlebotomist_slot_until_resumed() {
        let mut state = state();
        state
            .assign(&ids(&["ORD-1"]), &lab_id(), &phl_id())
            .expect("assign");
        state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::Delayed)
            .expect("delay");

        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            0
        );
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 33);

        state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::InProgress)
            .expect("resume");
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            1
        );
    }

    #[test]
    fn completing_an_order_releases_both_counters() {
        let mut state = state();
        state
            .assign(&ids(&["ORD-1"]), &lab_id(), &phl_id())
            .expect("assign");
        state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::InProgress)
            .expect("start");
        state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::Completed)
            .expect("complete");

        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            0
        );
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 32);

        let order = state
            .store
            .get(&OrderId("ORD-1".to_string()))
            .expect("order")
            .clone();
        assert!(order.is_bound(), "completed orders keep bindings for audit");
    }

    #[test]
    fn cancelling_retains_bindings_but_frees_capacity() {
        let mut state = state();
        state
            .assign(&ids(&["ORD-1"]), &lab_id(), &phl_id())
            .expect("assign");
        state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::Cancelled)
            .expect("cancel");

        let order = state
            .store
            .get(&OrderId("ORD-1".to_string()))
            .expect("order")
            .clone();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.is_bound());
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 32);
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            0
        );
    }

    #[test]
    fn assignments_cannot_be_minted_through_set_status() {
        let mut state = state();
        let err = state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::Assigned)
            .expect_err("assignment requires a lab and phlebotomist selection");
        assert!(matches!(err, DispatchError::Transition(_)));

        let order = state
            .store
            .get(&OrderId("ORD-1".to_string()))
            .expect("order")
            .clone();
        assert_eq!(order.status, OrderStatus::Unassigned);
        assert!(order.assigned_phlebotomist.is_none());
        assert!(order.assigned_lab.is_none());
        assert_eq!(
            state.registry.phlebotomist(&phl_id()).expect("phl").current_assignments,
            0
        );
        assert_eq!(state.registry.lab(&lab_id()).expect("lab").current_load, 32);
    }

    #[test]
    fn set_status_rejects_illegal_transitions_without_side_effects() {
        let mut state = state();
        let err = state
            .set_status(&OrderId("ORD-1".to_string()), OrderStatus::InProgress)
            .expect_err("unassigned orders cannot start");
        assert!(matches!(err, DispatchError::Transition(_)));
        assert_eq!(
            state
                .store
                .get(&OrderId("ORD-1".to_string()))
                .expect("order")
                .status,
            OrderStatus::Unassigned
        );
    }
}
