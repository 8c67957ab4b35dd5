pub mod domain;
pub mod engine;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod roster;
pub mod router;
pub mod service;
pub mod status;
pub mod store;

pub use domain::{
    Lab, LabId, LabStatus, Order, OrderId, OrderView, Phlebotomist, PhlebotomistId,
    PhlebotomistStatus, Priority,
};
pub use engine::{DispatchError, DispatchState};
pub use registry::{RegistryError, ResourceKind, ResourceRegistry};
pub use report::DispatchSummary;
pub use router::dispatch_router;
pub use service::DispatchService;
pub use status::{check_transition, OrderStatus, TransitionError};
pub use store::{OrderFilters, OrderStore, StoreError};
