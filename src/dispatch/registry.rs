use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Lab, LabId, Phlebotomist, PhlebotomistId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Phlebotomist,
    Lab,
}

impl ResourceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Phlebotomist => "phlebotomist",
            Self::Lab => "lab",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown {kind} '{id}'")]
    UnknownResource { kind: ResourceKind, id: String },
    #[error("{kind} '{id}' is not accepting work")]
    ResourceUnavailable { kind: ResourceKind, id: String },
    #[error("{kind} '{id}' cannot take {requested} more order(s); {remaining} slot(s) remain")]
    CapacityExceeded {
        kind: ResourceKind,
        id: String,
        requested: u32,
        remaining: u32,
    },
}

/// Exclusive owner of the capacity counters for phlebotomists and labs.
///
/// Keyed maps are ordered so availability listings come back in a stable
/// order. The registry never touches order state.
#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    phlebotomists: BTreeMap<String, Phlebotomist>,
    labs: BTreeMap<String, Lab>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_phlebotomist(&mut self, phlebotomist: Phlebotomist) {
        self.phlebotomists
            .insert(phlebotomist.id.0.clone(), phlebotomist);
    }

    pub fn add_lab(&mut self, lab: Lab) {
        self.labs.insert(lab.id.0.clone(), lab);
    }

    pub fn phlebotomist(&self, id: &PhlebotomistId) -> Option<&Phlebotomist> {
        self.phlebotomists.get(id.0.as_str())
    }

    pub fn lab(&self, id: &LabId) -> Option<&Lab> {
        self.labs.get(id.0.as_str())
    }

    pub fn phlebotomists(&self) -> impl Iterator<Item = &Phlebotomist> {
        self.phlebotomists.values()
    }

    pub fn labs(&self) -> impl Iterator<Item = &Lab> {
        self.labs.values()
    }

    /// Phlebotomists accepting work with spare assignment slots.
    pub fn list_available_phlebotomists(&self) -> Vec<&Phlebotomist> {
        self.phlebotomists
            .values()
            .filter(|p| p.is_available() && p.has_capacity())
            .collect()
    }

    /// Operational labs with spare load slots.
    pub fn list_available_labs(&self) -> Vec<&Lab> {
        self.labs
            .values()
            .filter(|lab| lab.is_operational() && lab.has_capacity())
            .collect()
    }

    /// Increments a resource's load counter by `count`, refusing to pass its
    /// capacity ceiling or to book an unavailable resource.
    pub fn reserve(&mut self, kind: ResourceKind, id: &str, count: u32) -> Result<(), RegistryError> {
        match kind {
            ResourceKind::Phlebotomist => {
                let phlebotomist = self.phlebotomists.get_mut(id).ok_or_else(|| {
                    RegistryError::UnknownResource {
                        kind,
                        id: id.to_string(),
                    }
                })?;
                if !phlebotomist.is_available() {
                    return Err(RegistryError::ResourceUnavailable {
                        kind,
                        id: id.to_string(),
                    });
                }
                let remaining = phlebotomist.max_capacity - phlebotomist.current_assignments;
                if count > remaining {
                    return Err(RegistryError::CapacityExceeded {
                        kind,
                        id: id.to_string(),
                        requested: count,
                        remaining,
                    });
                }
                phlebotomist.current_assignments += count;
                Ok(())
            }
            ResourceKind::Lab => {
                let lab = self
                    .labs
                    .get_mut(id)
                    .ok_or_else(|| RegistryError::UnknownResource {
                        kind,
                        id: id.to_string(),
                    })?;
                if !lab.is_operational() {
                    return Err(RegistryError::ResourceUnavailable {
                        kind,
                        id: id.to_string(),
                    });
                }
                let remaining = lab.max_capacity - lab.current_load;
                if count > remaining {
                    return Err(RegistryError::CapacityExceeded {
                        kind,
                        id: id.to_string(),
                        requested: count,
                        remaining,
                    });
                }
                lab.current_load += count;
                Ok(())
            }
        }
    }

    /// Decrements a resource's load counter by `count`, floored at zero.
    pub fn release(&mut self, kind: ResourceKind, id: &str, count: u32) {
        match kind {
            ResourceKind::Phlebotomist => match self.phlebotomists.get_mut(id) {
                Some(phlebotomist) => {
                    phlebotomist.current_assignments =
                        phlebotomist.current_assignments.saturating_sub(count);
                }
                None => warn!(%kind, id, "release for unknown resource ignored"),
            },
            ResourceKind::Lab => match self.labs.get_mut(id) {
                Some(lab) => {
                    lab.current_load = lab.current_load.saturating_sub(count);
                }
                None => warn!(%kind, id, "release for unknown resource ignored"),
            },
        }
    }
}
