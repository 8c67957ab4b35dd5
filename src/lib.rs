//! Order dispatch and capacity-constrained assignment engine for a
//! diagnostic-lab booking platform.
//!
//! The hub's Assignment, Orders, and Track views drive this engine: it
//! matches pending test orders to phlebotomists and labs under capacity
//! limits, moves each order through its status lifecycle, and derives the
//! live progress and turnaround figures those views render.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod telemetry;
