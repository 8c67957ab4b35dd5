//! Order intake boundary: hydrates the store from an exported worklist CSV.
//!
//! Order creation itself is an external collaborator's concern; this adapter
//! only translates its export format into Unassigned orders.

mod parser;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::dispatch::domain::{Order, OrderId, Priority};

#[derive(Debug, thiserror::Error)]
pub enum OrderImportError {
    #[error("failed to read worklist export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid worklist CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("worklist row {row} is missing an order id")]
    MissingOrderId { row: usize },
    #[error("order '{order_id}' has unrecognized priority '{value}'")]
    InvalidPriority { order_id: String, value: String },
}

pub struct OrderImporter;

impl OrderImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, now)
    }

    /// Parses a worklist export into Unassigned orders. Rows with a
    /// timestamp omitted fall back to the import time; duplicate order ids
    /// keep the first row seen.
    pub fn from_reader<R: Read>(
        reader: R,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderImportError> {
        let mut orders = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, record) in parser::parse_records(reader)?.into_iter().enumerate() {
            if record.order_id.is_empty() {
                return Err(OrderImportError::MissingOrderId { row: index + 1 });
            }
            if !seen.insert(record.order_id.clone()) {
                continue;
            }

            let priority = Priority::parse_param(&record.priority).ok_or_else(|| {
                OrderImportError::InvalidPriority {
                    order_id: record.order_id.clone(),
                    value: record.priority.clone(),
                }
            })?;

            let received_at = record
                .received_at
                .map(|naive| naive.and_utc())
                .unwrap_or(now);
            let due_at = record.due_at.map(|naive| naive.and_utc());

            let mut order = Order::new(
                OrderId(record.order_id),
                record.patient,
                record.test,
                record.location,
                priority,
                received_at,
                due_at,
            );
            order.processing_time = record.processing_time;
            orders.push(order);
        }

        Ok(orders)
    }
}
