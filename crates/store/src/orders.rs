//! Order and reservation persistence.
//!
//! Rows append to `orders.jsonl` / `reservations.jsonl` under the state
//! path, one JSON object per line. The tool dispatcher is the only caller;
//! it converts any error returned here into a voice-safe failure payload.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use vg_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An order as handed over by the tool dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub tenant_id: String,
    pub call_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub tenant_id: String,
    pub call_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub party_size: u32,
    /// Spoken time as transcribed ("tomorrow at 7pm").
    pub time_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderRow<'a> {
    order_id: &'a str,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    order: &'a NewOrder,
}

#[derive(Debug, Serialize)]
struct ReservationRow<'a> {
    reservation_id: &'a str,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    reservation: &'a NewReservation,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Append-only order/reservation store.
pub struct OrderStore {
    orders_path: PathBuf,
    reservations_path: PathBuf,
    // One writer at a time per file keeps lines whole.
    write_lock: Mutex<()>,
}

impl OrderStore {
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        Ok(Self {
            orders_path: state_path.join("orders.jsonl"),
            reservations_path: state_path.join("reservations.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    /// Insert an order row; returns the new order id.
    pub fn insert_order(&self, order: &NewOrder) -> Result<String> {
        let order_id = format!("ord_{}", uuid::Uuid::new_v4());
        let row = OrderRow {
            order_id: &order_id,
            created_at: Utc::now(),
            order,
        };
        self.append_line(&self.orders_path, &serde_json::to_string(&row)?)?;
        tracing::info!(
            order_id = %order_id,
            tenant_id = %order.tenant_id,
            items = order.items.len(),
            "order recorded"
        );
        Ok(order_id)
    }

    /// Insert a reservation row; returns the new reservation id.
    pub fn insert_reservation(&self, reservation: &NewReservation) -> Result<String> {
        let reservation_id = format!("res_{}", uuid::Uuid::new_v4());
        let row = ReservationRow {
            reservation_id: &reservation_id,
            created_at: Utc::now(),
            reservation,
        };
        self.append_line(&self.reservations_path, &serde_json::to_string(&row)?)?;
        tracing::info!(
            reservation_id = %reservation_id,
            tenant_id = %reservation.tenant_id,
            party_size = reservation.party_size,
            "reservation recorded"
        );
        Ok(reservation_id)
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(Error::Io)?;
        writeln!(file, "{line}").map_err(Error::Io)
    }
}
