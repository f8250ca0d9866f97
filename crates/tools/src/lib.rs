//! Tool dispatcher for voice sessions.
//!
//! Maps named tool invocations emitted by the LLM to concrete operations:
//! menu retrieval from the cached profile snapshot, order and reservation
//! inserts, and escalation signaling.
//!
//! The dispatcher never returns an error. Every outcome — including store
//! failures and malformed arguments — becomes a structured JSON payload
//! the model can voice to the caller, so the session's release semantics
//! are never bypassed by an unexpected propagation.

pub mod defs;

use std::sync::Arc;

use serde_json::{json, Value};

use vg_store::{NewOrder, NewReservation, OrderItem, OrderStore};

pub use defs::definitions;

/// Per-session dispatcher, bound to the tenant snapshot taken at connect.
pub struct ToolDispatcher {
    orders: Arc<OrderStore>,
    tenant_id: String,
    call_id: String,
    /// Menu text captured from the profile at session open; empty means
    /// the catalog has never synced.
    menu_cache: String,
}

impl ToolDispatcher {
    pub fn new(
        orders: Arc<OrderStore>,
        tenant_id: impl Into<String>,
        call_id: impl Into<String>,
        menu_cache: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            tenant_id: tenant_id.into(),
            call_id: call_id.into(),
            menu_cache: menu_cache.into(),
        }
    }

    /// Execute a named tool and return its result payload.
    pub async fn dispatch(&self, name: &str, args: &Value) -> Value {
        tracing::debug!(tool = name, call_id = %self.call_id, "dispatching tool");
        match name {
            "get_menu" => self.get_menu(),
            "place_order" => self.place_order(args),
            "make_reservation" => self.make_reservation(args),
            "check_order_status" => json!({
                "status": "under_construction",
                "message": "Order status lookup isn't available yet. Offer to \
                            transfer the caller to a staff member instead."
            }),
            "cancel_or_modify" => json!({
                "status": "under_construction",
                "message": "Changing an existing order isn't available yet. Offer \
                            to transfer the caller to a staff member instead."
            }),
            "transfer_to_human" => {
                tracing::info!(
                    tenant_id = %self.tenant_id,
                    call_id = %self.call_id,
                    reason = args.get("reason").and_then(serde_json::Value::as_str).unwrap_or(""),
                    "escalation requested"
                );
                json!({
                    "status": "transferring",
                    "message": "Let the caller know you're connecting them with a \
                                staff member now."
                })
            }
            other => {
                tracing::warn!(tool = other, "unknown tool invoked by model");
                json!({
                    "success": false,
                    "error": "That action isn't available. Apologize and offer to help \
                              with the menu, an order, or a reservation."
                })
            }
        }
    }

    fn get_menu(&self) -> Value {
        if self.menu_cache.trim().is_empty() {
            json!({ "menu": "unavailable" })
        } else {
            json!({ "menu": self.menu_cache })
        }
    }

    fn place_order(&self, args: &Value) -> Value {
        let order = match parse_order(args, &self.tenant_id, &self.call_id) {
            Ok(o) => o,
            Err(msg) => return order_failure(msg),
        };

        match self.orders.insert_order(&order) {
            Ok(order_id) => json!({
                "success": true,
                "order_id": order_id,
                "message": "Order placed. Confirm the items and total back to the \
                            caller and tell them when it will be ready."
            }),
            Err(e) => {
                tracing::error!(error = %e, tenant_id = %self.tenant_id, "order insert failed");
                order_failure("We were unable to place your order right now.")
            }
        }
    }

    fn make_reservation(&self, args: &Value) -> Value {
        let reservation = match parse_reservation(args, &self.tenant_id, &self.call_id) {
            Ok(r) => r,
            Err(msg) => return reservation_failure(msg),
        };

        match self.orders.insert_reservation(&reservation) {
            Ok(reservation_id) => json!({
                "success": true,
                "reservation_id": reservation_id,
                "message": "Reservation booked. Confirm the time and party size back \
                            to the caller."
            }),
            Err(e) => {
                tracing::error!(error = %e, tenant_id = %self.tenant_id, "reservation insert failed");
                reservation_failure("We were unable to book that reservation right now.")
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Argument parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn req_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_order(args: &Value, tenant_id: &str, call_id: &str) -> Result<NewOrder, &'static str> {
    let customer_name =
        req_str(args, "customer_name").ok_or("I still need a name for the order.")?;
    let customer_phone =
        req_str(args, "customer_phone").ok_or("I still need a phone number for the order.")?;

    let items: Vec<OrderItem> = args
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.trim();
                    if name.is_empty() {
                        return None;
                    }
                    Some(OrderItem {
                        name: name.to_string(),
                        quantity: item
                            .get("quantity")
                            .and_then(Value::as_u64)
                            .unwrap_or(1)
                            .max(1) as u32,
                        notes: item
                            .get("notes")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if items.is_empty() {
        return Err("The order has no items yet.");
    }

    Ok(NewOrder {
        tenant_id: tenant_id.to_string(),
        call_id: call_id.to_string(),
        customer_name: customer_name.to_string(),
        customer_phone: customer_phone.to_string(),
        items,
        total_text: args
            .get("total")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn parse_reservation(
    args: &Value,
    tenant_id: &str,
    call_id: &str,
) -> Result<NewReservation, &'static str> {
    let customer_name =
        req_str(args, "customer_name").ok_or("I still need a name for the reservation.")?;
    let customer_phone =
        req_str(args, "customer_phone").ok_or("I still need a phone number for the reservation.")?;
    let time_text = req_str(args, "time").ok_or("I still need a time for the reservation.")?;
    let party_size = args
        .get("party_size")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .ok_or("I still need the party size for the reservation.")?;

    Ok(NewReservation {
        tenant_id: tenant_id.to_string(),
        call_id: call_id.to_string(),
        customer_name: customer_name.to_string(),
        customer_phone: customer_phone.to_string(),
        party_size: party_size as u32,
        time_text: time_text.to_string(),
        notes: args.get("notes").and_then(Value::as_str).map(str::to_string),
    })
}

fn order_failure(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

fn reservation_failure(message: &str) -> Value {
    json!({ "success": false, "error": message })
}
