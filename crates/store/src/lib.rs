//! Tenant registry and order/reservation persistence.
//!
//! Both stores are JSON-file backed under the configured state path:
//! `tenants.json` holds the per-tenant profiles (including the cached menu
//! text written by catalog sync), and orders/reservations append to JSONL
//! files. Inserts are idempotent at the row level — every row carries a
//! freshly minted id, and callers treat duplicate submissions as distinct
//! rows reconciled downstream by the POS job.

pub mod orders;
pub mod profile;

pub use orders::{NewOrder, NewReservation, OrderItem, OrderStore};
pub use profile::{StoreProfile, TenantRegistry};
