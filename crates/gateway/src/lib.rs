//! voicegate — multi-tenant voice-ordering gateway.
//!
//! Sits between the telephony/ASR transport and the LLM: per inbound call
//! it runs a bidirectional real-time session (the `voice` module), accepts
//! fire-and-forget webhooks from the transport and the POS provider, and
//! serves thin REST endpoints for OAuth bootstrap and catalog sync.

pub mod api;
pub mod cli;
pub mod jobs;
pub mod state;
pub mod voice;
