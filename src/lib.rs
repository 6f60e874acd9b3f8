//! Billing Webhooks - Payment provider webhook ingestion
//!
//! This crate receives signed billing events, verifies and deduplicates them,
//! drives the subscription and payment lifecycles, and pushes the resulting
//! entitlement changes to the application backend.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
