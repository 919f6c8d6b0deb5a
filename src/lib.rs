//! Payhook - synchronous payment-app webhooks
//!
//! This library dispatches payment-method tokenization events to the app that
//! owns the payment method, waits for the reply, and reconciles it into a
//! canonical response. Every dispatch is recorded before it is sent, and
//! successful tokenizations evict the app's cached stored payment methods.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod models;
pub mod payments;
pub mod webhooks;
