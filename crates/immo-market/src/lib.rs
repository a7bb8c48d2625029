//! Subscription limits, push notifications and contract drafting for the
//! real-estate marketplace backend.

pub mod config;
pub mod contracts;
pub mod error;
pub mod notifications;
pub mod subscriptions;
pub mod telemetry;
