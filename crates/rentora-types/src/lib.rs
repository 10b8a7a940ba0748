//! Rentora Types - Shared domain types
//!
//! This crate contains domain types used across Rentora services:
//! - Identifiers
//! - Subscription plans, billing cycles and quotas
//! - Subscriptions and lifecycle events
//! - Gated features, usage-gate decisions and usage audit entries

pub mod entitlement;
pub mod error;
pub mod plan;
pub mod subscription;
pub mod usage;
pub mod user;

pub use entitlement::*;
pub use error::*;
pub use plan::*;
pub use subscription::*;
pub use usage::*;
pub use user::*;
