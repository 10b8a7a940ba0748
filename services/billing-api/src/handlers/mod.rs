//! REST API handlers

pub mod health;
pub mod plans;
pub mod shared;
pub mod subscription;
pub mod usage;

pub use health::*;
pub use plans::*;
pub use subscription::*;
pub use usage::*;
