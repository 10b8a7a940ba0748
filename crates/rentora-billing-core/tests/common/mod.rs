//! Common test utilities for rentora-billing-core integration tests

pub mod fixtures;
pub mod test_doubles;

#[allow(unused_imports)]
pub use fixtures::{at, plan_row, pro_limits, user_row, Harness};
#[allow(unused_imports)]
pub use test_doubles::{FailingEventSink, FailingUsageLogs, RecordingEventSink, StallingStore};
