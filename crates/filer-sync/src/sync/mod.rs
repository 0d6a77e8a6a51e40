//! Keeping a view in sync: the event loop and the reconciliation pass it schedules.

pub mod engine;
pub mod reconciler;
