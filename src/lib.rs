//! usageflow - product analytics aggregation for the internal dashboard
//!
//! Raw events, chat sessions and store reference rows are read from the
//! shared datastore ([`store`]), turned into derived metrics by the pure
//! [`engine`] according to the [`catalog`], and published as a JSON report
//! by the [`dashboard`] refresh loop.

pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod sqlite_pragma;
pub mod store;
