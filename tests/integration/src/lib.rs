//! Integration tests for svc-monitor.
//!
//! Each module drives a [`ConfigManager`](svc_monitor::cache::ConfigManager)
//! through the in-memory config server and recording agent:
//!
//! - `scenario_tests` - end-to-end load-balancer flows
//! - `property_tests` - link bookkeeping properties across notification
//!   sequences
//! - `failure_tests` - read, parse, and agent failures
//! - `load_tests` - large graphs and concurrent notification sources
//!
//! Run with: `cargo test --package svcmon-integration-tests`

#[cfg(test)]
mod support;

#[cfg(test)]
mod failure_tests;
#[cfg(test)]
mod load_tests;
#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod scenario_tests;
