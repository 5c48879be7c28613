//! Detection of JS5 cluster resets.
//!
//! A [`ResetMonitor`] keeps a connection open to a primary endpoint and pings it every probe interval. When the
//! primary stops answering, the redundant endpoints of its [`EndpointSet`] are asked to corroborate: if any of them is
//! still up the failure was local and is ignored, otherwise a reset is recorded, published through [`LastReset`], and
//! handed to the [`ResetStore`].

mod endpoints;
mod last_reset;
mod monitor;
mod store;

#[cfg(test)]
mod fake;

pub use endpoints::{EmptyEndpointSet, EndpointError, EndpointSet};
pub use js5watch_client as client;
pub use js5watch_proto::ResetRecord;
pub use last_reset::LastReset;
pub use monitor::{MonitorConfig, ResetMonitor, State};
pub use store::ResetStore;
