//! Prometheus exporter for a Storj storage node.
//!
//! Every scrape of `/metrics` fetches `/api/dashboard` and then
//! `/api/satellite/{id}` for each satellite the dashboard lists, and
//! republishes the combined snapshot as gauge and info metrics.

pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;
pub mod http;
pub mod model;
pub mod upstream;
