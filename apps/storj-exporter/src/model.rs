//! Payloads of the storage node's local dashboard API (`/api/dashboard`,
//! `/api/satellite/{id}`). Only the fields the exporter publishes are
//! decoded; anything else in the upstream JSON is ignored.

use crate::error::{CollectError, CollectResult};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(rename = "nodeID")]
    pub node_id: JsonValue,
    pub wallet: JsonValue,
    #[serde(rename = "lastPinged")]
    pub last_pinged: JsonValue,
    #[serde(rename = "lastPingFromID")]
    pub last_ping_from_id: JsonValue,
    #[serde(rename = "lastPingFromAddress")]
    pub last_ping_from_address: JsonValue,
    #[serde(rename = "upToDate")]
    pub up_to_date: JsonValue,
    #[serde(rename = "diskSpace")]
    pub disk_space: Usage,
    pub bandwidth: Usage,
    pub satellites: Vec<SatelliteRef>,
}

impl DashboardSnapshot {
    /// Node-level metadata published as info metrics, keyed by upstream field name.
    pub fn info_fields(&self) -> [(&'static str, &JsonValue); 6] {
        [
            ("nodeID", &self.node_id),
            ("wallet", &self.wallet),
            ("lastPinged", &self.last_pinged),
            ("lastPingFromID", &self.last_ping_from_id),
            ("lastPingFromAddress", &self.last_ping_from_address),
            ("upToDate", &self.up_to_date),
        ]
    }

    /// Satellite ids in upstream order. Duplicates are kept.
    pub fn satellite_ids(&self) -> Vec<String> {
        self.satellites.iter().map(|sat| sat.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub used: f64,
    pub available: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SatelliteRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteDetail {
    pub audit: Map<String, JsonValue>,
    pub uptime: Map<String, JsonValue>,
    pub storage_summary: f64,
    pub bandwidth_summary: f64,
    pub bandwidth_daily: Vec<DailyBandwidth>,
    pub storage_daily: Vec<DailyStorage>,
}

impl SatelliteDetail {
    /// Bandwidth record for the current day.
    ///
    /// Upstream orders `bandwidthDaily` chronologically, so the current day
    /// is the last record. An empty sequence has no current day.
    pub fn current_bandwidth_day(&self, satellite: &str) -> CollectResult<&DailyBandwidth> {
        self.bandwidth_daily.last().ok_or_else(|| {
            CollectError::MalformedUpstreamData(format!(
                "satellite {satellite}: bandwidthDaily is empty"
            ))
        })
    }

    /// Storage record for the current day, same ordering contract as
    /// [`SatelliteDetail::current_bandwidth_day`].
    pub fn current_storage_day(&self, satellite: &str) -> CollectResult<&DailyStorage> {
        self.storage_daily.last().ok_or_else(|| {
            CollectError::MalformedUpstreamData(format!(
                "satellite {satellite}: storageDaily is empty"
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DailyBandwidth {
    pub egress: Egress,
    pub ingress: Ingress,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Egress {
    pub repair: f64,
    pub audit: f64,
    pub usage: f64,
}

impl Egress {
    pub fn by_type(&self) -> [(&'static str, f64); 3] {
        [
            ("repair", self.repair),
            ("audit", self.audit),
            ("usage", self.usage),
        ]
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Ingress {
    pub repair: f64,
    pub usage: f64,
}

impl Ingress {
    pub fn by_type(&self) -> [(&'static str, f64); 2] {
        [("repair", self.repair), ("usage", self.usage)]
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStorage {
    pub at_rest_total: f64,
}

/// Numeric entries of an audit/uptime object. Non-numeric entries (names,
/// flags) are metadata, not samples.
pub fn numeric_entries(object: &Map<String, JsonValue>) -> Vec<(&str, f64)> {
    object
        .iter()
        .filter_map(|(key, value)| value.as_f64().map(|v| (key.as_str(), v)))
        .collect()
}

/// Text of an info field as published in the metric label.
pub fn info_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
