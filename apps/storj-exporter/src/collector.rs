use crate::config::Config;
use crate::error::{CollectError, CollectResult};
use crate::exposition::{MetricFamily, Sample};
use crate::model::{info_text, numeric_entries, DashboardSnapshot, SatelliteDetail};
use crate::upstream::UpstreamClient;
use futures::future::try_join_all;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;

const SATELLITE: &str = "satellite";
const TYPE: &str = "type";

/// Runs one collection cycle per call. Every call starts from scratch.
#[derive(Clone, Debug)]
pub struct Collector {
    upstream: UpstreamClient,
}

impl Collector {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_client(UpstreamClient::new(
            config.upstream_base_url()?,
        )))
    }

    pub fn with_client(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    pub async fn collect(&self) -> CollectResult<Vec<MetricFamily>> {
        let dashboard = self.upstream.fetch_dashboard().await?;
        let ids = dashboard.satellite_ids();

        // try_join_all keeps input order and fails on the first error.
        let details = try_join_all(ids.iter().map(|id| self.upstream.fetch_satellite(id))).await?;
        let satellites: Vec<(String, SatelliteDetail)> = ids.into_iter().zip(details).collect();

        let families = build_families(&dashboard, &satellites)?;
        tracing::debug!(
            satellites = satellites.len(),
            families = families.len(),
            "scrape collected"
        );
        Ok(families)
    }
}

/// Turns one dashboard snapshot and its satellite details into metric
/// families. Either every family is produced or an error is returned.
pub fn build_families(
    dashboard: &DashboardSnapshot,
    satellites: &[(String, SatelliteDetail)],
) -> CollectResult<Vec<MetricFamily>> {
    let mut families = Vec::new();

    for (key, value) in dashboard.info_fields() {
        let text = info_text(value);
        families.push(MetricFamily::info(
            format!("storj_{key}"),
            format!("Storj {key}"),
            [(key, text.as_str())],
        ));
    }

    for (group, usage) in [
        ("diskSpace", dashboard.disk_space),
        ("bandwidth", dashboard.bandwidth),
    ] {
        for (field, value) in [("used", usage.used), ("available", usage.available)] {
            families.push(
                MetricFamily::gauge(
                    format!("storj_{group}_{field}"),
                    format!("Storj {group} {field}"),
                )
                .with_sample(Sample::unlabeled(value)),
            );
        }
    }

    families.extend(score_families(satellites, "audit", |detail| &detail.audit)?);
    families.extend(score_families(satellites, "uptime", |detail| &detail.uptime)?);

    let mut storage_summary =
        MetricFamily::gauge("storj_sat_storageSummary", "Storj satellite storageSummary");
    let mut bandwidth_summary =
        MetricFamily::gauge("storj_sat_bandwidthSummary", "Storj satellite bandwidthSummary");
    for (id, detail) in satellites {
        storage_summary.push(Sample::labeled([(SATELLITE, id.as_str())], detail.storage_summary));
        bandwidth_summary.push(Sample::labeled(
            [(SATELLITE, id.as_str())],
            detail.bandwidth_summary,
        ));
    }
    families.push(storage_summary);
    families.push(bandwidth_summary);

    families.extend(bandwidth_families(satellites)?);
    families.extend(storage_families(satellites)?);

    Ok(families)
}

/// One family per numeric sub-key of the audit/uptime object.
///
/// The first satellite defines the sub-key set; every other satellite must
/// report exactly the same numeric sub-keys.
fn score_families<F>(
    satellites: &[(String, SatelliteDetail)],
    group: &str,
    select: F,
) -> CollectResult<Vec<MetricFamily>>
where
    F: Fn(&SatelliteDetail) -> &Map<String, JsonValue>,
{
    let Some((first_id, first)) = satellites.first() else {
        return Ok(Vec::new());
    };
    let schema: Vec<&str> = numeric_entries(select(first))
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    let expected: BTreeSet<&str> = schema.iter().copied().collect();

    let mut families: Vec<MetricFamily> = schema
        .iter()
        .map(|key| {
            MetricFamily::gauge(
                format!("storj_sat_{group}_{key}"),
                format!("Storj satellite {key}"),
            )
        })
        .collect();

    for (id, detail) in satellites {
        let entries = numeric_entries(select(detail));
        let actual: BTreeSet<&str> = entries.iter().map(|(key, _)| *key).collect();
        if actual != expected {
            return Err(CollectError::MalformedUpstreamData(format!(
                "satellite {id}: {group} keys {actual:?} differ from satellite {first_id} keys {expected:?}"
            )));
        }
        for (family, key) in families.iter_mut().zip(&schema) {
            if let Some((_, value)) = entries.iter().find(|(k, _)| k == key) {
                family.push(Sample::labeled([(SATELLITE, id.as_str())], *value));
            }
        }
    }

    Ok(families)
}

fn bandwidth_families(satellites: &[(String, SatelliteDetail)]) -> CollectResult<Vec<MetricFamily>> {
    let mut month_egress = MetricFamily::gauge(
        "storj_sat_month_egress",
        "Storj satellite egress since current month start",
    );
    let mut month_ingress = MetricFamily::gauge(
        "storj_sat_month_ingress",
        "Storj satellite ingress since current month start",
    );
    let mut day_egress = MetricFamily::gauge(
        "storj_sat_day_egress",
        "Storj satellite egress since current day start",
    );
    let mut day_ingress = MetricFamily::gauge(
        "storj_sat_day_ingress",
        "Storj satellite ingress since current day start",
    );

    for (id, detail) in satellites {
        let id = id.as_str();
        let today = detail.current_bandwidth_day(id)?;

        for (idx, (kind, value)) in today.egress.by_type().into_iter().enumerate() {
            let total: f64 = detail
                .bandwidth_daily
                .iter()
                .map(|day| day.egress.by_type()[idx].1)
                .sum();
            month_egress.push(Sample::labeled([(SATELLITE, id), (TYPE, kind)], total));
            day_egress.push(Sample::labeled([(SATELLITE, id), (TYPE, kind)], value));
        }

        for (idx, (kind, value)) in today.ingress.by_type().into_iter().enumerate() {
            let total: f64 = detail
                .bandwidth_daily
                .iter()
                .map(|day| day.ingress.by_type()[idx].1)
                .sum();
            month_ingress.push(Sample::labeled([(SATELLITE, id), (TYPE, kind)], total));
            day_ingress.push(Sample::labeled([(SATELLITE, id), (TYPE, kind)], value));
        }
    }

    Ok(vec![month_egress, month_ingress, day_egress, day_ingress])
}

fn storage_families(satellites: &[(String, SatelliteDetail)]) -> CollectResult<Vec<MetricFamily>> {
    let mut month = MetricFamily::gauge(
        "storj_sat_month_storage",
        "Storj satellite data stored on disk since current month start",
    );
    let mut day = MetricFamily::gauge(
        "storj_sat_day_storage",
        "Storj satellite data stored on disk since current day start",
    );

    for (id, detail) in satellites {
        let today = detail.current_storage_day(id)?;
        let total: f64 = detail.storage_daily.iter().map(|d| d.at_rest_total).sum();
        month.push(Sample::labeled([(SATELLITE, id.as_str())], total));
        day.push(Sample::labeled([(SATELLITE, id.as_str())], today.at_rest_total));
    }

    Ok(vec![month, day])
}
