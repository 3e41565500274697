use crate::error::{CollectError, CollectResult};
use crate::model::{DashboardSnapshot, SatelliteDetail};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

/// Client for the storage node's local dashboard API. Holds no per-scrape
/// state; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    http: Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn fetch_dashboard(&self) -> CollectResult<DashboardSnapshot> {
        let url = self.endpoint(&["api", "dashboard"]);
        let response = self.get(&url).await?;
        let body = read_json(&url, ensure_success(&url, response)?).await?;
        decode_data(&url, body, "dashboard")
    }

    pub async fn fetch_satellite(&self, id: &str) -> CollectResult<SatelliteDetail> {
        let url = self.endpoint(&["api", "satellite", id]);
        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CollectError::SatelliteNotFound { id: id.to_string() });
        }
        let body = read_json(&url, ensure_success(&url, response)?).await?;
        decode_data(&url, body, &format!("satellite {id}"))
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: &Url) -> CollectResult<Response> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| CollectError::UpstreamUnavailable {
                url: url.to_string(),
                source,
            })?;
        tracing::debug!(url = %url, status = %response.status(), "storage node API response");
        Ok(response)
    }
}

fn ensure_success(url: &Url, response: Response) -> CollectResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(CollectError::UpstreamBadResponse {
        url: url.to_string(),
        reason: format!("HTTP {status}"),
    })
}

async fn read_json(url: &Url, response: Response) -> CollectResult<JsonValue> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| CollectError::UpstreamUnavailable {
            url: url.to_string(),
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|err| CollectError::UpstreamBadResponse {
        url: url.to_string(),
        reason: format!("invalid JSON: {err}"),
    })
}

/// Unwraps the `{"data": ...}` envelope and decodes the payload.
fn decode_data<T: DeserializeOwned>(url: &Url, body: JsonValue, what: &str) -> CollectResult<T> {
    let data = match body {
        JsonValue::Object(mut envelope) => envelope.remove("data"),
        _ => None,
    };
    let data = match data {
        Some(JsonValue::Null) | None => {
            return Err(CollectError::UpstreamBadResponse {
                url: url.to_string(),
                reason: "response has no data field".to_string(),
            });
        }
        Some(data) => data,
    };
    serde_json::from_value(data)
        .map_err(|err| CollectError::MalformedUpstreamData(format!("{what}: {err}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixture storage node API served by axum on an ephemeral port.

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use serde_json::{json, Value as JsonValue};
    use std::collections::HashMap;
    use std::sync::Arc;
    use url::Url;

    #[derive(Clone, Debug)]
    pub enum Reply {
        Json(JsonValue),
        Raw(StatusCode, &'static str),
    }

    impl IntoResponse for Reply {
        fn into_response(self) -> Response {
            match self {
                Reply::Json(body) => axum::Json(body).into_response(),
                Reply::Raw(status, body) => (status, body).into_response(),
            }
        }
    }

    #[derive(Clone, Debug)]
    pub struct FakeNode {
        pub dashboard: Reply,
        pub satellites: HashMap<String, Reply>,
    }

    impl FakeNode {
        pub fn new(dashboard: JsonValue) -> Self {
            Self {
                dashboard: Reply::Json(json!({ "data": dashboard })),
                satellites: HashMap::new(),
            }
        }

        pub fn satellite(mut self, id: &str, detail: JsonValue) -> Self {
            self.satellites
                .insert(id.to_string(), Reply::Json(json!({ "data": detail })));
            self
        }

        pub fn satellite_reply(mut self, id: &str, reply: Reply) -> Self {
            self.satellites.insert(id.to_string(), reply);
            self
        }
    }

    async fn dashboard(State(node): State<Arc<FakeNode>>) -> Reply {
        node.dashboard.clone()
    }

    async fn satellite(State(node): State<Arc<FakeNode>>, Path(id): Path<String>) -> Reply {
        node.satellites
            .get(&id)
            .cloned()
            .unwrap_or(Reply::Raw(StatusCode::NOT_FOUND, "{\"error\":\"satellite not found\"}"))
    }

    /// Serves `node` in the background and returns its base URL.
    pub async fn serve(node: FakeNode) -> Url {
        let app = Router::new()
            .route("/api/dashboard", get(dashboard))
            .route("/api/satellite/{id}", get(satellite))
            .with_state(Arc::new(node));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    /// A base URL nothing is listening on.
    pub async fn closed_port() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    pub fn dashboard_fixture(satellites: &[&str]) -> JsonValue {
        json!({
            "nodeID": "12node",
            "wallet": "0xwallet",
            "lastPinged": "2024-05-01T10:00:00Z",
            "lastPingFromID": "sat1",
            "lastPingFromAddress": "sat1.example:7777",
            "upToDate": true,
            "diskSpace": {"used": 100, "available": 900},
            "bandwidth": {"used": 10, "available": 90},
            "satellites": satellites.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        })
    }

    pub fn satellite_fixture() -> JsonValue {
        json!({
            "audit": {"auditScore": 1.0},
            "uptime": {"uptimeScore": 0.99},
            "storageSummary": 5000,
            "bandwidthSummary": 15,
            "bandwidthDaily": [
                {"egress": {"repair": 1, "audit": 2, "usage": 3}, "ingress": {"repair": 4, "usage": 5}}
            ],
            "storageDaily": [{"atRestTotal": 1000}],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let client = UpstreamClient::new(Url::parse("http://127.0.0.1:14002/").unwrap());
        assert_eq!(
            client.endpoint(&["api", "dashboard"]).as_str(),
            "http://127.0.0.1:14002/api/dashboard"
        );
        assert_eq!(
            client.endpoint(&["api", "satellite", "a/b c"]).as_str(),
            "http://127.0.0.1:14002/api/satellite/a%2Fb%20c"
        );
    }

    #[tokio::test]
    async fn fetch_dashboard_unwraps_data() {
        let base = serve(FakeNode::new(dashboard_fixture(&["sat1", "sat2"]))).await;
        let dashboard = UpstreamClient::new(base).fetch_dashboard().await.unwrap();
        assert_eq!(dashboard.satellite_ids(), vec!["sat1", "sat2"]);
        assert_eq!(dashboard.disk_space.used, 100.0);
    }

    #[tokio::test]
    async fn fetch_satellite_unwraps_data() {
        let node = FakeNode::new(dashboard_fixture(&["sat1"])).satellite("sat1", satellite_fixture());
        let base = serve(node).await;
        let detail = UpstreamClient::new(base).fetch_satellite("sat1").await.unwrap();
        assert_eq!(detail.storage_summary, 5000.0);
        assert_eq!(detail.bandwidth_daily.len(), 1);
    }

    #[tokio::test]
    async fn connection_refused_is_unavailable() {
        let client = UpstreamClient::new(closed_port().await);
        let err = client.fetch_dashboard().await.unwrap_err();
        assert!(matches!(err, CollectError::UpstreamUnavailable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn invalid_json_is_bad_response() {
        let mut node = FakeNode::new(json!({}));
        node.dashboard = Reply::Raw(StatusCode::OK, "<html>not json</html>");
        let client = UpstreamClient::new(serve(node).await);
        let err = client.fetch_dashboard().await.unwrap_err();
        assert!(matches!(err, CollectError::UpstreamBadResponse { ref reason, .. } if reason.contains("invalid JSON")));
    }

    #[tokio::test]
    async fn missing_envelope_is_bad_response() {
        let mut node = FakeNode::new(json!({}));
        node.dashboard = Reply::Json(json!({"error": "locked"}));
        let client = UpstreamClient::new(serve(node).await);
        let err = client.fetch_dashboard().await.unwrap_err();
        assert!(matches!(err, CollectError::UpstreamBadResponse { ref reason, .. } if reason.contains("data")));
    }

    #[tokio::test]
    async fn http_error_is_bad_response() {
        let mut node = FakeNode::new(json!({}));
        node.dashboard = Reply::Raw(StatusCode::SERVICE_UNAVAILABLE, "busy");
        let client = UpstreamClient::new(serve(node).await);
        let err = client.fetch_dashboard().await.unwrap_err();
        assert!(matches!(err, CollectError::UpstreamBadResponse { ref reason, .. } if reason.contains("503")));
    }

    #[tokio::test]
    async fn incomplete_payload_is_malformed() {
        let node = FakeNode::new(json!({"nodeID": "12node"}));
        let client = UpstreamClient::new(serve(node).await);
        let err = client.fetch_dashboard().await.unwrap_err();
        assert!(matches!(err, CollectError::MalformedUpstreamData(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unknown_satellite_is_not_found() {
        let node = FakeNode::new(dashboard_fixture(&["sat1"]));
        let client = UpstreamClient::new(serve(node).await);
        let err = client.fetch_satellite("ghost").await.unwrap_err();
        assert!(matches!(err, CollectError::SatelliteNotFound { ref id } if id == "ghost"));
    }

    #[tokio::test]
    async fn satellite_server_error_is_bad_response() {
        let node = FakeNode::new(dashboard_fixture(&["sat1"]))
            .satellite_reply("sat1", Reply::Raw(StatusCode::INTERNAL_SERVER_ERROR, "boom"));
        let client = UpstreamClient::new(serve(node).await);
        let err = client.fetch_satellite("sat1").await.unwrap_err();
        assert!(matches!(err, CollectError::UpstreamBadResponse { .. }));
    }
}
