use crate::collector::Collector;
use crate::error::CollectError;
use crate::exposition;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct HttpState {
    pub collector: Arc<Collector>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_metrics(State(state): State<HttpState>) -> Result<impl IntoResponse, CollectError> {
    let families = state.collector.collect().await?;
    Ok((
        [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
        exposition::render(&families),
    ))
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}
