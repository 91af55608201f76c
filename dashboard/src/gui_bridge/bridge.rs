use crate::gui_bridge::model::{ViewKind, ViewRequest};
use crate::workflow::runner::Runner;
use co2core::telemetry::MetricsRecorder;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter, Rejection, Reply};

#[derive(Debug)]
struct BridgeError(String);

impl warp::reject::Reject for BridgeError {}

/// Query string accepted by `/views/{kind}`.
#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    year: Option<i32>,
    /// Comma-separated country filter for the line view.
    countries: Option<String>,
    country: Option<String>,
    future_year: Option<i32>,
}

impl ViewQuery {
    fn into_request(self, kind: ViewKind) -> ViewRequest {
        let countries = self
            .countries
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        ViewRequest {
            kind,
            year: self.year,
            countries,
            series: self.country,
            future_year: self.future_year,
        }
    }
}

/// HTTP endpoint that serves view models to the external renderer.
pub struct GuiBridge {
    runner: Arc<Runner>,
    metrics: Arc<MetricsRecorder>,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { runner, metrics }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + Send + Sync + 'static
    {
        let runner = self.runner.clone();
        let metrics = self.metrics.clone();
        let runner_filter = warp::any().map(move || runner.clone());
        let metrics_filter = warp::any().map(move || metrics.clone());

        let countries_route = warp::path("countries")
            .and(warp::path::end())
            .and(warp::get())
            .and(runner_filter.clone())
            .map(|runner: Arc<Runner>| warp::reply::json(&runner.selections()));

        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and(metrics_filter.clone())
            .map(|metrics: Arc<MetricsRecorder>| {
                warp::reply::json(&json!({
                    "status": "ok",
                    "metrics": metrics.snapshot(),
                }))
            });

        let view_route = warp::path("views")
            .and(warp::path::param::<ViewKind>())
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<ViewQuery>())
            .and(runner_filter)
            .and(metrics_filter.clone())
            .and_then(
                |kind: ViewKind,
                 query: ViewQuery,
                 runner: Arc<Runner>,
                 metrics: Arc<MetricsRecorder>| async move {
                    let request = query.into_request(kind);
                    match runner.execute(&request) {
                        Ok(model) => {
                            metrics.record_served(model.kind().as_str());
                            if model.is_fallback() {
                                metrics.record_fallback();
                            }
                            Ok::<_, Rejection>(warp::reply::json(&model))
                        }
                        Err(err) => {
                            error!("{} view error: {:#}", kind, err);
                            metrics.record_error();
                            Err(warp::reject::custom(BridgeError(format!("{:#}", err))))
                        }
                    }
                },
            );

        countries_route
            .or(health_route)
            .or(view_route)
            .recover(handle_rejection)
    }

    /// Serves the routes on a background thread with its own runtime.
    pub fn spawn(&self, address: SocketAddr) -> thread::JoinHandle<()> {
        let routes = self.routes();
        info!("view bridge listening on http://{}", address);
        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        })
    }
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(BridgeError(message)) = rejection.find::<BridgeError>() {
        (StatusCode::BAD_REQUEST, message.clone())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid query string".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:?}", rejection))
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "status": "error", "message": message })),
        status,
    ))
}
