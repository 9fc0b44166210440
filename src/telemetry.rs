use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

/// One analytics event. Field layout follows the analytics engine schema the
/// dashboards query: string dimensions, numeric values, sampling index.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub blobs: Vec<String>,
    pub doubles: Vec<f64>,
    pub indexes: Vec<String>,
}

pub trait MetricsSink: Send + Sync {
    fn write(&self, point: DataPoint);
}

/// Emits each data point as a tracing event.
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn write(&self, point: DataPoint) {
        tracing::info!(
            target: "deploys_auth::telemetry",
            blobs = ?point.blobs,
            doubles = ?point.doubles,
            indexes = ?point.indexes,
            "data point"
        );
    }
}

/// Keeps every point in memory; used by tests.
#[derive(Default)]
pub struct MemorySink {
    points: Mutex<Vec<DataPoint>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn points(&self) -> Vec<DataPoint> {
        match self.points.lock() {
            Ok(p) => p.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Names of the latency points recorded so far, in order.
    pub fn latency_names(&self) -> Vec<String> {
        self.points()
            .into_iter()
            .filter_map(|p| p.blobs.get(1).cloned())
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn write(&self, point: DataPoint) {
        match self.points.lock() {
            Ok(mut p) => p.push(point),
            Err(poisoned) => poisoned.into_inner().push(point),
        }
    }
}

/// Where the request entered the edge network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeInfo {
    pub colo: Option<String>,
    pub country: Option<String>,
}

impl EdgeInfo {
    /// `cf-ray: 8c1f0e2b3d4a5f6e-AMS` carries the colo after the last dash.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let colo = header("cf-ray")
            .and_then(|ray| ray.rsplit_once('-'))
            .map(|(_, colo)| colo.to_string())
            .filter(|c| !c.is_empty());
        let country = header("cf-ipcountry").map(str::to_string);
        Self { colo, country }
    }
}

tokio::task_local! {
    static EDGE: EdgeInfo;
}

/// Edge info of the current request, if running inside [`edge_info_layer`].
pub fn current_edge() -> EdgeInfo {
    EDGE.try_with(Clone::clone).unwrap_or_default()
}

pub async fn edge_info_layer(request: Request, next: Next) -> Response {
    let edge = EdgeInfo::from_headers(request.headers());
    EDGE.scope(edge, next.run(request)).await
}

#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn MetricsSink>,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Runs `fut` and records how long it took. The outcome is returned
    /// untouched; the duration is recorded on failure too.
    pub async fn with_latency<T, F>(&self, name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.record_latency(name, start.elapsed().as_secs_f64() * 1000.0);
        out
    }

    fn record_latency(&self, name: &str, millis: f64) {
        let edge = current_edge();
        self.sink.write(DataPoint {
            blobs: vec![
                "latency".to_string(),
                name.to_string(),
                edge.colo.unwrap_or_default(),
                edge.country.unwrap_or_default(),
            ],
            doubles: vec![millis],
            indexes: vec!["latency".to_string()],
        });
    }
}
