//! Route table and handlers.
//!
//! Every handler is a thin shell over one `DetectionManager` operation.
//! The realtime and legacy surfaces are registered only when their
//! toggles are on, so a disabled surface 404s instead of answering with
//! an error body.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use borealis_detector::{DetectionManager, SysinfoHost, API_NAME};
use borealis_protocol::{
    CompleteDetection, CpuDetection, DiskDetection, EnvironmentDetection, GpuDetection,
    HealthResponse, LegacyInfo, MemoryDetection, NetworkDetection, RealtimeDetection,
    RootResponse,
};

pub type AppState = Arc<DetectionManager<SysinfoHost>>;

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/detect", get(detect))
        .route("/gpu", get(gpu))
        .route("/cpu", get(cpu))
        .route("/memory", get(memory))
        .route("/disk", get(disk))
        .route("/network", get(network))
        .route("/environment", get(environment));

    if state.config().enable_realtime_monitoring {
        router = router.route("/realtime", get(realtime));
    }

    if state.config().legacy_compatible {
        // Paths are fixed by the older consumer; do not rename.
        router = router
            .route("/server/info", get(legacy_info))
            .route("/server/python_libraries", get(legacy_python_libraries))
            .route("/server/pytorch_collect_env", get(legacy_collect_env));
    }

    router.with_state(state)
}

async fn root(State(manager): State<AppState>) -> Json<RootResponse> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert("/detect".to_string(), "complete detection".to_string());
    endpoints.insert("/gpu".to_string(), "GPU devices".to_string());
    endpoints.insert("/cpu".to_string(), "CPU telemetry".to_string());
    endpoints.insert("/memory".to_string(), "memory telemetry".to_string());
    endpoints.insert("/disk".to_string(), "disk telemetry".to_string());
    endpoints.insert("/network".to_string(), "network telemetry".to_string());
    endpoints.insert(
        "/environment".to_string(),
        "installed packages and runtime".to_string(),
    );
    endpoints.insert("/health".to_string(), "liveness".to_string());
    if manager.config().enable_realtime_monitoring {
        endpoints.insert("/realtime".to_string(), "cheap polling metrics".to_string());
    }
    if manager.config().legacy_compatible {
        endpoints.insert(
            "/server/info".to_string(),
            "legacy-compatible aggregate".to_string(),
        );
    }

    Json(RootResponse {
        api_name: API_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Hardware and OS detection service".to_string(),
        endpoints,
        system_summary: manager.summary(),
        status: "running".to_string(),
    })
}

async fn health(State(manager): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: manager.timestamp(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn detect(State(manager): State<AppState>) -> Json<CompleteDetection> {
    Json(manager.complete().await)
}

async fn gpu(State(manager): State<AppState>) -> Json<GpuDetection> {
    Json(manager.gpu().await)
}

async fn cpu(State(manager): State<AppState>) -> Json<CpuDetection> {
    Json(manager.cpu().await)
}

async fn memory(State(manager): State<AppState>) -> Json<MemoryDetection> {
    Json(manager.memory().await)
}

async fn disk(State(manager): State<AppState>) -> Json<DiskDetection> {
    Json(manager.disk().await)
}

async fn network(State(manager): State<AppState>) -> Json<NetworkDetection> {
    Json(manager.network().await)
}

async fn environment(State(manager): State<AppState>) -> Json<EnvironmentDetection> {
    Json(manager.environment().await)
}

async fn realtime(State(manager): State<AppState>) -> Json<RealtimeDetection> {
    Json(manager.realtime().await)
}

async fn legacy_info(State(manager): State<AppState>) -> Json<LegacyInfo> {
    Json(manager.legacy().await)
}

/// Legacy flat package listing: the array itself, or an `error` object.
async fn legacy_python_libraries(State(manager): State<AppState>) -> Json<serde_json::Value> {
    let env = manager.environment().await.environment_detection;
    match env.packages {
        Some(packages) => Json(packages),
        None => Json(serde_json::json!({
            "error": env.packages_error.unwrap_or_else(|| "unavailable".to_string()),
        })),
    }
}

/// Legacy runtime dump as a plain string field.
async fn legacy_collect_env(State(manager): State<AppState>) -> Json<serde_json::Value> {
    let env = manager.environment().await.environment_detection;
    match env.runtime_env {
        Some(dump) => Json(serde_json::json!({ "env": dump })),
        None => Json(serde_json::json!({
            "error": env.runtime_env_error.unwrap_or_else(|| "unavailable".to_string()),
        })),
    }
}
