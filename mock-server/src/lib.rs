use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const HEALTH_MESSAGE: &str = "Loan fraud analysis backend is running";

/// Per-route request counters, keyed by route name.
pub type Hits = Arc<RwLock<HashMap<&'static str, u64>>>;

#[derive(Clone, Default)]
pub struct AppState {
    pub hits: Hits,
}

impl AppState {
    pub async fn hits(&self, route: &str) -> u64 {
        self.hits.read().await.get(route).copied().unwrap_or(0)
    }

    async fn record(&self, route: &'static str) {
        *self.hits.write().await.entry(route).or_insert(0) += 1;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub analysis: String,
    pub features_received: usize,
    pub verdict: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub upload_id: Uuid,
    pub uploaded: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/plain", get(plain))
        .route("/api/mouse", post(analyze_mouse))
        .route("/api/keyboard", post(analyze_keyboard))
        .route("/api/fingerprint", post(analyze_fingerprint))
        .route("/api/upload", post(upload))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock backend serving");
    }
    axum::serve(listener, app_with_state(state)).await
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    state.record("health").await;
    Json(json!({ "message": HEALTH_MESSAGE }))
}

async fn plain(State(state): State<AppState>) -> &'static str {
    state.record("plain").await;
    "OK"
}

async fn analyze_mouse(
    State(state): State<AppState>,
    Json(features): Json<Value>,
) -> Result<Json<Verdict>, (StatusCode, Json<Value>)> {
    state.record("mouse").await;
    analyze("mouse", features)
}

async fn analyze_keyboard(
    State(state): State<AppState>,
    Json(features): Json<Value>,
) -> Result<Json<Verdict>, (StatusCode, Json<Value>)> {
    state.record("keyboard").await;
    analyze("keyboard", features)
}

async fn analyze_fingerprint(
    State(state): State<AppState>,
    Json(features): Json<Value>,
) -> Result<Json<Verdict>, (StatusCode, Json<Value>)> {
    state.record("fingerprint").await;
    analyze("fingerprint", features)
}

fn analyze(kind: &str, features: Value) -> Result<Json<Verdict>, (StatusCode, Json<Value>)> {
    let Value::Object(map) = features else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "expected a JSON object of features" })),
        ));
    };
    debug!(kind, features = map.len(), "analysis request");
    Ok(Json(Verdict {
        analysis: kind.to_string(),
        features_received: map.len(),
        verdict: classify(&map).to_string(),
    }))
}

/// Uniform timings across several numeric features look scripted.
pub fn classify(features: &Map<String, Value>) -> &'static str {
    let numbers: Vec<f64> = features.values().filter_map(Value::as_f64).collect();
    let uniform = numbers.len() >= 3 && numbers.windows(2).all(|w| w[0] == w[1]);
    if uniform {
        "bot"
    } else {
        "human"
    }
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, (StatusCode, Json<Value>)> {
    state.record("upload").await;
    let mut uploaded = Vec::new();
    let mut fields = HashMap::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": e.body_text() }))));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) if name == "files" => {
                // Drain the part so the stream advances; contents are not inspected.
                let _ = field.bytes().await;
                uploaded.push(file_name);
            }
            _ => {
                let text = field.text().await.unwrap_or_default();
                fields.insert(name, text);
            }
        }
    }
    if uploaded.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "No files uploaded" }))));
    }
    Ok(Json(UploadReceipt {
        upload_id: Uuid::new_v4(),
        uploaded,
        fields,
    }))
}
