mod gateway;
mod registry;

use std::env;
use std::net::SocketAddr;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::info;

use crate::registry::{RoomRegistry, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let state = SharedState::new(RoomRegistry::new());

    let app = Router::new()
        .route("/ws", get(gateway::websocket_handler))
        .route("/health", get(health))
        .with_state(state);

    // 端口可用 PORT 环境变量覆盖，便于部署
    let port: u16 = env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("服务器正在监听 {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

/// 健康检查：返回当前活跃房间数
async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({ "status": "OK", "rooms": state.len() }))
}
