use axum::Json;
use axum::extract::State;
use http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub datastore: &'static str,
}

/// ヘルスチェックハンドラー
///
/// GET /health
///
/// サービスとデータストアの稼働状況を返す。
/// ロードバランサーやモニタリングツールから呼び出される。
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.datastore.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
                datastore: "ok",
            }),
        ),
        Err(e) => {
            tracing::error!(error = ?e, "データストア疎通エラー");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    version: env!("CARGO_PKG_VERSION"),
                    datastore: "unavailable",
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::state_with;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let (state, _) = state_with(&[]);
        let (status, Json(response)) = health_check(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(response.datastore, "ok");
    }
}
