use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Liveness check polled by the dashboard.
pub async fn api_test() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "API is running successfully!"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_api_test_message() {
        let Json(body) = api_test().await;
        assert_eq!(body["message"], "API is running successfully!");
    }
}
