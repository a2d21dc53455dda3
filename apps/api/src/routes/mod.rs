pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::feedback::handlers as feedback;
use crate::scoring::handlers as scoring;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Scoring
        .route("/api/analyze", post(scoring::handle_analyze))
        .route("/api/rerun-analysis", post(scoring::handle_rerun))
        .route(
            "/api/score-historical-data",
            post(scoring::handle_score_historical),
        )
        .route("/api/process-and-score", post(scoring::handle_process_and_score))
        .route(
            "/api/config/scoring-weights",
            get(scoring::handle_scoring_weights),
        )
        // Feedback
        .route("/api/submit-feedback", post(feedback::handle_submit_feedback))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::context::ContextStore;
    use crate::feedback::FeedbackLog;
    use crate::ingest::csv_table::parse_csv;
    use crate::scoring::client::testing::StubCompletion;
    use crate::scoring::client::ScoringClient;
    use crate::scoring::pacer::RequestPacer;
    use crate::scoring::sink::IncrementalSink;
    use crate::scoring::weights::ScoringWeights;
    use crate::scoring::ScoringOrchestrator;

    const BOUNDARY: &str = "dealflow-test-boundary";
    const GOOD_REPLY: &str = r#"{"dimensional_scores": {"equipo": 80, "producto": 60},
        "qualitative_analysis": {"problem": "Payments"},
        "score_justification": {"equipo": "Strong"}}"#;

    struct Harness {
        state: AppState,
        stub: Arc<StubCompletion>,
        _dir: tempfile::TempDir,
    }

    fn harness(context: ContextStore, weights_error: Option<&str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubCompletion::replying([GOOD_REPLY]));
        let orchestrator = ScoringOrchestrator::new(
            ScoringClient::new(stub.clone(), Duration::from_secs(30)),
            Arc::new(ScoringWeights::from_pairs([("equipo", 0.5), ("producto", 0.5)])),
            RequestPacer::new(Duration::ZERO),
            "Nombre de la startup".to_string(),
        );
        let state = AppState {
            context: Arc::new(context),
            orchestrator: Arc::new(orchestrator),
            weights_error: weights_error.map(str::to_string),
            sink: None,
            historical_sink: IncrementalSink::new(dir.path().join("scored_historical.csv")),
            feedback: FeedbackLog::new(dir.path().join("feedback.csv")),
        };
        Harness {
            state,
            stub,
            _dir: dir,
        }
    }

    fn loaded_context() -> ContextStore {
        let portfolio =
            parse_csv("Nombre,Sector,Status\nOld Co,Fintech,Investment\n".as_bytes()).unwrap();
        ContextStore::from_parts(portfolio, None, "We invest in deep tech.".to_string())
    }

    fn multipart_body(parts: &[(&str, &str, &str)]) -> String {
        let mut body = String::new();
        for (field, file_name, content) in parts {
            body.push_str(&format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n\
                 {content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn multipart_request(uri: &str, parts: &[(&str, &str, &str)]) -> Request<Body> {
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn upload_request(csv: &str, accept: Option<&str>) -> Request<Body> {
        let body = multipart_body(&[("new_deals_file", "deals.csv", csv)]);
        let mut builder = Request::post("/api/analyze").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health_reports_readiness() {
        let h = harness(ContextStore::default(), None);
        let (status, body) = send(h.state, Request::get("/health").body(Body::empty()).unwrap()).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["context_ready"], false);
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_analyze_without_context_is_503() {
        let h = harness(ContextStore::default(), None);
        let (status, _) = send(h.state, upload_request("Nombre de la startup\nAcme\n", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(h.stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_batch_returns_array() {
        let h = harness(loaded_context(), None);
        let csv = "Nombre de la startup,Sector\nAcme,Fintech\nKuna,Edtech\n";
        let (status, body) = send(h.state, upload_request(csv, None)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Nombre de la startup"], "Acme");
        assert_eq!(rows[1]["final_weighted_score"], 70.0);
        assert_eq!(h.stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_analyze_streams_events_in_order() {
        let h = harness(loaded_context(), None);
        let csv = "Nombre de la startup\nr1\nr2\n";
        let (status, body) = send(h.state, upload_request(csv, Some("text/event-stream"))).await;
        let text = String::from_utf8(body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(text
            .split("\n\n")
            .filter(|chunk| !chunk.is_empty())
            .all(|chunk| chunk.starts_with("data: ")));
        let events: Vec<Value> = text
            .split("\n\n")
            .filter_map(|chunk| chunk.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["Nombre de la startup"], "r1");
        assert_eq!(events[1]["Nombre de la startup"], "r2");
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_upload() {
        let h = harness(loaded_context(), None);
        let (status, body) = send(h.state, upload_request("", None)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_TABLE");
    }

    #[tokio::test]
    async fn test_score_historical_resumes_from_output() {
        let h = harness(ContextStore::default(), None);
        let csv = "Nombre de la startup,Sector,Status\nAcme,Fintech,Investment\nKuna,Edtech,Rejected\n";
        let parts = [("historical_data_file", "historical.csv", csv)];

        let (status, body) = send(
            h.state.clone(),
            multipart_request("/api/score-historical-data", &parts),
        )
        .await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(h.stub.calls(), 2);
        assert!(h.stub.prompts()[0].contains(crate::scoring::handlers::NO_THESIS_TEXT));
        assert!(h.state.historical_sink.path().exists());

        let (status, body) = send(
            h.state.clone(),
            multipart_request("/api/score-historical-data", &parts),
        )
        .await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
        assert_eq!(h.stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_score_historical_requires_its_field() {
        let h = harness(loaded_context(), None);
        let parts = [("new_deals_file", "deals.csv", "Nombre de la startup\nAcme\n")];
        let (status, _) = send(h.state, multipart_request("/api/score-historical-data", &parts)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_process_and_score_uses_uploaded_context() {
        let h = harness(ContextStore::default(), None);
        let parts = [
            ("applications_file", "apps.csv", "Nombre de la startup,Sector\nNew Co,Agtech\n"),
            ("portfolio_file", "portfolio.csv", "Nombre,Sector,Status\nOld Co,Fintech,Investment\n"),
            ("context_pdf", "thesis.txt", "We back climate founders."),
        ];
        let (status, body) = send(h.state.clone(), multipart_request("/api/process-and-score", &parts)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Nombre de la startup"], "New Co");
        assert_eq!(rows[0]["final_weighted_score"], 70.0);
        let prompt = &h.stub.prompts()[0];
        assert!(prompt.contains("We back climate founders."));
        assert!(prompt.contains("Old Co"));
        assert!(!h.state.historical_sink.path().exists());
    }

    #[tokio::test]
    async fn test_process_and_score_requires_portfolio() {
        let h = harness(ContextStore::default(), None);
        let parts = [("applications_file", "apps.csv", "Nombre de la startup\nNew Co\n")];
        let (status, body) = send(h.state, multipart_request("/api/process-and-score", &parts)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("portfolio_file"));
        assert_eq!(h.stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_rerun_rejects_empty_object() {
        let h = harness(loaded_context(), None);
        let (status, _) = send(h.state, json_request("/api/rerun-analysis", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let h = harness(loaded_context(), None);
        let (status, _) = send(h.state, json_request("/api/rerun-analysis", json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_rerun_scores_single_candidate() {
        let h = harness(loaded_context(), None);
        let candidate = json!({"Nombre de la startup": "Edited Co", "Sector": "Agtech"});
        let (status, body) = send(h.state, json_request("/api/rerun-analysis", candidate)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Sector"], "Agtech");
        assert_eq!(body["final_weighted_score"], 70.0);
    }

    #[tokio::test]
    async fn test_scoring_weights_endpoint() {
        let h = harness(loaded_context(), None);
        let request = Request::get("/api/config/scoring-weights").body(Body::empty()).unwrap();
        let (status, body) = send(h.state, request).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["equipo"]["peso"], 0.5);

        let h = harness(loaded_context(), Some("file not found"));
        let request = Request::get("/api/config/scoring-weights").body(Body::empty()).unwrap();
        let (status, _) = send(h.state, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_submit_feedback_appends_row() {
        let h = harness(ContextStore::default(), None);
        let path = h.state.feedback.path().to_path_buf();
        let entry = json!({"startup": "Acme", "rating": 5});
        let (status, body) = send(h.state, json_request("/api/submit-feedback", entry)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(body["status"].is_string());
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "startup,rating\nAcme,5\n");
    }
}
