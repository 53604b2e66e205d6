pub mod analyze;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/analyze", post(analyze::handle_analyze))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::LlmAnalyzer;
    use crate::config::{AnalysisLimits, Config};
    use crate::extraction::TextExtractor;
    use crate::inference::{Embedder, EntityRecognizer, LazyModel};
    use crate::pipeline::Pipeline;
    use crate::scoring::SemanticMatcher;
    use crate::skills::SkillExtractor;
    use crate::testing::{BagOfWordsEmbedder, FixedRecognizer, Reply, ScriptedBackend};

    const BOUNDARY: &str = "skillsight-test-boundary";

    fn app(backend: ScriptedBackend) -> Router {
        let pipeline = Pipeline::new(
            TextExtractor::default(),
            LlmAnalyzer::new(
                Arc::new(backend),
                vec!["m1".to_string()],
                AnalysisLimits::default(),
            ),
            SemanticMatcher::new(Arc::new(LazyModel::ready(
                "embedding",
                Arc::new(BagOfWordsEmbedder) as Arc<dyn Embedder>,
            ))),
            SkillExtractor::new(Arc::new(LazyModel::ready(
                "ner",
                Arc::new(FixedRecognizer::new(&[])) as Arc<dyn EntityRecognizer>,
            ))),
            AnalysisLimits::default(),
        );
        build_router(AppState {
            pipeline: Arc::new(pipeline),
            config: Config::default(),
        })
    }

    /// `(name, file_name, value)` triples encoded as multipart/form-data.
    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn analyze_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/analyze")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(ScriptedBackend::unconfigured())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "skillsight-api");
    }

    #[tokio::test]
    async fn test_analyze_without_ai() {
        let body = multipart_body(&[
            ("file", Some("resume.txt"), "Jane Doe Skills Python and SQL"),
            ("enable_ai", None, "false"),
        ]);
        let response = app(ScriptedBackend::unconfigured())
            .oneshot(analyze_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["file_name"], "resume.txt");
        assert_eq!(report["skills"], serde_json::json!(["python", "sql"]));
        assert!(report["scores"].is_null());
        assert!(report["analysis"].is_null());
        assert!(report["semantic_match"].is_null());
        assert_eq!(report["clarity"]["label"], "Needs Work");
    }

    #[tokio::test]
    async fn test_analyze_with_ai() {
        let reply = r#"{"job_match_score": 90, "ats_compatibility_score": 70, "clarity_score": 50,
                        "top_tips": ["Add metrics"]}"#;
        let body = multipart_body(&[
            ("file", Some("resume.txt"), "Rust engineer Experience Acme"),
            ("job_description", None, "Rust engineer"),
        ]);
        let response = app(ScriptedBackend::new(vec![Reply::Text(reply.to_string())]))
            .oneshot(analyze_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        // 0.4*90 + 0.3*70 + 0.3*50 = 72
        assert_eq!(report["scores"]["overall"], 72);
        assert_eq!(report["analysis"]["model_used"], "m1");
        assert_eq!(report["top_tips"], serde_json::json!(["Add metrics"]));
        assert!(report["semantic_match"].is_u64());
    }

    #[tokio::test]
    async fn test_missing_file_is_400() {
        let body = multipart_body(&[("job_description", None, "Rust engineer")]);
        let response = app(ScriptedBackend::unconfigured())
            .oneshot(analyze_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_key_is_503() {
        let body = multipart_body(&[("file", Some("resume.txt"), "Rust engineer")]);
        let response = app(ScriptedBackend::unconfigured())
            .oneshot(analyze_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_exhausted_models_is_502() {
        let body = multipart_body(&[("file", Some("resume.txt"), "Rust engineer")]);
        let response = app(ScriptedBackend::new(vec![Reply::Fail]))
            .oneshot(analyze_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "All LLMs failed. Please retry.");
    }
}
