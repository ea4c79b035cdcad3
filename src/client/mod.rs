pub mod session;

use reqwest::multipart::{Form, Part};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::AnalyzeError;
use crate::models::{AnalysisResult, Submission};

pub use session::{run_analysis, Session, SessionError, SessionState, Ticket};

const BODY_EXCERPT_CHARS: usize = 500;

/// Talks to the analysis service's `POST /analyze` endpoint.
///
/// One request per call: nothing is cached and nothing is retried.
pub struct AnalyzerClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnalyzerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzeError::TransportFailed(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, AnalyzeError> {
        Self::new(config.base_url.clone(), config.timeout)
    }

    fn analyze_url(&self) -> String {
        format!("{}/analyze", self.base_url)
    }

    /// Multipart body with a `product_name` part and/or an `image` part.
    pub fn build_form(submission: &Submission) -> Result<Form, AnalyzeError> {
        submission.validate()?;

        let mut form = Form::new();
        if let Some(name) = submission.name() {
            form = form.text("product_name", name.to_string());
        }
        if let Some(image) = &submission.image {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)
                .map_err(|e| {
                    crate::error::ValidationError::Malformed(format!(
                        "invalid image content type '{}': {}",
                        image.content_type, e
                    ))
                })?;
            form = form.part("image", part);
        }

        Ok(form)
    }

    pub async fn analyze(&self, submission: &Submission) -> Result<AnalysisResult, AnalyzeError> {
        let form = Self::build_form(submission)?;
        log::info!(
            "📤 Submitting product for analysis (name: {:?}, image: {})",
            submission.name(),
            submission.image.as_ref().map(|i| i.file_name.as_str()).unwrap_or("none")
        );

        let response = self
            .client
            .post(self.analyze_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        log::debug!("📥 Analysis service response status: {}", status);

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            log::error!("❌ Analysis service error ({}): {}", status, body);
            return Err(AnalyzeError::RequestFailed {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: body.chars().take(BODY_EXCERPT_CHARS).collect(),
            });
        }

        let result = serde_json::from_str(&body)
            .and_then(AnalysisResult::from_value)
            .map_err(|e| AnalyzeError::TransportFailed(format!("invalid response body: {}", e)))?;

        // Error documents go to the user as-is; only a success has to be usable.
        if result.is_success() {
            result
                .validate()
                .map_err(|e| AnalyzeError::TransportFailed(format!("response violates schema: {}", e)))?;

            let missing = result.missing_sections();
            if !missing.is_empty() {
                log::warn!("⚠️ Success response without sections: {}", missing.join(", "));
            }
        }

        Ok(result)
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalyzeError {
        if e.is_timeout() {
            AnalyzeError::TransportFailed(format!(
                "request timed out after {}s",
                self.timeout.as_secs_f32()
            ))
        } else {
            AnalyzeError::TransportFailed(e.to_string())
        }
    }
}

/// Caller-level view of an analysis: a `status: "error"` document becomes
/// `AnalysisNotFound`, everything else passes through.
pub fn classify_outcome(
    outcome: Result<AnalysisResult, AnalyzeError>,
) -> Result<AnalysisResult, AnalyzeError> {
    match outcome {
        Ok(result) if !result.is_success() => Err(AnalyzeError::AnalysisNotFound {
            reason: result.failure_reason(),
        }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[tokio::test]
    async fn test_empty_submission_rejected_before_network() {
        // Nothing listens on the discard port; validation must fail first.
        let client = AnalyzerClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let err = client.analyze(&Submission::default()).await.unwrap_err();
        assert_eq!(err, AnalyzeError::Validation(ValidationError::EmptySubmission));
    }

    #[test]
    fn test_classify_outcome() {
        let not_found = AnalysisResult::failed(None, "Product not found");
        assert_eq!(
            classify_outcome(Ok(not_found)),
            Err(AnalyzeError::AnalysisNotFound { reason: "Product not found".to_string() })
        );

        let transport = AnalyzeError::TransportFailed("connection reset".to_string());
        assert_eq!(classify_outcome(Err(transport.clone())), Err(transport));
    }

    #[test]
    fn test_analyze_url() {
        let client = AnalyzerClient::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.analyze_url(), "http://localhost:8000/analyze");
    }
}

#[cfg(all(test, feature = "server"))]
mod stub_tests {
    use super::*;
    use crate::models::analysis::fixtures::SUCCESS_JSON;
    use crate::models::ImageFile;
    use axum::{extract::Multipart, http::header, http::StatusCode, routing::post, Router};
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;

    type Seen = Arc<Mutex<Vec<String>>>;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Stub service that records the multipart fields it receives.
    fn recording_stub(seen: Seen, status: StatusCode, body: &'static str) -> Router {
        Router::new().route(
            "/analyze",
            post(move |mut multipart: Multipart| {
                let seen = seen.clone();
                async move {
                    while let Some(field) = multipart.next_field().await.unwrap() {
                        let name = field.name().unwrap_or_default().to_string();
                        let entry = match field.file_name() {
                            Some(file_name) => format!(
                                "{}:{}:{}",
                                name,
                                file_name,
                                field.content_type().unwrap_or_default()
                            ),
                            None => name,
                        };
                        let _ = field.bytes().await.unwrap();
                        seen.lock().unwrap().push(entry);
                    }
                    (status, [(header::CONTENT_TYPE, "application/json")], body)
                }
            }),
        )
    }

    async fn client_for(seen: &Seen, status: StatusCode, body: &'static str) -> AnalyzerClient {
        let base_url = spawn_stub(recording_stub(seen.clone(), status, body)).await;
        AnalyzerClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    fn photo() -> ImageFile {
        ImageFile::new("label.png", None, vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[tokio::test]
    async fn test_name_only_sends_product_name_field() {
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::OK, SUCCESS_JSON).await;

        let result = client.analyze(&Submission::by_name("Nutella")).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["product_name"]);
        let expected: AnalysisResult = serde_json::from_str(SUCCESS_JSON).unwrap();
        assert_eq!(result, expected);
        assert!(result.missing_sections().is_empty());
    }

    #[tokio::test]
    async fn test_image_only_sends_image_field() {
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::OK, SUCCESS_JSON).await;

        client.analyze(&Submission::by_image(photo())).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["image:label.png:image/png"]);
    }

    #[tokio::test]
    async fn test_both_inputs_send_both_fields() {
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::OK, SUCCESS_JSON).await;
        let submission = Submission::new(Some("Nutella".to_string()), Some(photo()));

        client.analyze(&submission).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["product_name", "image:label.png:image/png"]
        );
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::INTERNAL_SERVER_ERROR, "boom").await;

        let err = client.analyze(&Submission::by_name("Nutella")).await.unwrap_err();

        match &err {
            AnalyzeError::RequestFailed { status, status_text, body } => {
                assert_eq!(*status, 500);
                assert_eq!(status_text, "Internal Server Error");
                assert_eq!(body, "boom");
            }
            other => panic!("expected RequestFailed, got {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn test_error_status_document_is_not_a_failure() {
        let seen = Seen::default();
        let client = client_for(
            &seen,
            StatusCode::OK,
            r#"{"status": "error", "reason": "Product not found"}"#,
        )
        .await;

        let outcome = client.analyze(&Submission::by_name("mystery bar")).await;
        let result = outcome.clone().unwrap();
        assert!(!result.is_success());

        assert_eq!(
            classify_outcome(outcome),
            Err(AnalyzeError::AnalysisNotFound { reason: "Product not found".to_string() })
        );
    }

    #[tokio::test]
    async fn test_error_document_with_partial_input_is_not_found() {
        let seen = Seen::default();
        let client = client_for(
            &seen,
            StatusCode::OK,
            r#"{"status": "error", "reason": "not found", "input": {"product_name": "x"}}"#,
        )
        .await;

        let outcome = client.analyze(&Submission::by_name("x")).await;
        let result = outcome.clone().unwrap();
        assert_eq!(result.input, None);

        assert_eq!(
            classify_outcome(outcome),
            Err(AnalyzeError::AnalysisNotFound { reason: "not found".to_string() })
        );
    }

    #[tokio::test]
    async fn test_error_document_with_out_of_range_sections_is_not_found() {
        let seen = Seen::default();
        let client = client_for(
            &seen,
            StatusCode::OK,
            r#"{
                "status": "error",
                "reason": "AI failed",
                "overall_score": {"percent": 150},
                "nutrition": {"per_100g": {"sugar_g": -2}}
            }"#,
        )
        .await;

        let err = classify_outcome(client.analyze(&Submission::by_name("x")).await).unwrap_err();
        assert_eq!(err, AnalyzeError::AnalysisNotFound { reason: "AI failed".to_string() });
    }

    #[tokio::test]
    async fn test_same_submission_decodes_identically() {
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::OK, SUCCESS_JSON).await;
        let submission = Submission::new(Some("Nutella".to_string()), Some(photo()));

        let first = client.analyze(&submission).await.unwrap();
        let second = client.analyze(&submission).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_transport_failure() {
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::OK, "<html>oops</html>").await;

        let err = client.analyze(&Submission::by_name("Nutella")).await.unwrap_err();
        assert!(matches!(err, AnalyzeError::TransportFailed(ref m) if m.contains("invalid response body")));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected() {
        let body: &'static str = Box::leak(
            SUCCESS_JSON
                .replace(r#""percent": 35"#, r#""percent": 120"#)
                .into_boxed_str(),
        );
        let seen = Seen::default();
        let client = client_for(&seen, StatusCode::OK, body).await;

        let err = client.analyze(&Submission::by_name("Nutella")).await.unwrap_err();
        assert!(matches!(err, AnalyzeError::TransportFailed(ref m) if m.contains("schema")));
    }

    #[tokio::test]
    async fn test_disconnect_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                // Read part of the request, then hang up without answering.
                let mut buf = [0u8; 64];
                let _ = socket.read(&mut buf).await;
                drop(socket);
            }
        });

        let client = AnalyzerClient::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let err = client.analyze(&Submission::by_name("Nutella")).await.unwrap_err();

        assert!(matches!(err, AnalyzeError::TransportFailed(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let router = Router::new().route(
            "/analyze",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let base_url = spawn_stub(router).await;
        let client = AnalyzerClient::new(base_url, Duration::from_millis(200)).unwrap();

        let err = client.analyze(&Submission::by_name("Nutella")).await.unwrap_err();
        assert!(matches!(err, AnalyzeError::TransportFailed(ref m) if m.contains("timed out")));
    }
}
