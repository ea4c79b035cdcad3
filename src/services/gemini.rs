use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::models::ImageFile;
use crate::services::ai_service::{AiService, Assessment, NaturalFoodProfile, ProductKind};
use crate::services::normalize::clean_json_text;
use crate::services::openfoodfacts::CatalogProduct;
use crate::services::prompts;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const FALLBACK_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Prefer a "flash" Gemini model, then any Gemini model.
fn pick_model(names: &[String]) -> Option<String> {
    let gemini = || names.iter().filter(|n| n.contains("gemini"));

    gemini()
        .find(|n| n.contains("flash"))
        .or_else(|| gemini().next())
        .map(|n| n.trim_start_matches("models/").to_string())
}

pub struct GeminiService {
    api_key: String,
    base_url: String,
    configured_model: Option<String>,
    active_model: OnceCell<String>,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(api_key: String, base_url: String, model: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            configured_model: model.filter(|m| !m.trim().is_empty()),
            active_model: OnceCell::new(),
            client,
        })
    }

    /// The model used for every call, discovered once per process when none is configured.
    pub async fn model(&self) -> String {
        self.active_model
            .get_or_init(|| async {
                if let Some(model) = &self.configured_model {
                    return model.clone();
                }

                log::info!("🔍 Finding an available Gemini model...");
                match self.list_models().await {
                    Ok(names) => match pick_model(&names) {
                        Some(model) => {
                            log::info!("✅ Using Gemini model: {}", model);
                            model
                        }
                        None => {
                            log::warn!("⚠️ No Gemini model listed, using fallback {}", FALLBACK_MODEL);
                            FALLBACK_MODEL.to_string()
                        }
                    },
                    Err(e) => {
                        log::error!("❌ Error listing Gemini models: {}", e);
                        FALLBACK_MODEL.to_string()
                    }
                }
            })
            .await
            .clone()
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini model list error ({}): {}", status, error_text);
        }

        let list: ModelList = response.json().await?;
        Ok(list.models.into_iter().map(|m| m.name).collect())
    }

    async fn generate(&self, parts: Vec<Part>, config: Option<GenerationConfig>) -> Result<String> {
        let model = self.model().await;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: config,
        };

        log::info!("🤖 Sending request to Gemini with model: {}", model);
        log::debug!("📤 Request payload size: {} bytes", serde_json::to_string(&request)?.len());

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Gemini API error response: {}", error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let generated: GenerateResponse = response.json().await?;
        let text = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Gemini returned no content"))?;

        log::debug!("💬 Gemini response content: {}", text);
        Ok(text)
    }

    async fn generate_json<T: serde::de::DeserializeOwned>(&self, prompt: String) -> Result<T> {
        let config = GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        };
        let text = self.generate(vec![Part::Text { text: prompt }], Some(config)).await?;

        Ok(serde_json::from_str(clean_json_text(&text))?)
    }
}

#[async_trait::async_trait]
impl AiService for GeminiService {
    async fn identify_product(&self, image: &ImageFile) -> Result<String> {
        log::debug!("📸 Identifying product from {} ({} bytes)", image.file_name, image.bytes.len());

        let parts = vec![
            Part::Text {
                text: prompts::IDENTIFY_PRODUCT.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.content_type.clone(),
                    data: general_purpose::STANDARD.encode(&image.bytes),
                },
            },
        ];

        let name = self.generate(parts, None).await?;
        Ok(name.trim().trim_matches('"').to_string())
    }

    async fn classify_product(&self, query: &str) -> Result<ProductKind> {
        let config = GenerationConfig {
            temperature: Some(0.0),
            ..Default::default()
        };
        let answer = self
            .generate(
                vec![Part::Text {
                    text: prompts::classify_product(query),
                }],
                Some(config),
            )
            .await?;

        Ok(ProductKind::from_answer(clean_json_text(&answer)))
    }

    async fn assess_product(&self, product: &CatalogProduct, query: &str) -> Result<Assessment> {
        self.generate_json(prompts::assess_product(product, query)).await
    }

    async fn profile_natural_food(&self, name: &str) -> Result<NaturalFoodProfile> {
        self.generate_json(prompts::profile_natural_food(name)).await
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::get, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_pick_model_prefers_flash() {
        let names = vec![
            "models/embedding-001".to_string(),
            "models/gemini-1.5-pro".to_string(),
            "models/gemini-2.0-flash".to_string(),
        ];
        assert_eq!(pick_model(&names).as_deref(), Some("gemini-2.0-flash"));

        let no_flash = vec!["models/gemini-1.5-pro".to_string()];
        assert_eq!(pick_model(&no_flash).as_deref(), Some("gemini-1.5-pro"));

        assert_eq!(pick_model(&["models/text-bison".to_string()]), None);
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text { text: "hi".to_string() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                temperature: None,
            }),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(value["generation_config"]["response_mime_type"], "application/json");
        assert!(value["generation_config"].get("temperature").is_none());
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_model_discovered_once_and_json_answer_parsed() {
        let list_calls = Arc::new(AtomicUsize::new(0));
        let counter = list_calls.clone();

        let router = Router::new()
            .route(
                "/models",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({
                            "models": [{"name": "models/gemini-1.5-pro"}, {"name": "models/gemini-1.5-flash"}]
                        }))
                    }
                }),
            )
            .route(
                "/models/:call",
                post(|Path(call): Path<String>| async move {
                    assert_eq!(call, "gemini-1.5-flash:generateContent");
                    Json(serde_json::json!({
                        "candidates": [{"content": {"parts": [{
                            "text": "```json\n{\"verdict\": {\"label\": \"safe\"}}\n```"
                        }]}}]
                    }))
                }),
            );

        let base_url = spawn_stub(router).await;
        let gemini = GeminiService::new("key".to_string(), base_url, None).unwrap();

        let product = CatalogProduct::default();
        let assessment = gemini.assess_product(&product, "water").await.unwrap();
        assert_eq!(assessment.verdict.unwrap().label.as_deref(), Some("safe"));

        assert_eq!(gemini.model().await, "gemini-1.5-flash");
        assert_eq!(list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let router = Router::new().route(
            "/models/:call",
            post(|| async { (axum::http::StatusCode::FORBIDDEN, "API key invalid") }),
        );

        let base_url = spawn_stub(router).await;
        let gemini =
            GeminiService::new("bad".to_string(), base_url, Some("gemini-test".to_string())).unwrap();

        let err = gemini.classify_product("apple").await.unwrap_err();
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("API key invalid"));
    }
}
