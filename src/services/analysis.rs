use chrono::Utc;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::models::{
    AnalysisResult, DataConfidence, Images, InputEcho, InputPrecedence, Marketing, Meta,
    Nutrition, NutritionPer100g, Product, QueryKey, Status, Submission,
};
use crate::services::ai_service::{AiService, Narrative, NaturalFoodProfile, ProductKind};
use crate::services::normalize::{marketing_claims, nutrient_amount, parse_confidence};
use crate::services::openfoodfacts::{CatalogProduct, ProductCatalog};

/// Steps one request goes through before it is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Identified,
    Enriched,
    Reasoned,
    Completed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Identified => "identified",
            Stage::Enriched => "enriched",
            Stage::Reasoned => "reasoned",
            Stage::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// A request that stopped before `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    /// Last stage the request reached.
    pub stage: Stage,
    pub reason: String,
    pub input: Option<InputEcho>,
}

impl StageFailure {
    fn new(stage: Stage, reason: impl Into<String>, input: Option<InputEcho>) -> Self {
        Self {
            stage,
            reason: reason.into(),
            input,
        }
    }
}

const UNKNOWN_PRODUCT: &str = "unknown product";

/// Resolves a submission into a full `AnalysisResult`.
pub struct AnalysisService {
    ai: Arc<dyn AiService>,
    catalog: Arc<dyn ProductCatalog>,
    precedence: InputPrecedence,
}

impl AnalysisService {
    pub fn new(
        ai: Arc<dyn AiService>,
        catalog: Arc<dyn ProductCatalog>,
        precedence: InputPrecedence,
    ) -> Self {
        Self {
            ai,
            catalog,
            precedence,
        }
    }

    /// Only an unusable submission is an `Err`; every later failure becomes a
    /// `status: "error"` document so the client can show it.
    pub async fn analyze(&self, submission: &Submission) -> Result<AnalysisResult, ValidationError> {
        submission.validate()?;

        match self.run(submission).await {
            Ok(result) => {
                log::info!("✅ Analysis completed for {:?}", result.input.as_ref().and_then(|i| i.product_name.as_deref()));
                Ok(result)
            }
            Err(failure) => {
                log::warn!("⚠️ Analysis stopped after stage '{}': {}", failure.stage, failure.reason);
                Ok(AnalysisResult::failed(failure.input, failure.reason))
            }
        }
    }

    async fn run(&self, submission: &Submission) -> Result<AnalysisResult, StageFailure> {
        let key = submission
            .query_key(self.precedence)
            .ok_or_else(|| StageFailure::new(Stage::Received, "Provide product name or image", None))?;
        log::info!(
            "📨 Analysis request received (name: {:?}, image: {}, key: {})",
            submission.name(),
            submission.image.is_some(),
            match key {
                QueryKey::Name(_) => "name",
                QueryKey::Image(_) => "image",
            }
        );

        // Identified
        let query = self.identify(submission, &key).await?;
        let echo = submission.echo(&key, Some(&query));

        let kind = match self.ai.classify_product(&query).await {
            Ok(kind) => kind,
            Err(e) => {
                log::warn!("⚠️ Category check failed for '{}', assuming packaged food: {}", query, e);
                ProductKind::PackagedFood
            }
        };
        log::info!("🏷️ '{}' classified as {:?}", query, kind);

        let image_descriptor = submission
            .image
            .as_ref()
            .map(|image| image.descriptor())
            .unwrap_or(serde_json::Value::Null);

        match kind {
            ProductKind::NonFood => Err(StageFailure::new(
                Stage::Identified,
                format!("'{}' is not a food item", query),
                Some(echo),
            )),
            ProductKind::PackagedFood => self.analyze_packaged(&query, echo, image_descriptor).await,
            ProductKind::NaturalFood => self.analyze_natural(&query, echo, image_descriptor).await,
        }
    }

    async fn identify(&self, submission: &Submission, key: &QueryKey<'_>) -> Result<String, StageFailure> {
        match key {
            QueryKey::Name(name) => Ok(name.to_string()),
            QueryKey::Image(image) => {
                let partial_echo = || Some(submission.echo(key, None));
                let name = self.ai.identify_product(image).await.map_err(|e| {
                    StageFailure::new(
                        Stage::Received,
                        format!("Could not read the product from the image: {}", e),
                        partial_echo(),
                    )
                })?;

                if name.is_empty() || name.to_lowercase().contains(UNKNOWN_PRODUCT) {
                    return Err(StageFailure::new(
                        Stage::Received,
                        "No product could be recognised in the image",
                        partial_echo(),
                    ));
                }

                log::info!("📸 Image recognised as '{}'", name);
                Ok(name)
            }
        }
    }

    async fn analyze_packaged(
        &self,
        query: &str,
        echo: InputEcho,
        input_image: serde_json::Value,
    ) -> Result<AnalysisResult, StageFailure> {
        // Enriched
        let product = match self.catalog.search(query).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                return Err(StageFailure::new(Stage::Identified, "Product not found", Some(echo)));
            }
            Err(e) => {
                return Err(StageFailure::new(
                    Stage::Identified,
                    format!("Product lookup failed: {}", e),
                    Some(echo),
                ));
            }
        };

        let nutrition = Nutrition {
            per_100g: product.nutrition_per_100g(),
            source_url: self.catalog.product_url(&product),
            data_confidence: DataConfidence::High,
        };

        // Reasoned
        let narrative = self
            .ai
            .assess_product(&product, query)
            .await
            .map_err(|e| format!("AI analysis failed: {}", e))
            .and_then(|assessment| {
                assessment
                    .into_narrative()
                    .map_err(|e| format!("AI analysis incomplete: {}", e))
            })
            .map_err(|reason| StageFailure::new(Stage::Enriched, reason, Some(echo.clone())))?;

        Ok(packaged_result(query, echo, &product, nutrition, narrative, input_image))
    }

    async fn analyze_natural(
        &self,
        query: &str,
        echo: InputEcho,
        input_image: serde_json::Value,
    ) -> Result<AnalysisResult, StageFailure> {
        log::info!("🍎 Analyzing natural food '{}' from model knowledge", query);

        let profile = self.ai.profile_natural_food(query).await.map_err(|e| {
            StageFailure::new(
                Stage::Identified,
                format!("Failed to analyze natural food: {}", e),
                Some(echo.clone()),
            )
        })?;

        let NaturalFoodProfile {
            product_info,
            nutrition_per_100g,
            analysis,
        } = profile;

        // Enriched
        let per_100g = NutritionPer100g {
            energy_kcal: nutrient_amount(nutrition_per_100g.get("energy_kcal")),
            protein_g: nutrient_amount(nutrition_per_100g.get("protein_g")),
            carbs_g: nutrient_amount(nutrition_per_100g.get("carbs_g")),
            sugar_g: nutrient_amount(nutrition_per_100g.get("sugar_g")),
            fat_g: nutrient_amount(nutrition_per_100g.get("fat_g")),
            sat_fat_g: nutrient_amount(nutrition_per_100g.get("sat_fat_g")),
            sodium_mg: nutrient_amount(nutrition_per_100g.get("sodium_mg")),
        };
        let confidence = nutrition_per_100g
            .get("data_confidence")
            .and_then(|v| v.as_str())
            .and_then(parse_confidence)
            .unwrap_or(DataConfidence::Medium);

        // Reasoned
        let narrative = analysis.into_narrative().map_err(|e| {
            StageFailure::new(
                Stage::Enriched,
                format!("AI analysis incomplete: {}", e),
                Some(echo.clone()),
            )
        })?;

        let image_url = product_info.image_url.filter(|u| !u.is_empty());
        let labels = vec![
            "Natural".to_string(),
            "Whole Food".to_string(),
            "Unprocessed".to_string(),
        ];

        Ok(assemble(
            echo,
            Product {
                name: query.to_string(),
                brand: product_info
                    .brand
                    .unwrap_or_else(|| "Natural / Generic".to_string()),
                category: product_info
                    .category
                    .unwrap_or_else(|| "Natural Food".to_string()),
                country: "Global".to_string(),
                ingredients_text: Some(
                    product_info
                        .ingredients_text
                        .unwrap_or_else(|| "Natural - Single Ingredient".to_string()),
                ),
                image_url: image_url.clone(),
            },
            Marketing {
                labels,
                claims: vec!["No Additives".to_string(), "Fresh".to_string()],
            },
            Images {
                input_image,
                reference_images: image_url.into_iter().collect(),
                source: "AI knowledge base".to_string(),
            },
            Nutrition {
                per_100g,
                source_url: natural_source_url(query),
                data_confidence: confidence,
            },
            narrative,
            Meta {
                data_source: "AI Knowledge Base".to_string(),
                analysis_type: "Natural Food Analysis".to_string(),
                confidence_level: confidence.to_string(),
                generated_at: None,
            },
        ))
    }
}

/// Web search for a food's nutrition facts, with the query form-encoded.
fn natural_source_url(query: &str) -> String {
    reqwest::Url::parse_with_params(
        "https://www.google.com/search",
        &[("q", format!("{} nutrition", query))],
    )
    .map(String::from)
    .unwrap_or_default()
}

fn packaged_result(
    query: &str,
    echo: InputEcho,
    product: &CatalogProduct,
    nutrition: Nutrition,
    narrative: Narrative,
    input_image: serde_json::Value,
) -> AnalysisResult {
    let labels = product.labels();
    let claims = marketing_claims(&labels);

    assemble(
        echo,
        Product {
            name: product.name_or(query).to_string(),
            brand: product.brand().to_string(),
            category: product.primary_category().to_string(),
            country: product.country().to_string(),
            ingredients_text: Some(
                product
                    .ingredients_text
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "Ingredients not found.".to_string()),
            ),
            image_url: product.image_front_url.clone().filter(|u| !u.is_empty()),
        },
        Marketing { labels, claims },
        Images {
            input_image,
            reference_images: product.reference_images(),
            source: "openfoodfacts".to_string(),
        },
        nutrition,
        narrative,
        Meta {
            data_source: "OpenFoodFacts".to_string(),
            analysis_type: "AI-interpreted".to_string(),
            confidence_level: DataConfidence::Medium.to_string(),
            generated_at: None,
        },
    )
}

// Completed
fn assemble(
    echo: InputEcho,
    product: Product,
    marketing: Marketing,
    images: Images,
    nutrition: Nutrition,
    narrative: Narrative,
    meta: Meta,
) -> AnalysisResult {
    AnalysisResult {
        status: Status::Success,
        reason: None,
        input: Some(echo),
        product: Some(product),
        marketing: Some(marketing),
        images: Some(images),
        nutrition: Some(nutrition),
        verdict: Some(narrative.verdict),
        overall_score: Some(narrative.overall_score),
        nutrition_score: Some(narrative.nutrition_score),
        key_takeaways: Some(narrative.key_takeaways),
        age_suitability: Some(narrative.age_suitability),
        health_suitability: Some(narrative.health_suitability),
        ai_opinion: Some(narrative.ai_opinion),
        meta: Some(Meta {
            generated_at: Some(Utc::now()),
            ..meta
        }),
    }
}
