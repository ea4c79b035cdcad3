use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    AgeSuitability, AiOpinion, HealthSuitability, ImageFile, KeyTakeaways, NutritionScore,
    OverallScore, Verdict,
};
use crate::services::normalize::{clamp_percent, loose_number, parse_grade, parse_verdict_label};
use crate::services::openfoodfacts::CatalogProduct;

/// What kind of thing the user asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    PackagedFood,
    NaturalFood,
    NonFood,
}

impl ProductKind {
    pub fn from_answer(answer: &str) -> Self {
        let lower = answer.trim().to_lowercase();
        if lower.contains("non_food") || lower.contains("non-food") {
            ProductKind::NonFood
        } else if lower.contains("natural_food") {
            ProductKind::NaturalFood
        } else {
            // When unsure the model is told to say packaged_food, so that's the fallback too
            ProductKind::PackagedFood
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVerdict {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub subtext: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScore {
    #[serde(default)]
    pub percent: Option<Value>,
    #[serde(default)]
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGrade {
    #[serde(default)]
    pub grade: Option<String>,
}

/// The narrative part of an analysis as the model returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub verdict: Option<RawVerdict>,
    #[serde(default)]
    pub overall_score: Option<RawScore>,
    #[serde(default)]
    pub nutrition_score: Option<RawGrade>,
    #[serde(default)]
    pub key_takeaways: Option<KeyTakeaways>,
    #[serde(default)]
    pub age_suitability: Option<AgeSuitability>,
    #[serde(default)]
    pub health_suitability: Option<HealthSuitability>,
    #[serde(default)]
    pub ai_opinion: Option<AiOpinion>,
}

/// Narrative sections after normalization, ready to go on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub verdict: Verdict,
    pub overall_score: OverallScore,
    pub nutrition_score: NutritionScore,
    pub key_takeaways: KeyTakeaways,
    pub age_suitability: AgeSuitability,
    pub health_suitability: HealthSuitability,
    pub ai_opinion: AiOpinion,
}

impl Assessment {
    /// Normalizes the model's answer. Fails naming the first mandatory field
    /// that is missing or unusable.
    pub fn into_narrative(self) -> Result<Narrative, String> {
        let raw_verdict = self.verdict.ok_or("missing verdict")?;
        let label = raw_verdict
            .label
            .as_deref()
            .and_then(parse_verdict_label)
            .ok_or("missing or unknown verdict label")?;
        let headline = raw_verdict
            .headline
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| label.headline().to_string());

        let raw_score = self.overall_score.ok_or("missing overall score")?;
        let percent = raw_score
            .percent
            .as_ref()
            .and_then(loose_number)
            .ok_or("missing overall score percent")?;

        let grade = self
            .nutrition_score
            .and_then(|s| s.grade)
            .as_deref()
            .and_then(parse_grade)
            .ok_or("missing or invalid nutrition grade")?;

        let ai_opinion = self
            .ai_opinion
            .filter(|o| !o.text.trim().is_empty())
            .ok_or("missing ai opinion")?;

        Ok(Narrative {
            verdict: Verdict {
                label,
                headline,
                subtext: raw_verdict.subtext.unwrap_or_default(),
            },
            overall_score: OverallScore {
                percent: clamp_percent(percent),
                interpretation: raw_score.interpretation.unwrap_or_default(),
            },
            nutrition_score: NutritionScore { grade },
            key_takeaways: self.key_takeaways.unwrap_or_default(),
            age_suitability: self.age_suitability.unwrap_or_default(),
            health_suitability: self.health_suitability.unwrap_or_default(),
            ai_opinion,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NaturalProductInfo {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub ingredients_text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Everything the model knows about an unpackaged food: estimated nutrition
/// per 100g plus the same narrative it writes for catalog products.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NaturalFoodProfile {
    #[serde(default)]
    pub product_info: NaturalProductInfo,
    #[serde(default)]
    pub nutrition_per_100g: serde_json::Map<String, Value>,
    #[serde(default)]
    pub analysis: Assessment,
}

/// Trait for the generative AI collaborator (Gemini, or a fake in tests)
#[async_trait::async_trait]
pub trait AiService: Send + Sync {
    /// Product name and brand read off a photo.
    async fn identify_product(&self, image: &ImageFile) -> Result<String>;
    async fn classify_product(&self, query: &str) -> Result<ProductKind>;
    async fn assess_product(&self, product: &CatalogProduct, query: &str) -> Result<Assessment>;
    async fn profile_natural_food(&self, name: &str) -> Result<NaturalFoodProfile>;
}
