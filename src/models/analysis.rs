use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Request-level outcome. Anything the service sends other than `"success"`
/// (e.g. `"error: data not found"`) is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Status {
    Success,
    Error,
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("success") {
            Status::Success
        } else {
            Status::Error
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Image,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEcho {
    #[serde(default)]
    pub product_name: Option<String>,
    pub input_type: InputType,
    #[serde(default)]
    pub image_provided: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marketing {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub claims: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Images {
    /// Opaque to clients; the service describes the uploaded file here.
    #[serde(default)]
    pub input_image: serde_json::Value,
    #[serde(default)]
    pub reference_images: Vec<String>,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionPer100g {
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub sugar_g: f64,
    pub fat_g: f64,
    pub sat_fat_g: f64,
    pub sodium_mg: f64,
}

impl NutritionPer100g {
    fn fields(&self) -> [(&'static str, f64); 7] {
        [
            ("energy_kcal", self.energy_kcal),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("sugar_g", self.sugar_g),
            ("fat_g", self.fat_g),
            ("sat_fat_g", self.sat_fat_g),
            ("sodium_mg", self.sodium_mg),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataConfidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DataConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataConfidence::Low => "low",
            DataConfidence::Medium => "medium",
            DataConfidence::High => "high",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub per_100g: NutritionPer100g,
    #[serde(default)]
    pub source_url: String,
    pub data_confidence: DataConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictLabel {
    Safe,
    OccasionallySafe,
    NotSafe,
}

impl VerdictLabel {
    pub fn headline(&self) -> &'static str {
        match self {
            VerdictLabel::Safe => "SAFE",
            VerdictLabel::OccasionallySafe => "OCCASIONALLY SAFE",
            VerdictLabel::NotSafe => "NOT SAFE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub subtext: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub percent: f64,
    #[serde(default)]
    pub interpretation: String,
}

/// Nutri-Score-style letter grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(alias = "a")]
    A,
    #[serde(alias = "b")]
    B,
    #[serde(alias = "c")]
    C,
    #[serde(alias = "d")]
    D,
    #[serde(alias = "e")]
    E,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionScore {
    pub grade: Grade,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyTakeaways {
    #[serde(default)]
    pub possible_concern: Option<String>,
    #[serde(default)]
    pub generally_safe: Option<String>,
    #[serde(default)]
    pub depends_on_use: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeSuitability {
    #[serde(default)]
    pub children_0_12: Option<String>,
    #[serde(default)]
    pub young_12_45: Option<String>,
    #[serde(default)]
    pub adults_45_plus: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSuitability {
    #[serde(default)]
    pub diabetes: Option<String>,
    #[serde(default)]
    pub heart: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiOpinion {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub analysis_type: String,
    #[serde(default)]
    pub confidence_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// The response document for one product query.
///
/// Every section is optional on the wire so a partial or failed document
/// still decodes; `missing_sections` tells a renderer what it has to skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "message")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputEcho>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<Marketing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Images>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Nutrition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<OverallScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_score: Option<NutritionScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_takeaways: Option<KeyTakeaways>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_suitability: Option<AgeSuitability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_suitability: Option<HealthSuitability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_opinion: Option<AiOpinion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl AnalysisResult {
    /// An error document carrying whatever input echo is known.
    pub fn failed(input: Option<InputEcho>, reason: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            reason: Some(reason.into()),
            input,
            product: None,
            marketing: None,
            images: None,
            nutrition: None,
            verdict: None,
            overall_score: None,
            nutrition_score: None,
            key_takeaways: None,
            age_suitability: None,
            health_suitability: None,
            ai_opinion: None,
            meta: None,
        }
    }

    /// Decodes a response body. Success documents must match the schema
    /// exactly. Any other status keeps `status` and `reason` and whichever
    /// sections still decode, dropping the rest.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let status = value
            .get("status")
            .and_then(|s| s.as_str())
            .map(|s| Status::from(s.to_string()))
            .unwrap_or(Status::Error);

        if status == Status::Success {
            return serde_json::from_value(value);
        }

        let doc: serde_json::Map<String, serde_json::Value> = serde_json::from_value(value)?;
        fn section<T: serde::de::DeserializeOwned>(
            doc: &serde_json::Map<String, serde_json::Value>,
            key: &str,
        ) -> Option<T> {
            doc.get(key)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
        }

        let reason = doc
            .get("reason")
            .or_else(|| doc.get("message"))
            .and_then(|r| r.as_str())
            .map(str::to_string);

        Ok(Self {
            status: Status::Error,
            reason,
            input: section(&doc, "input"),
            product: section(&doc, "product"),
            marketing: section(&doc, "marketing"),
            images: section(&doc, "images"),
            nutrition: section(&doc, "nutrition"),
            verdict: section(&doc, "verdict"),
            overall_score: section(&doc, "overall_score"),
            nutrition_score: section(&doc, "nutrition_score"),
            key_takeaways: section(&doc, "key_takeaways"),
            age_suitability: section(&doc, "age_suitability"),
            health_suitability: section(&doc, "health_suitability"),
            ai_opinion: section(&doc, "ai_opinion"),
            meta: section(&doc, "meta"),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Reason for a failed analysis, with a generic fallback.
    pub fn failure_reason(&self) -> String {
        self.reason
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Product could not be analyzed".to_string())
    }

    /// Names of the sections a success document should carry but doesn't.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let present = [
            ("input", self.input.is_some()),
            ("product", self.product.is_some()),
            ("marketing", self.marketing.is_some()),
            ("images", self.images.is_some()),
            ("nutrition", self.nutrition.is_some()),
            ("verdict", self.verdict.is_some()),
            ("overall_score", self.overall_score.is_some()),
            ("nutrition_score", self.nutrition_score.is_some()),
            ("key_takeaways", self.key_takeaways.is_some()),
            ("age_suitability", self.age_suitability.is_some()),
            ("health_suitability", self.health_suitability.is_some()),
            ("ai_opinion", self.ai_opinion.is_some()),
            ("meta", self.meta.is_some()),
        ];

        present
            .iter()
            .filter(|(_, is_present)| !is_present)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Checks the numeric invariants of the sections that are present.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if let Some(score) = &self.overall_score {
            if !score.percent.is_finite() || !(0.0..=100.0).contains(&score.percent) {
                return Err(SchemaError::PercentOutOfRange(score.percent));
            }
        }

        if let Some(nutrition) = &self.nutrition {
            for (field, value) in nutrition.per_100g.fields() {
                if !value.is_finite() || value < 0.0 {
                    return Err(SchemaError::NegativeNutrient { field, value });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A complete success document as the service sends it.
    pub const SUCCESS_JSON: &str = r#"{
        "status": "success",
        "input": {"product_name": "Nutella", "input_type": "text", "image_provided": false},
        "product": {"name": "Nutella", "brand": "Ferrero", "category": "Spreads", "country": "France"},
        "marketing": {"labels": ["Gluten Free"], "claims": ["Gluten Free"]},
        "images": {
            "input_image": null,
            "reference_images": ["https://images.openfoodfacts.org/front.jpg"],
            "source": "openfoodfacts"
        },
        "nutrition": {
            "per_100g": {
                "energy_kcal": 539, "protein_g": 6.3, "carbs_g": 57.5, "sugar_g": 56.3,
                "fat_g": 30.9, "sat_fat_g": 10.6, "sodium_mg": 42.8
            },
            "source_url": "https://world.openfoodfacts.org/product/3017620422003",
            "data_confidence": "high"
        },
        "verdict": {"label": "occasionally_safe", "headline": "OCCASIONALLY SAFE", "subtext": "High in sugar"},
        "overall_score": {"percent": 35, "interpretation": "Treat, not a staple"},
        "nutrition_score": {"grade": "E"},
        "key_takeaways": {"possible_concern": "Sugar", "generally_safe": "In small amounts"},
        "age_suitability": {"children_0_12": "Limit", "young_12_45": "Occasionally", "adults_45_plus": "Rarely"},
        "health_suitability": {"diabetes": "Avoid", "heart": "Limit", "weight": "Limit", "normal": "Occasionally"},
        "ai_opinion": {"text": "Enjoy it as an occasional treat."},
        "meta": {"data_source": "OpenFoodFacts", "analysis_type": "AI-interpreted", "confidence_level": "medium"}
    }"#;
}
