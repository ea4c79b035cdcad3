use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::models::NutritionPer100g;
use crate::services::normalize::{clean_list, nutrient_amount};

pub const DEFAULT_OPENFOODFACTS_URL: &str = "https://world.openfoodfacts.org";
const USER_AGENT: &str = concat!("FoodHealthAnalyzer/", env!("CARGO_PKG_VERSION"));

/// A product record as OpenFoodFacts returns it (only the fields we use).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogProduct {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brands: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub countries: Option<String>,
    #[serde(default)]
    pub ingredients_text: Option<String>,
    #[serde(default)]
    pub labels_tags: Vec<String>,
    #[serde(default)]
    pub additives_tags: Vec<String>,
    #[serde(default)]
    pub categories_tags: Vec<String>,
    #[serde(default)]
    pub nova_group: Option<Value>,
    #[serde(default)]
    pub nutriments: Map<String, Value>,
    #[serde(default)]
    pub image_front_url: Option<String>,
    #[serde(default)]
    pub image_ingredients_url: Option<String>,
    #[serde(default)]
    pub image_nutrition_url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CatalogProduct {
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_empty(&self.product_name).unwrap_or(fallback)
    }

    pub fn brand(&self) -> &str {
        non_empty(&self.brands).unwrap_or("Unknown")
    }

    /// First entry of the comma separated category list.
    pub fn primary_category(&self) -> &str {
        non_empty(&self.categories)
            .and_then(|c| c.split(',').next())
            .map(str::trim)
            .unwrap_or("Unknown")
    }

    pub fn country(&self) -> &str {
        non_empty(&self.countries).unwrap_or("Unknown")
    }

    pub fn labels(&self) -> Vec<String> {
        clean_list(&self.labels_tags)
    }

    pub fn additives(&self) -> Vec<String> {
        clean_list(&self.additives_tags)
    }

    pub fn category_names(&self) -> Vec<String> {
        clean_list(&self.categories_tags)
    }

    pub fn nova_group(&self) -> String {
        match &self.nova_group {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => "Unknown".to_string(),
        }
    }

    pub fn nutriment(&self, key: &str) -> Option<&Value> {
        self.nutriments.get(key)
    }

    /// Nutrition facts per 100g. Sodium comes from `sodium_100g` (grams) and
    /// falls back to salt, which is 2.5x sodium by weight.
    pub fn nutrition_per_100g(&self) -> NutritionPer100g {
        let sodium_mg = match self.nutriment("sodium_100g") {
            Some(sodium) => nutrient_amount(Some(sodium)) * 1000.0,
            None => nutrient_amount(self.nutriment("salt_100g")) * 1000.0 / 2.5,
        };

        NutritionPer100g {
            energy_kcal: nutrient_amount(self.nutriment("energy-kcal_100g")),
            protein_g: nutrient_amount(self.nutriment("proteins_100g")),
            carbs_g: nutrient_amount(self.nutriment("carbohydrates_100g")),
            sugar_g: nutrient_amount(self.nutriment("sugars_100g")),
            fat_g: nutrient_amount(self.nutriment("fat_100g")),
            sat_fat_g: nutrient_amount(self.nutriment("saturated-fat_100g")),
            sodium_mg,
        }
    }

    /// Front, ingredients and nutrition photos, skipping missing ones.
    pub fn reference_images(&self) -> Vec<String> {
        [
            &self.image_front_url,
            &self.image_ingredients_url,
            &self.image_nutrition_url,
        ]
        .into_iter()
        .filter_map(|url| non_empty(url).map(str::to_string))
        .collect()
    }

    pub fn source_url(&self, base_url: &str) -> String {
        format!(
            "{}/product/{}",
            base_url.trim_end_matches('/'),
            self.code.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<CatalogProduct>,
}

/// Trait for the nutrition reference database
#[async_trait::async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Best match for a free-text query, if any.
    async fn search(&self, query: &str) -> Result<Option<CatalogProduct>>;

    /// Public page of a product, used as the nutrition `source_url`.
    fn product_url(&self, product: &CatalogProduct) -> String;
}

pub struct OpenFoodFactsClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/cgi/search.pl", self.base_url)
    }
}

#[async_trait::async_trait]
impl ProductCatalog for OpenFoodFactsClient {
    async fn search(&self, query: &str) -> Result<Option<CatalogProduct>> {
        log::info!("🔎 Searching OpenFoodFacts for '{}'", query);

        let response = self
            .client
            .get(self.search_url())
            .query(&[
                ("search_terms", query),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenFoodFacts response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenFoodFacts search error ({}): {}", status, error_text);
        }

        let search: SearchResponse = response.json().await?;
        let product = search.products.into_iter().next();

        match &product {
            Some(p) => log::info!(
                "✅ OpenFoodFacts match: {} ({})",
                p.name_or(query),
                p.code.as_deref().unwrap_or("no code")
            ),
            None => log::info!("🤷 No OpenFoodFacts match for '{}'", query),
        }

        Ok(product)
    }

    fn product_url(&self, product: &CatalogProduct) -> String {
        product.source_url(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nutella() -> CatalogProduct {
        serde_json::from_str(
            r#"{
                "code": "3017620422003",
                "product_name": "Nutella",
                "brands": "Ferrero",
                "categories": "Spreads, Sweet spreads, Hazelnut spreads",
                "labels_tags": ["en:gluten-free", "en:no-palm-oil"],
                "nova_group": 4,
                "nutriments": {
                    "energy-kcal_100g": 539,
                    "proteins_100g": 6.3,
                    "sugars_100g": "56.3",
                    "salt_100g": 0.107
                },
                "image_front_url": "https://images.openfoodfacts.org/front.jpg",
                "image_nutrition_url": ""
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_catalog_product_accessors() {
        let product = nutella();

        assert_eq!(product.name_or("query"), "Nutella");
        assert_eq!(product.brand(), "Ferrero");
        assert_eq!(product.primary_category(), "Spreads");
        assert_eq!(product.country(), "Unknown");
        assert_eq!(product.nova_group(), "4");
        assert_eq!(product.labels(), vec!["Gluten Free", "No Palm Oil"]);
        assert_eq!(product.reference_images(), vec!["https://images.openfoodfacts.org/front.jpg"]);
        assert_eq!(
            product.source_url("https://world.openfoodfacts.org/"),
            "https://world.openfoodfacts.org/product/3017620422003"
        );
    }

    #[test]
    fn test_nutrition_mapping() {
        let per_100g = nutella().nutrition_per_100g();

        assert_eq!(per_100g.energy_kcal, 539.0);
        assert_eq!(per_100g.sugar_g, 56.3);
        assert_eq!(per_100g.fat_g, 0.0);
        // 0.107 g salt -> 42.8 mg sodium
        assert!((per_100g.sodium_mg - 42.8).abs() < 1e-9);
    }

    #[test]
    fn test_sodium_preferred_over_salt() {
        let mut product = nutella();
        product
            .nutriments
            .insert("sodium_100g".to_string(), serde_json::json!(0.05));

        assert!((product.nutrition_per_100g().sodium_mg - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_search_response() {
        let search: SearchResponse = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(search.products.is_empty());
    }
}
