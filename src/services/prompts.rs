use crate::services::openfoodfacts::CatalogProduct;

pub const IDENTIFY_PRODUCT: &str =
    "Identify the product name and brand shown in this photo. Return ONLY the name, nothing else. \
     If no product is recognisable, return exactly: Unknown Product";

const NARRATIVE_FORMAT: &str = r#"{
  "verdict": {
    "label": "safe | occasionally_safe | not_safe",
    "headline": "SAFE | OCCASIONALLY SAFE | NOT SAFE",
    "subtext": "short explanation"
  },
  "overall_score": { "percent": 0-100, "interpretation": "short text" },
  "nutrition_score": { "grade": "A | B | C | D | E" },
  "key_takeaways": {
    "possible_concern": "string",
    "generally_safe": "string",
    "depends_on_use": "string"
  },
  "age_suitability": {
    "children_0_12": "string",
    "young_12_45": "string",
    "adults_45_plus": "string"
  },
  "health_suitability": {
    "diabetes": "string",
    "heart": "string",
    "weight": "string",
    "normal": "string"
  },
  "ai_opinion": { "text": "string" }
}"#;

const GUIDELINES: &str = "Guidelines:\n\
     - Interpret the numbers, do not just list them\n\
     - No medical advice\n\
     - If unsure, say so honestly\n\
     - Keep every text short and easy to read\n\
     - Every field must be present";

pub fn classify_product(query: &str) -> String {
    format!(
        "Classify the input into exactly one of these categories: natural_food, packaged_food, non_food.\n\
         Output ONLY the category name. If unsure, answer packaged_food.\n\
         \n\
         Input: Apple\nOutput: natural_food\n\
         Input: Horlicks\nOutput: packaged_food\n\
         Input: Bus\nOutput: non_food\n\
         \n\
         Input: {}\nOutput:",
        query
    )
}

fn nutriment_text(product: &CatalogProduct, key: &str) -> String {
    product
        .nutriment(key)
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "?".to_string())
}

pub fn assess_product(product: &CatalogProduct, query: &str) -> String {
    format!(
        "You are a food interpretation assistant helping someone decide whether a food is a good everyday choice.\n\
         \n\
         Product: {name}\n\
         Brand: {brand}\n\
         Categories: {categories}\n\
         \n\
         Nutrition per 100g:\n\
         Sugar: {sugar} g\n\
         Salt: {salt} g\n\
         Fat: {fat} g\n\
         Calories: {kcal} kcal\n\
         Processing level (NOVA): {nova}\n\
         Ingredients: {ingredients}\n\
         Additives: {additives}\n\
         Labels: {labels}\n\
         \n\
         {guidelines}\n\
         \n\
         Return STRICT JSON in exactly this format:\n\
         {format}",
        name = product.name_or(query),
        brand = product.brand(),
        categories = product.category_names().join(", "),
        sugar = nutriment_text(product, "sugars_100g"),
        salt = nutriment_text(product, "salt_100g"),
        fat = nutriment_text(product, "fat_100g"),
        kcal = nutriment_text(product, "energy-kcal_100g"),
        nova = product.nova_group(),
        ingredients = product.ingredients_text.as_deref().unwrap_or("Unknown"),
        additives = product.additives().join(", "),
        labels = product.labels().join(", "),
        guidelines = GUIDELINES,
        format = NARRATIVE_FORMAT,
    )
}

pub fn profile_natural_food(name: &str) -> String {
    format!(
        "You are analyzing a natural, unpackaged food item: \"{name}\".\n\
         1. Act as a nutrition database and estimate its nutritional values per 100g.\n\
         2. Then write the health analysis.\n\
         \n\
         {guidelines}\n\
         \n\
         Return a single STRICT JSON object with this structure:\n\
         {{\n\
           \"product_info\": {{\n\
             \"brand\": \"Nature\",\n\
             \"category\": \"Natural Food\",\n\
             \"ingredients_text\": \"100% {name}\",\n\
             \"image_url\": \"https://www.google.com/search?tbm=isch&q={query}\"\n\
           }},\n\
           \"nutrition_per_100g\": {{\n\
             \"energy_kcal\": number, \"protein_g\": number, \"carbs_g\": number,\n\
             \"sugar_g\": number, \"fat_g\": number, \"sat_fat_g\": number, \"sodium_mg\": number\n\
           }},\n\
           \"analysis\": {format}\n\
         }}",
        name = name,
        query = name.replace(' ', "+"),
        guidelines = GUIDELINES,
        format = NARRATIVE_FORMAT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prompt_mentions_query() {
        let prompt = classify_product("Greek yogurt");
        assert!(prompt.ends_with("Input: Greek yogurt\nOutput:"));
    }

    #[test]
    fn test_assess_prompt_uses_catalog_facts() {
        let product: CatalogProduct = serde_json::from_str(
            r#"{"product_name": "Oreo", "brands": "Mondelez", "nutriments": {"sugars_100g": 38}}"#,
        )
        .unwrap();
        let prompt = assess_product(&product, "oreo cookies");

        assert!(prompt.contains("Product: Oreo"));
        assert!(prompt.contains("Brand: Mondelez"));
        assert!(prompt.contains("Sugar: 38 g"));
        assert!(prompt.contains("Salt: ? g"));
        assert!(prompt.contains("\"nutrition_score\""));
    }

    #[test]
    fn test_natural_prompt_search_link() {
        let prompt = profile_natural_food("green apple");
        assert!(prompt.contains("q=green+apple"));
        assert!(prompt.contains("\"100% green apple\""));
    }
}
