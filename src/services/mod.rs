pub mod ai_service;
pub mod analysis; // Received -> Identified -> Enriched -> Reasoned -> Completed
pub mod gemini; // Google Gemini REST API
pub mod normalize;
pub mod openfoodfacts; // Nutrition reference database
pub mod prompts;

pub use ai_service::{AiService, ProductKind};
pub use analysis::{AnalysisService, Stage};
pub use gemini::GeminiService;
pub use openfoodfacts::{OpenFoodFactsClient, ProductCatalog};
