pub mod analysis;
pub mod submission;

pub use analysis::{
    AgeSuitability, AiOpinion, AnalysisResult, DataConfidence, Grade, HealthSuitability, Images,
    InputEcho, InputType, KeyTakeaways, Marketing, Meta, Nutrition, NutritionPer100g,
    NutritionScore, OverallScore, Product, Status, Verdict, VerdictLabel,
};
pub use submission::{guess_mime_type, ImageFile, InputPrecedence, QueryKey, Submission};
