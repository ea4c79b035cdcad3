use axum::{
    extract::{FromRequest, Request},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ValidationError;
use crate::server::ApiError;

/// Text input posted by the collaborator front end, as JSON or as a form.
#[derive(Debug, Default, Deserialize)]
pub struct TextInput {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct AcceptedInput {
    pub product_name: String,
    pub language: String,
}

impl TextInput {
    pub fn accept(self) -> Result<AcceptedInput, ValidationError> {
        let product_name = self.product_name.map(|v| v.trim().to_string()).unwrap_or_default();
        let language = self.language.map(|v| v.trim().to_string()).unwrap_or_default();

        let missing: Vec<String> = [("product_name", &product_name), ("language", &language)]
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(field, _)| field.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(AcceptedInput {
            product_name,
            language,
        })
    }
}

async fn read_text_input(request: Request) -> Result<TextInput, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        let Json(input) = Json::<TextInput>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(input)
    } else {
        let Form(input) = Form::<TextInput>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(input)
    }
}

pub async fn text_input_handler(request: Request) -> Result<impl IntoResponse, ApiError> {
    let accepted = read_text_input(request).await?.accept()?;
    log::info!(
        "📝 Text input received: '{}' ({})",
        accepted.product_name,
        accepted.language
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": accepted })),
    ))
}
