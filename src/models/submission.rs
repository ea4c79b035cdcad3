use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::models::{InputEcho, InputType};

/// An uploaded photo of a product or its label.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type
            .filter(|ct| ct.starts_with("image/"))
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime_type(&file_name).to_string());

        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        log::debug!("📊 Image file size: {} bytes ({})", bytes.len(), file_name);
        Ok(Self::new(file_name, None, bytes))
    }

    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// The opaque `images.input_image` value echoed back to clients.
    pub fn descriptor(&self) -> serde_json::Value {
        serde_json::json!({
            "file_name": self.file_name,
            "content_type": self.content_type,
            "size_bytes": self.bytes.len(),
            "sha256": self.sha256(),
        })
    }
}

/// Determine the MIME type from the file extension.
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

/// What the user handed in: a product name, a photo, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub product_name: Option<String>,
    pub image: Option<ImageFile>,
}

impl Submission {
    pub fn new(product_name: Option<String>, image: Option<ImageFile>) -> Self {
        Self {
            product_name: product_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            image,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(Some(name.into()), None)
    }

    pub fn by_image(image: ImageFile) -> Self {
        Self::new(None, Some(image))
    }

    /// The product name, trimmed; blank counts as no name even when the
    /// fields were filled in directly.
    pub fn name(&self) -> Option<&str> {
        self.product_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name().is_none() && self.image.is_none() {
            return Err(ValidationError::EmptySubmission);
        }
        Ok(())
    }

    /// Pick the single query key the service identifies the product from.
    pub fn query_key(&self, precedence: InputPrecedence) -> Option<QueryKey<'_>> {
        let name = self.name().map(QueryKey::Name);
        let image = self.image.as_ref().map(QueryKey::Image);

        match precedence {
            InputPrecedence::ImageFirst => image.or(name),
            InputPrecedence::NameFirst => name.or(image),
        }
    }

    pub fn echo(&self, key: &QueryKey<'_>, resolved_name: Option<&str>) -> InputEcho {
        InputEcho {
            product_name: resolved_name
                .map(str::to_string)
                .or_else(|| self.name().map(str::to_string)),
            input_type: match key {
                QueryKey::Image(_) => InputType::Image,
                QueryKey::Name(_) => InputType::Text,
            },
            image_provided: self.image.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryKey<'a> {
    Name(&'a str),
    Image(&'a ImageFile),
}

/// Which input wins when a submission carries both a name and an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputPrecedence {
    #[default]
    ImageFirst,
    NameFirst,
}

impl FromStr for InputPrecedence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "image-first" | "image" => Ok(InputPrecedence::ImageFirst),
            "name-first" | "name" | "text" => Ok(InputPrecedence::NameFirst),
            other => Err(format!("unknown input precedence '{}'", other)),
        }
    }
}
