use serde::Serialize;
use serde_json::Value;
use std::error::Error as StdError;
use thiserror::Error;

/// Input for one Stable Diffusion prediction.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub scheduler: String,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, scheduler: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            scheduler: scheduler.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image provider returned no image")]
    NoImage,
    #[error("image generation failed: {0}")]
    Provider(#[source] Box<dyn StdError + Send + Sync>),
}

impl ImageError {
    pub fn provider<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Provider(Box::new(error))
    }
}

/// Text-to-image backend. Returns the URL of the generated image.
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, ImageError>;
}

impl<G: ImageGenerator + ?Sized> ImageGenerator for Box<G> {
    fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        (**self).generate(prompt)
    }
}

/// First URL of a prediction output. Providers return either a list of URLs
/// or a single URL string; anything else carries no usable image.
pub fn first_image_url(output: &Value) -> Result<String, ImageError> {
    let candidate = match output {
        Value::Array(items) => items.first(),
        Value::String(_) => Some(output),
        _ => None,
    };

    match candidate.and_then(Value::as_str) {
        Some(url) if !url.trim().is_empty() => Ok(url.to_string()),
        _ => Err(ImageError::NoImage),
    }
}
