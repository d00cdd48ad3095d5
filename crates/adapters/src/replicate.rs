//! Stable Diffusion image generation through the Replicate predictions API.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header;
use serde::{Deserialize, Serialize};

use blog_core::config::ImageConfig;
use blog_core::image::first_image_url;
use blog_core::{ImageError, ImageGenerator, ImageRequest};

use crate::base_url::resolve_base_url;
use crate::error::AdapterError;

const REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct ReplicateImageGenerator {
    client: Client,
    base_url: String,
    api_token: String,
    model: String,
    scheduler: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ReplicateImageGenerator {
    pub fn from_config(config: &ImageConfig) -> Result<Self, AdapterError> {
        let api_token = config.api_token.trim();
        if api_token.is_empty() {
            return Err(AdapterError::InvalidConfig(
                "Replicate api_token must not be empty".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "image model must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: resolve_base_url(&config.base_url, REPLICATE_BASE_URL),
            api_token: api_token.to_string(),
            model: config.model.trim().to_string(),
            scheduler: config.scheduler.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        })
    }

    /// `owner/name:version` goes to the versioned predictions endpoint; a
    /// bare `owner/name` uses the model's own endpoint.
    fn prediction_target(&self) -> (String, Option<&str>) {
        match self.model.split_once(':') {
            Some((_, version)) => (format!("{}/predictions", self.base_url), Some(version)),
            None => (
                format!("{}/models/{}/predictions", self.base_url, self.model),
                None,
            ),
        }
    }

    fn create_prediction(&self, prompt: &str) -> Result<Prediction, AdapterError> {
        let (url, version) = self.prediction_target();
        let body = CreatePrediction {
            version,
            input: ImageRequest::new(prompt, self.scheduler.as_str()),
        };

        debug!("POST {} (model {})", url, self.model);
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Token {}", self.api_token))
            .header("Prefer", "wait")
            .json(&body)
            .send()?;
        parse_prediction(response)
    }

    fn fetch_prediction(&self, url: &str) -> Result<Prediction, AdapterError> {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Token {}", self.api_token))
            .send()?;
        parse_prediction(response)
    }

    fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction, AdapterError> {
        let started = Instant::now();
        while !prediction.is_terminal() {
            if started.elapsed() >= self.poll_timeout {
                return Err(AdapterError::PredictionTimeout {
                    id: prediction.id,
                    waited_secs: self.poll_timeout.as_secs(),
                });
            }
            let url = prediction
                .urls
                .as_ref()
                .and_then(|urls| urls.get.clone())
                .ok_or_else(|| {
                    AdapterError::InvalidConfig(format!(
                        "prediction {} is `{}` but has no polling URL",
                        prediction.id, prediction.status
                    ))
                })?;
            thread::sleep(self.poll_interval);
            debug!("Polling prediction {} ({})", prediction.id, prediction.status);
            prediction = self.fetch_prediction(&url)?;
        }
        Ok(prediction)
    }
}

impl ImageGenerator for ReplicateImageGenerator {
    fn generate(&self, prompt: &str) -> Result<String, ImageError> {
        let created = self.create_prediction(prompt)?;
        info!("Replicate prediction {} is `{}`", created.id, created.status);
        let prediction = self.wait_for(created)?;

        if prediction.status == "succeeded" {
            return first_image_url(&prediction.output);
        }
        debug!(
            "Prediction {} ended `{}`: {}",
            prediction.id,
            prediction.status,
            prediction.error_detail()
        );
        Err(ImageError::NoImage)
    }
}

fn parse_prediction(response: reqwest::blocking::Response) -> Result<Prediction, AdapterError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(AdapterError::HttpStatus { status, body });
    }
    Ok(response.json()?)
}

#[derive(Serialize)]
struct CreatePrediction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: ImageRequest,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: serde_json::Value,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    fn error_detail(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Null) | None => "no error detail".to_string(),
            Some(other) => other.to_string(),
        }
    }
}
