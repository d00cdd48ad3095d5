use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;

use blog_core::export::image_extension;
use blog_core::ImageAttachment;

use crate::error::AdapterError;

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Fetches a generated image so it can be stored next to the exported post.
pub fn download_image(url: &str) -> Result<ImageAttachment, AdapterError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()?;

    debug!("GET {}", url);
    let response = client.get(url).send()?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(AdapterError::HttpStatus { status, body });
    }

    let bytes = response.bytes()?;
    if bytes.is_empty() {
        return Err(AdapterError::EmptyResponse);
    }

    Ok(ImageAttachment {
        bytes: bytes.to_vec(),
        extension: image_extension(url).to_string(),
    })
}
