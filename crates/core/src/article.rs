use serde::{Deserialize, Serialize};

/// Splits generated text on its first newline: the first line is the title,
/// everything after it is the body. Text without a newline is all title.
pub fn split_title(text: &str) -> (&str, &str) {
    match text.split_once('\n') {
        Some((title, body)) => (title, body),
        None => (text, ""),
    }
}

/// Result of one blog generation: the final rewrite plus an optional image.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub topic: String,
    pub text: String,
    pub image_url: Option<String>,
}

impl GeneratedArtifact {
    pub fn new(topic: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            text: text.into(),
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn title(&self) -> &str {
        split_title(&self.text).0
    }

    pub fn body(&self) -> &str {
        split_title(&self.text).1
    }
}
