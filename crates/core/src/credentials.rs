//! Provider catalogue and the rules for deciding whether an API key is valid.
//!
//! The HTTP call itself lives in the adapters crate; this module only knows
//! where each provider's model-list endpoint is, how the key is attached and
//! how a response status maps onto "valid", "invalid" or "could not verify".

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Groq,
    Replicate,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Gemini,
        Provider::OpenAi,
        Provider::Groq,
        Provider::Replicate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
            Self::Groq => "Groq",
            Self::Replicate => "Replicate",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Replicate => "replicate",
        }
    }

    /// Whether the provider can back the text pipeline. Replicate only hosts
    /// the image model here.
    pub fn is_text_provider(&self) -> bool {
        !matches!(self, Self::Replicate)
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("gemini-1.5-flash"),
            Self::OpenAi => Some("gpt-4-turbo"),
            Self::Groq => Some("llama3-70b-8192"),
            Self::Replicate => None,
        }
    }

    pub fn verification_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Replicate => "https://api.replicate.com/v1",
        }
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            Self::Gemini => AuthScheme::QueryKey,
            Self::OpenAi | Self::Groq => AuthScheme::Bearer,
            Self::Replicate => AuthScheme::Token,
        }
    }

    /// Builds the model-list request used to check `api_key`. `base_url`
    /// replaces the provider's public endpoint when set.
    pub fn verification_request(
        &self,
        base_url: Option<&str>,
        api_key: &str,
    ) -> Result<VerificationRequest, VerificationError> {
        let key = api_key.trim();
        if key.is_empty() {
            return Err(VerificationError::EmptyKey { provider: *self });
        }

        let base = base_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.verification_base_url());
        let url = format!("{}/models", base.trim_end_matches('/'));

        let (query, authorization) = match self.auth_scheme() {
            AuthScheme::QueryKey => (vec![("key", key.to_string())], None),
            AuthScheme::Bearer => (Vec::new(), Some(format!("Bearer {key}"))),
            AuthScheme::Token => (Vec::new(), Some(format!("Token {key}"))),
        };

        Ok(VerificationRequest {
            provider: *self,
            url,
            query,
            authorization,
        })
    }

    /// Maps a verification response onto `Ok(true)` / `Ok(false)`. Statuses
    /// that say nothing about the key are reported as errors.
    pub fn classify_response(&self, status: u16, body: &str) -> Result<bool, VerificationError> {
        match status {
            200..=299 => Ok(true),
            401 | 403 => Ok(false),
            400 if *self == Self::Gemini && body.contains("API_KEY_INVALID") => Ok(false),
            _ => Err(VerificationError::UnexpectedStatus {
                provider: *self,
                status,
                body: truncate_body(body),
            }),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("unknown provider `{0}` (expected gemini, openai, groq or replicate)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|provider| provider.key() == normalized)
            .ok_or(UnknownProvider(s.trim().to_string()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthScheme {
    /// `?key=<key>` query parameter.
    QueryKey,
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `Authorization: Token <key>`.
    Token,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationRequest {
    pub provider: Provider,
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub authorization: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("{provider} API key is empty")]
    EmptyKey { provider: Provider },
    #[error("could not reach {provider} to verify the API key: {source}")]
    Transport {
        provider: Provider,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("{provider} answered the key check with unexpected status {status}: {body}")]
    UnexpectedStatus {
        provider: Provider,
        status: u16,
        body: String,
    },
}

impl VerificationError {
    pub fn transport<E>(provider: Provider, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport {
            provider,
            source: Box::new(error),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            Self::EmptyKey { provider }
            | Self::Transport { provider, .. }
            | Self::UnexpectedStatus { provider, .. } => *provider,
        }
    }
}

/// Checks a key against its provider. `Ok(false)` means the provider
/// rejected the key; every other failure is an `Err`.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, provider: Provider, api_key: &str) -> Result<bool, VerificationError>;
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_bearer_request_for_openai() {
        let request = Provider::OpenAi
            .verification_request(None, " sk-test ")
            .unwrap();
        assert_eq!(request.url, "https://api.openai.com/v1/models");
        assert_eq!(request.authorization.as_deref(), Some("Bearer sk-test"));
        assert!(request.query.is_empty());
    }

    #[test]
    fn gemini_key_travels_as_query_parameter() {
        let request = Provider::Gemini
            .verification_request(Some("http://127.0.0.1:9000/"), "g-key")
            .unwrap();
        assert_eq!(request.url, "http://127.0.0.1:9000/models");
        assert_eq!(request.query, vec![("key", "g-key".to_string())]);
        assert!(request.authorization.is_none());
    }

    #[test]
    fn replicate_uses_token_scheme() {
        let request = Provider::Replicate
            .verification_request(None, "r8_abc")
            .unwrap();
        assert_eq!(request.url, "https://api.replicate.com/v1/models");
        assert_eq!(request.authorization.as_deref(), Some("Token r8_abc"));
    }

    #[test]
    fn empty_key_is_rejected_before_any_request() {
        let err = Provider::Groq.verification_request(None, "   ").unwrap_err();
        assert!(matches!(
            err,
            VerificationError::EmptyKey {
                provider: Provider::Groq
            }
        ));
    }

    #[test]
    fn status_classification_separates_invalid_from_unverifiable() {
        for provider in Provider::ALL {
            assert!(provider.classify_response(200, "").unwrap());
            assert!(!provider.classify_response(401, "").unwrap());
            assert!(!provider.classify_response(403, "").unwrap());
            let err = provider.classify_response(500, "boom").unwrap_err();
            assert!(matches!(
                err,
                VerificationError::UnexpectedStatus { status: 500, .. }
            ));
        }
    }

    #[test]
    fn gemini_reports_bad_keys_as_bad_request() {
        let body = r#"{"error":{"code":400,"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert!(!Provider::Gemini.classify_response(400, body).unwrap());
        assert!(Provider::OpenAi.classify_response(400, body).is_err());
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!(" groq".parse::<Provider>(), Ok(Provider::Groq));
        assert!("cohere".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serializes_to_lowercase_key() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let parsed: Provider = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, Provider::Gemini);
    }
}
