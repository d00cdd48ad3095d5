use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header;

use blog_core::{CredentialVerifier, Provider, VerificationError};

use crate::error::AdapterError;

const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 30;

/// Checks API keys by listing the provider's models.
pub struct HttpCredentialVerifier {
    client: Client,
    base_urls: HashMap<Provider, String>,
}

impl HttpCredentialVerifier {
    pub fn new() -> Result<Self, AdapterError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_VERIFY_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AdapterError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_urls: HashMap::new(),
        })
    }

    /// Sends `provider`'s checks to `base_url` instead of the public API.
    pub fn with_base_url(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            self.base_urls.remove(&provider);
        } else {
            self.base_urls.insert(provider, base_url);
        }
        self
    }
}

impl CredentialVerifier for HttpCredentialVerifier {
    fn verify(&self, provider: Provider, api_key: &str) -> Result<bool, VerificationError> {
        let request = provider.verification_request(
            self.base_urls.get(&provider).map(String::as_str),
            api_key,
        )?;
        debug!("Verifying {} key against {}", provider, request.url);

        let mut builder = self.client.get(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(authorization) = &request.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }

        let response = builder
            .send()
            .map_err(|err| VerificationError::transport(provider, err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| VerificationError::transport(provider, err))?;
        debug!("{} key check answered with status {}", provider, status);

        provider.classify_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn verifier(provider: Provider, server: &mockito::Server) -> HttpCredentialVerifier {
        HttpCredentialVerifier::with_timeout(Duration::from_secs(5))
            .unwrap()
            .with_base_url(provider, server.url())
    }

    #[test]
    fn accepted_key_is_valid() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/models")
            .match_header("authorization", "Bearer sk-good")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create();

        let valid = verifier(Provider::OpenAi, &server)
            .verify(Provider::OpenAi, "sk-good")
            .unwrap();
        assert!(valid);
        mock.assert();
    }

    #[test]
    fn unauthorized_key_is_invalid() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/models")
            .match_header("authorization", "Token r8-bad")
            .with_status(401)
            .with_body(r#"{"detail":"Invalid token."}"#)
            .create();

        let valid = verifier(Provider::Replicate, &server)
            .verify(Provider::Replicate, "r8-bad")
            .unwrap();
        assert!(!valid);
        mock.assert();
    }

    #[test]
    fn server_error_is_not_reported_as_invalid() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/models")
            .with_status(500)
            .with_body("upstream down")
            .create();

        let err = verifier(Provider::Groq, &server)
            .verify(Provider::Groq, "gsk-key")
            .unwrap_err();
        assert!(matches!(
            err,
            VerificationError::UnexpectedStatus { status: 500, .. }
        ));
        mock.assert();
    }

    #[test]
    fn gemini_key_travels_in_the_query() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/models")
            .match_query(Matcher::UrlEncoded("key".into(), "AIza-bad".into()))
            .with_status(400)
            .with_body(r#"{"error":{"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#)
            .create();

        let valid = verifier(Provider::Gemini, &server)
            .verify(Provider::Gemini, "AIza-bad")
            .unwrap();
        assert!(!valid);
        mock.assert();
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let verifier = HttpCredentialVerifier::with_timeout(Duration::from_secs(2))
            .unwrap()
            .with_base_url(Provider::OpenAi, "http://127.0.0.1:9");
        let err = verifier.verify(Provider::OpenAi, "sk-any").unwrap_err();
        assert!(matches!(err, VerificationError::Transport { .. }));
    }

    #[test]
    fn empty_key_never_reaches_the_network() {
        let verifier = HttpCredentialVerifier::new()
            .unwrap()
            .with_base_url(Provider::OpenAi, "http://127.0.0.1:9");
        let err = verifier.verify(Provider::OpenAi, "  ").unwrap_err();
        assert!(matches!(err, VerificationError::EmptyKey { .. }));
    }
}
