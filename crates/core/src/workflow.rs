//! End-to-end blog generation: credential checks, the content pipeline and
//! the cover image.

use thiserror::Error;

use crate::article::GeneratedArtifact;
use crate::credentials::{CredentialVerifier, Provider, VerificationError};
use crate::image::{ImageError, ImageGenerator};
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::LanguageModel;
use crate::pipeline::{ContentPipeline, GenerationError};
use crate::prompts::PromptRegistry;
use crate::search::SearchTool;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{provider} rejected the API key")]
    InvalidCredential { provider: Provider },
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Keys supplied for one generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub llm_provider: Provider,
    pub llm_api_key: String,
    /// `None` when image generation is off.
    pub replicate_token: Option<String>,
}

pub struct BlogWorkflow<'a> {
    pipeline: ContentPipeline<'a>,
    sink: &'a dyn LogSink,
}

impl<'a> BlogWorkflow<'a> {
    pub fn new(prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self {
            pipeline: ContentPipeline::new(prompts, sink),
            sink,
        }
    }

    pub fn with_search_tool(mut self, tool: &'a dyn SearchTool) -> Self {
        self.pipeline = self.pipeline.with_search_tool(tool);
        self
    }

    /// Checks the language-model key, then the Replicate token. Stops at the
    /// first key that is rejected or cannot be checked.
    pub fn verify_credentials<V: CredentialVerifier + ?Sized>(
        &self,
        verifier: &V,
        credentials: &Credentials,
    ) -> Result<(), WorkflowError> {
        self.verify_one(verifier, credentials.llm_provider, &credentials.llm_api_key)?;
        if let Some(token) = credentials.replicate_token.as_deref() {
            self.verify_one(verifier, Provider::Replicate, token)?;
        }
        Ok(())
    }

    fn verify_one<V: CredentialVerifier + ?Sized>(
        &self,
        verifier: &V,
        provider: Provider,
        key: &str,
    ) -> Result<(), WorkflowError> {
        self.log(LogLevel::Info, format!("Verifying {provider} API key..."));
        match verifier.verify(provider, key) {
            Ok(true) => {
                self.log(LogLevel::Info, format!("{provider} API key is valid."));
                Ok(())
            }
            Ok(false) => {
                self.log(LogLevel::Error, format!("{provider} rejected the API key."));
                Err(WorkflowError::InvalidCredential { provider })
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    format!("Could not verify the {provider} API key: {err}"),
                );
                Err(err.into())
            }
        }
    }

    /// Runs the four-stage pipeline, then asks `images` for a cover using
    /// the topic as prompt. Passing `None` skips the image.
    pub fn generate<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        images: Option<&dyn ImageGenerator>,
        topic: &str,
    ) -> Result<GeneratedArtifact, WorkflowError> {
        self.log(LogLevel::Info, format!("Generating blog content for `{topic}`."));
        let text = self.pipeline.run(model, topic)?;
        let mut artifact = GeneratedArtifact::new(topic, text);

        if let Some(images) = images {
            self.log(LogLevel::Info, "Generating cover image...");
            let url = images.generate(topic)?;
            self.log(LogLevel::Info, format!("Cover image ready: {url}"));
            artifact = artifact.with_image_url(url);
        }

        Ok(artifact)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message));
    }
}
