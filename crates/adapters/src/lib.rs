mod base_url;
mod download;
mod error;
mod llm;
mod replicate;
mod retry;
mod search;
mod verify;

pub use base_url::{ensure_openai_base_url_has_v1, resolve_base_url};
pub use download::download_image;
pub use error::AdapterError;
pub use llm::{create_llm_adapter, create_llm_adapter_from_config};
pub use replicate::ReplicateImageGenerator;
pub use retry::{call_with_retry, RetryConfig};
pub use search::{
    format_hits, parse_results, DuckDuckGoSearch, SearchHit, SEARCH_TOOL_DESCRIPTION,
    SEARCH_TOOL_NAME,
};
pub use verify::HttpCredentialVerifier;

pub use blog_core::config::{Config, ConfigStore, ImageConfig, LlmConfig, SearchConfig};
pub use blog_core::{LanguageModel, LanguageModelError};
