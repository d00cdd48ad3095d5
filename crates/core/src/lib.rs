pub mod article;
pub mod config;
pub mod credentials;
pub mod export;
pub mod image;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod search;
pub mod workflow;

pub use article::{split_title, GeneratedArtifact};
pub use config::{
    BlogConfig, Config, ConfigError, ConfigStore, ImageConfig, LlmConfig, PromptConfig,
    RecentUsage, SearchConfig,
};
pub use credentials::{
    AuthScheme, CredentialVerifier, Provider, UnknownProvider, VerificationError,
    VerificationRequest,
};
pub use export::{BlogDocument, ExportError, ExportedFiles, ImageAttachment};
pub use image::{ImageError, ImageGenerator, ImageRequest};
pub use logging::{
    LevelFilterSink, LogLevel, LogRecord, LogSink, NullLogSink, SharedLogSink, StdoutLogSink,
    VecLogSink,
};
pub use model::{LanguageModel, LanguageModelError};
pub use pipeline::{
    plan_tasks, Agent, AgentRole, ContentPipeline, GenerationError, PipelineReport, Stage,
    StageOutput, Task,
};
pub use prompts::{PromptArguments, PromptError, PromptRegistry, PromptSource, PromptTemplate};
pub use search::{SearchError, SearchTool, NO_SEARCH_RESULTS};
pub use workflow::{BlogWorkflow, Credentials, WorkflowError};
