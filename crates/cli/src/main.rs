mod logger;

use blog_adapters::{
    create_llm_adapter, download_image, AdapterError, DuckDuckGoSearch, HttpCredentialVerifier,
    ReplicateImageGenerator,
};
use blog_core::config::LlmConfig;
use blog_core::{
    BlogDocument, BlogWorkflow, ConfigStore, CredentialVerifier, Credentials, ExportError,
    ImageGenerator, LanguageModel, LanguageModelError, LevelFilterSink, LogLevel, LogRecord, LogSink,
    PromptError, PromptRegistry, Provider, SearchTool, SharedLogSink, StdoutLogSink,
    VerificationError, WorkflowError,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const TEST_PROMPT: &str = "Please reply 'OK'";

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let sink: SharedLogSink = Arc::new(LevelFilterSink::new(StdoutLogSink::new(), cli.log_level));
    logger::install(sink.clone(), cli.log_level);

    match cli.command {
        Command::Verify(args) => run_verify(&cli.config, args, sink.as_ref()),
        Command::Generate(args) => run_generate(&cli.config, args, sink.as_ref()),
        Command::Config(command) => handle_config(&cli.config, command, sink.as_ref()),
    }
}

fn handle_config(
    config_path: &Path,
    command: ConfigCommand,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    match command {
        ConfigCommand::TestLlm(args) => run_test_llm(config_path, args, sink),
    }
}

fn run_verify(config_path: &Path, args: VerifyArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let store = ConfigStore::open(config_path.to_path_buf())?;
    let config = store.config();

    let (stored_key, base_url) = if args.provider == Provider::Replicate {
        (config.image.api_token.clone(), config.image.base_url.clone())
    } else {
        config
            .profile_for_provider(args.provider)
            .map(|(_, profile)| (profile.api_key.clone(), profile.base_url.clone()))
            .unwrap_or_default()
    };
    let api_key = normalize_preference(args.api_key)
        .or_else(|| normalize_preference(Some(stored_key)))
        .ok_or(CliError::MissingApiKey {
            provider: args.provider,
        })?;

    let verifier = verifier_for(args.provider, &base_url)?;
    sink.log(LogRecord::new(
        LogLevel::Info,
        format!("Verifying {} API key...", args.provider),
    ));

    if verifier.verify(args.provider, &api_key)? {
        println!("Valid {} API key", args.provider);
        Ok(())
    } else {
        println!("Invalid {} API key", args.provider);
        Err(CliError::InvalidCredential {
            provider: args.provider,
        })
    }
}

fn run_generate(
    config_path: &Path,
    args: GenerateArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    let mut store = ConfigStore::open(config_path.to_path_buf())?;
    store.ensure_recent_defaults();

    let topic = normalize_preference(args.topic.clone())
        .or_else(|| normalize_preference(Some(store.config().blog.topic.clone())))
        .ok_or(CliError::MissingTopic)?;

    let (profile_name, mut profile) =
        select_llm_profile(&store, args.llm_profile.clone(), args.provider)?;
    if let Some(key) = normalize_preference(args.api_key.clone()) {
        profile.api_key = key;
    }
    if !profile.provider.is_text_provider() {
        return Err(CliError::NotATextProvider(profile.provider));
    }
    if !profile.has_api_key() {
        return Err(CliError::MissingApiKey {
            provider: profile.provider,
        });
    }

    let mut image_config = store.config().image.clone();
    if let Some(token) = normalize_preference(args.replicate_token.clone()) {
        image_config.api_token = token;
    }
    let with_image = !args.no_image;
    if with_image && image_config.api_token.trim().is_empty() {
        return Err(CliError::MissingApiKey {
            provider: Provider::Replicate,
        });
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(store.config().blog.output_dir.trim()));

    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;
    let search = if args.no_search || !store.config().search.enabled {
        None
    } else {
        Some(DuckDuckGoSearch::from_config(&store.config().search)?)
    };
    let images = if with_image {
        Some(ReplicateImageGenerator::from_config(&image_config)?)
    } else {
        None
    };

    let mut workflow = BlogWorkflow::new(&prompts, sink);
    if let Some(search) = search.as_ref() {
        workflow = workflow.with_search_tool(search as &dyn SearchTool);
    }

    if !args.skip_verify {
        let verifier = HttpCredentialVerifier::new()?
            .with_base_url(profile.provider, verification_base(profile.provider, &profile.base_url))
            .with_base_url(Provider::Replicate, image_config.base_url.clone());
        let credentials = Credentials {
            llm_provider: profile.provider,
            llm_api_key: profile.api_key.clone(),
            replicate_token: with_image.then(|| image_config.api_token.clone()),
        };
        workflow.verify_credentials(&verifier, &credentials)?;
    }

    sink.log(LogRecord::new(
        LogLevel::Info,
        format!(
            "Using {} model `{}` (profile `{}`)",
            profile.provider,
            profile.effective_model(),
            profile_name.as_deref().unwrap_or("command line")
        ),
    ));

    let model = create_llm_adapter(&profile)?;
    let artifact = workflow.generate(
        model.as_ref(),
        images.as_ref().map(|images| images as &dyn ImageGenerator),
        &topic,
    )?;

    println!("{}", artifact.title());
    if let Some(url) = &artifact.image_url {
        println!("Image: {url}");
    }
    println!();
    println!("{}", artifact.body());
    println!();

    let attachment = match artifact.image_url.as_deref() {
        Some(url) => match download_image(url) {
            Ok(attachment) => Some(attachment),
            Err(err) => {
                sink.log(LogRecord::new(
                    LogLevel::Warn,
                    format!("Could not download the cover image, linking it instead: {err}"),
                ));
                None
            }
        },
        None => None,
    };

    let files = BlogDocument::from_artifact(&artifact).write_to(&output_dir, attachment.as_ref())?;
    println!("Saved {}", files.document.display());
    if let Some(image) = &files.image {
        println!("Saved {}", image.display());
    }

    if let Some(name) = profile_name {
        store.touch_llm_profile(name);
        store.save()?;
    }

    Ok(())
}

fn run_test_llm(config_path: &Path, args: TestLlmArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let mut store = ConfigStore::open(config_path.to_path_buf())?;
    store.ensure_recent_defaults();

    let (selected, profile) = select_llm_profile(&store, args.llm_profile, None)?;
    let selected = selected.ok_or(CliError::MissingLlmProfile)?;

    sink.log(LogRecord::new(
        LogLevel::Info,
        format!("Testing LLM profile `{selected}`"),
    ));
    sink.log(LogRecord::new(
        LogLevel::Debug,
        format!(
            "Provider: {} | Model: {} | Base URL: {}",
            profile.provider,
            profile.effective_model(),
            profile.base_url
        ),
    ));

    let adapter = create_llm_adapter(&profile)?;
    sink.log(LogRecord::new(
        LogLevel::Info,
        format!("Sending test prompt: {TEST_PROMPT}"),
    ));

    match adapter.invoke(TEST_PROMPT) {
        Ok(response) => {
            if response.trim().is_empty() {
                sink.log(LogRecord::new(
                    LogLevel::Error,
                    "LLM test failed: empty response".to_string(),
                ));
                return Err(CliError::TestFailed(
                    "LLM test failed: empty response".to_string(),
                ));
            }

            sink.log(LogRecord::new(LogLevel::Info, "LLM test succeeded.".to_string()));
            sink.log(LogRecord::new(
                LogLevel::Debug,
                format!("Test reply: {response}"),
            ));
        }
        Err(err) => {
            sink.log(LogRecord::new(
                LogLevel::Error,
                format!("LLM test failed: {err}"),
            ));
            return Err(CliError::Model(err));
        }
    }

    store.touch_llm_profile(selected);
    store.save()?;

    Ok(())
}

/// Picks the profile to use: an explicit name, then the first profile for an
/// explicit provider, then the most recent profile, then the first one. A
/// provider with no stored profile gets a fresh default one.
fn select_llm_profile(
    store: &ConfigStore,
    preferred: Option<String>,
    provider: Option<Provider>,
) -> Result<(Option<String>, LlmConfig), CliError> {
    let config = store.config();

    if let Some(name) = normalize_preference(preferred) {
        return config
            .get_llm_profile(&name)
            .cloned()
            .map(|profile| (Some(name.clone()), profile))
            .ok_or(CliError::UnknownProfile(name));
    }

    if let Some(provider) = provider {
        return Ok(match config.profile_for_provider(provider) {
            Some((name, profile)) => (Some(name.clone()), profile.clone()),
            None => (None, LlmConfig::for_provider(provider)),
        });
    }

    let name = store
        .last_llm_profile()
        .map(str::to_string)
        .or_else(|| config.llm_profiles.keys().next().cloned())
        .ok_or(CliError::MissingLlmProfile)?;
    let profile = config
        .get_llm_profile(&name)
        .cloned()
        .ok_or_else(|| CliError::UnknownProfile(name.clone()))?;
    Ok((Some(name), profile))
}

fn verifier_for(provider: Provider, base_url: &str) -> Result<HttpCredentialVerifier, CliError> {
    Ok(HttpCredentialVerifier::new()?.with_base_url(provider, verification_base(provider, base_url)))
}

/// Gemini generation runs on `v1beta` while keys are checked against `v1`,
/// so only an explicitly configured non-Gemini base is reused for checks.
fn verification_base(provider: Provider, base_url: &str) -> String {
    match provider {
        Provider::Gemini => String::new(),
        _ => base_url.trim().to_string(),
    }
}

fn normalize_preference(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[derive(Debug, Error)]
enum CliError {
    #[error("config file error: {0}")]
    Config(#[from] blog_core::ConfigError),
    #[error("no LLM profile is configured; add one to the config file or pass --provider")]
    MissingLlmProfile,
    #[error("no LLM profile named `{0}`")]
    UnknownProfile(String),
    #[error("{0} cannot generate blog text; pick gemini, openai or groq")]
    NotATextProvider(Provider),
    #[error("no {provider} API key; pass it on the command line or store it in the config file")]
    MissingApiKey { provider: Provider },
    #[error("no blog topic; pass --topic or set blog.topic in the config file")]
    MissingTopic,
    #[error("invalid {provider} API key")]
    InvalidCredential { provider: Provider },
    #[error("credential check failed: {0}")]
    Verification(#[from] VerificationError),
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("LLM call failed: {0}")]
    Model(#[from] LanguageModelError),
    #[error("failed to load prompts: {0}")]
    Prompt(#[from] PromptError),
    #[error("blog generation failed: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("{0}")]
    TestFailed(String),
}

#[derive(Parser)]
#[command(
    name = "blogctl",
    version,
    about = "AI blog generator: research, draft, review and rewrite a post with a cover image"
)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Minimum level of log lines to print (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check an API key against its provider
    Verify(VerifyArgs),
    /// Generate a blog post and export it as Markdown
    Generate(GenerateArgs),
    /// Config related operations
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Send a test prompt through an LLM profile
    TestLlm(TestLlmArgs),
}

#[derive(Args)]
struct VerifyArgs {
    /// gemini, openai, groq or replicate
    #[arg(long)]
    provider: Provider,

    /// Key to check; defaults to the one stored in the config file
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Blog topic; defaults to blog.topic from the config file
    #[arg(long)]
    topic: Option<String>,

    /// LLM profile name; defaults to the most recently used profile
    #[arg(long)]
    llm_profile: Option<String>,

    /// Use this text provider when no profile is named
    #[arg(long)]
    provider: Option<Provider>,

    /// Override the profile's API key
    #[arg(long)]
    api_key: Option<String>,

    /// Override the Replicate API token
    #[arg(long)]
    replicate_token: Option<String>,

    /// Directory for the exported post; defaults to blog.output_dir
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Skip cover image generation
    #[arg(long)]
    no_image: bool,

    /// Do not offer web search to the research stage
    #[arg(long)]
    no_search: bool,

    /// Skip the API key checks before generating
    #[arg(long)]
    skip_verify: bool,
}

#[derive(Args)]
struct TestLlmArgs {
    /// Profile to test; defaults to the most recently used profile
    #[arg(long)]
    llm_profile: Option<String>,
}
