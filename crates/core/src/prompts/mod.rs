//! Prompt templates with `{placeholder}` substitution.
//!
//! The built-in set is compiled in from `prompts/default.toml`. Directories
//! listed in [`PromptConfig`] are scanned afterwards (sorted by file name) and
//! any `.toml`, `.yaml` or `.yml` file there overrides templates by key.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::PromptConfig;

const BUILT_IN_PROMPTS: &str = include_str!("../../prompts/default.toml");

pub type PromptArguments = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

impl PromptSource {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::BuiltIn)
    }
}

#[derive(Clone, Debug)]
pub struct PromptTemplate {
    key: String,
    segments: Vec<Segment>,
    required: BTreeSet<String>,
    description: Option<String>,
    source: PromptSource,
}

impl PromptTemplate {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Renders the template. Required arguments must be present; optional
    /// placeholders without a value render as nothing.
    pub fn render(&self, arguments: &PromptArguments) -> Result<String, PromptError> {
        if let Some(missing) = self
            .required
            .iter()
            .find(|name| !arguments.contains_key(*name))
        {
            return Err(PromptError::MissingArgument {
                key: self.key.clone(),
                argument: missing.clone(),
            });
        }

        let rendered: String = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(name) => {
                    arguments.get(name).map(String::as_str).unwrap_or_default()
                }
            })
            .collect();
        Ok(rendered)
    }

    pub fn render_with<I, K, V>(&self, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: PromptArguments = arguments
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.render(&map)
    }

    fn compile(key: String, raw: RawPrompt, source: PromptSource) -> Result<Self, PromptError> {
        let segments = tokenize(&raw.template);
        let placeholders: BTreeSet<String> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();

        let required = if raw.required.is_empty() {
            placeholders
        } else {
            raw.required
                .into_iter()
                .map(|argument| {
                    let argument = argument.trim().to_string();
                    if placeholders.contains(&argument) {
                        Ok(argument)
                    } else {
                        Err(PromptError::InvalidRequired {
                            key: key.clone(),
                            argument,
                        })
                    }
                })
                .collect::<Result<_, _>>()?
        };

        Ok(Self {
            key,
            segments,
            required,
            description: raw.description,
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt `{0}` not found")]
    NotFound(String),
    #[error("missing argument `{argument}` when rendering prompt `{key}`")]
    MissingArgument { key: String, argument: String },
    #[error("failed to read prompt file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse built-in prompt definitions: {0}")]
    ParseBuiltIn(toml::de::Error),
    #[error("failed to parse prompt file `{path}` as TOML: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse prompt file `{path}` as YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("prompt `{key}` declares required argument `{argument}` that never appears in its template")]
    InvalidRequired { key: String, argument: String },
}

#[derive(Debug)]
pub struct PromptRegistry {
    prompts: BTreeMap<String, PromptTemplate>,
    directories: Vec<PathBuf>,
    hot_reload: bool,
}

impl PromptRegistry {
    pub fn new() -> Result<Self, PromptError> {
        Self::from_prompt_config(&PromptConfig::default())
    }

    pub fn from_prompt_config(config: &PromptConfig) -> Result<Self, PromptError> {
        Self::with_options(config.custom_directories.clone(), config.enable_hot_reload)
    }

    pub fn with_custom_directories<P: AsRef<Path>>(directories: &[P]) -> Result<Self, PromptError> {
        let dirs = directories
            .iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        Self::with_options(dirs, false)
    }

    pub fn hot_reload_enabled(&self) -> bool {
        self.hot_reload
    }

    pub fn reload(&mut self) -> Result<(), PromptError> {
        let mut prompts = BTreeMap::new();
        for template in parse_toml_document(BUILT_IN_PROMPTS, &PromptSource::BuiltIn)
            .map_err(PromptError::ParseBuiltIn)?
        {
            let template = template?;
            prompts.insert(template.key().to_string(), template);
        }
        for dir in &self.directories {
            load_directory(dir, &mut prompts)?;
        }
        self.prompts = prompts;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PromptTemplate> {
        self.prompts.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.prompts.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.prompts.keys().map(String::as_str)
    }

    pub fn format(&self, key: &str, args: &PromptArguments) -> Result<String, PromptError> {
        self.lookup(key)?.render(args)
    }

    pub fn format_with<I, K, V>(&self, key: &str, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.lookup(key)?.render_with(arguments)
    }

    fn lookup(&self, key: &str) -> Result<&PromptTemplate, PromptError> {
        self.get(key)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))
    }

    fn with_options(directories: Vec<PathBuf>, hot_reload: bool) -> Result<Self, PromptError> {
        let mut registry = Self {
            prompts: BTreeMap::new(),
            directories,
            hot_reload,
        };
        registry.reload()?;
        Ok(registry)
    }
}

fn load_directory(
    dir: &Path,
    prompts: &mut BTreeMap<String, PromptTemplate>,
) -> Result<(), PromptError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PromptError::Io { path, source }
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    for path in files {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if !matches!(ext.as_str(), "toml" | "yaml" | "yml") {
            continue;
        }

        let contents = fs::read_to_string(&path).map_err(io_error(&path))?;
        let origin = PromptSource::File(path.clone());
        let templates = if ext == "toml" {
            parse_toml_document(&contents, &origin).map_err(|source| PromptError::ParseToml {
                path: path.clone(),
                source,
            })?
        } else {
            let document: PromptDocument =
                serde_yaml::from_str(&contents).map_err(|source| PromptError::ParseYaml {
                    path: path.clone(),
                    source,
                })?;
            compile_document(document, &origin)
        };

        for template in templates {
            let template = template?;
            prompts.insert(template.key().to_string(), template);
        }
    }

    Ok(())
}

type Compiled = Result<PromptTemplate, PromptError>;

fn parse_toml_document(source: &str, origin: &PromptSource) -> Result<Vec<Compiled>, toml::de::Error> {
    let document: PromptDocument = toml::from_str(source)?;
    Ok(compile_document(document, origin))
}

fn compile_document(document: PromptDocument, origin: &PromptSource) -> Vec<Compiled> {
    document
        .prompts
        .into_iter()
        .map(|(key, raw)| PromptTemplate::compile(key, raw, origin.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct PromptDocument {
    #[serde(default)]
    prompts: BTreeMap<String, RawPrompt>,
}

#[derive(Debug, Deserialize)]
struct RawPrompt {
    #[serde(alias = "text")]
    template: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: Vec<String>,
}

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

fn tokenize(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        literal.push_str(&rest[..pos]);
        let brace = &rest[pos..];

        if brace.starts_with("{{") || brace.starts_with("}}") {
            literal.push_str(&brace[..1]);
            rest = &brace[2..];
            continue;
        }

        if brace.starts_with('}') {
            literal.push('}');
            rest = &brace[1..];
            continue;
        }

        match brace[1..].find('}') {
            Some(end) => {
                let name = brace[1..=end].trim();
                if name.is_empty() {
                    literal.push_str("{}");
                } else {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_string()));
                }
                rest = &brace[end + 2..];
            }
            None => {
                literal.push_str(brace);
                rest = "";
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
