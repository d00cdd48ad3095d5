//! The four-stage content pipeline: research, draft, review, final rewrite.
//!
//! Stages run strictly one after another. Every stage after the first sees
//! the raw output of all earlier stages, so stage N cannot start before stage
//! N-1 has finished. The run owns its context buffer; nothing carries over
//! between runs.

use thiserror::Error;

use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::{LanguageModel, LanguageModelError};
use crate::prompts::{PromptError, PromptRegistry};
use crate::search::{SearchTool, NO_SEARCH_RESULTS};

mod agent;
mod task;
mod tools;

pub use agent::{Agent, AgentRole, DEFAULT_MAX_ITERATIONS};
pub use task::{plan_tasks, Stage, Task};

use tools::{parse_reply, strip_hallucinated_observation, AgentReply};

/// Separator placed between earlier stage outputs in the shared context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("blog topic must not be empty")]
    EmptyTopic,
    #[error("failed to render prompt for the {stage} stage: {source}")]
    Prompt {
        stage: Stage,
        #[source]
        source: PromptError,
    },
    #[error("language model call failed during the {stage} stage: {source}")]
    Model {
        stage: Stage,
        #[source]
        source: LanguageModelError,
    },
    #[error("the {stage} stage produced no text")]
    EmptyResponse { stage: Stage },
}

impl GenerationError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::EmptyTopic => None,
            Self::Prompt { stage, .. }
            | Self::Model { stage, .. }
            | Self::EmptyResponse { stage } => Some(*stage),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageOutput {
    pub stage: Stage,
    pub text: String,
}

/// Every stage's output from one completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    pub topic: String,
    pub outputs: Vec<StageOutput>,
}

impl PipelineReport {
    pub fn output(&self, stage: Stage) -> Option<&str> {
        self.outputs
            .iter()
            .find(|output| output.stage == stage)
            .map(|output| output.text.as_str())
    }

    pub fn final_text(&self) -> Option<&str> {
        self.output(Stage::FinalRewrite)
    }

    pub fn into_final_text(self) -> Option<String> {
        self.outputs
            .into_iter()
            .find(|output| output.stage == Stage::FinalRewrite)
            .map(|output| output.text)
    }
}

#[derive(Default)]
struct RunContext {
    outputs: Vec<StageOutput>,
}

impl RunContext {
    fn context_for(&self, stage: Stage) -> String {
        stage
            .context_stages()
            .iter()
            .filter_map(|earlier| {
                self.outputs
                    .iter()
                    .find(|output| output.stage == *earlier)
                    .map(|output| output.text.as_str())
            })
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }
}

pub struct ContentPipeline<'a> {
    prompts: &'a PromptRegistry,
    sink: &'a dyn LogSink,
    search: Option<&'a dyn SearchTool>,
}

impl<'a> ContentPipeline<'a> {
    pub fn new(prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self {
            prompts,
            sink,
            search: None,
        }
    }

    pub fn with_search_tool(mut self, tool: &'a dyn SearchTool) -> Self {
        self.search = Some(tool);
        self
    }

    /// Runs all four stages and returns the final rewrite exactly as the
    /// model produced it.
    pub fn run<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        topic: &str,
    ) -> Result<String, GenerationError> {
        let report = self.run_detailed(model, topic)?;
        report
            .into_final_text()
            .ok_or(GenerationError::EmptyResponse {
                stage: Stage::FinalRewrite,
            })
    }

    pub fn run_detailed<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        topic: &str,
    ) -> Result<PipelineReport, GenerationError> {
        if topic.trim().is_empty() {
            return Err(GenerationError::EmptyTopic);
        }

        let tasks = plan_tasks(self.prompts, topic)?;
        let mut run = RunContext::default();

        for task in &tasks {
            let agent = Agent::for_role(task.agent);
            self.log(
                LogLevel::Info,
                format!(
                    "Stage {}/{}: {} ({})",
                    task.stage.position(),
                    Stage::ALL.len(),
                    task.stage,
                    agent.title
                ),
            );

            let context = run.context_for(task.stage);
            let text = self.execute_stage(model, &agent, task, &context)?;
            self.log(
                LogLevel::Info,
                format!(
                    "{} stage finished ({} characters).",
                    task.stage,
                    text.chars().count()
                ),
            );
            run.outputs.push(StageOutput {
                stage: task.stage,
                text,
            });
        }

        Ok(PipelineReport {
            topic: topic.to_string(),
            outputs: run.outputs,
        })
    }

    fn execute_stage<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        agent: &Agent,
        task: &Task,
        context: &str,
    ) -> Result<String, GenerationError> {
        let tool = if task.uses_search { self.search } else { None };
        let mut scratchpad = String::new();
        let mut tool_calls = 0usize;

        loop {
            let force_final = tool.is_some() && tool_calls >= agent.max_iterations;
            let offered_tool = if force_final { None } else { tool };
            let prompt =
                self.compose_prompt(agent, task, context, offered_tool, &scratchpad, force_final)?;
            self.log(
                LogLevel::Debug,
                format!("Prompt for the {} stage:\n{}", task.stage, prompt),
            );

            let response = model
                .invoke(&prompt)
                .map_err(|source| GenerationError::Model {
                    stage: task.stage,
                    source,
                })?;
            self.log(
                LogLevel::Debug,
                format!("Response for the {} stage:\n{}", task.stage, response),
            );

            // Stages without a tool never see the reply protocol; their text is kept verbatim.
            let output = if tool.is_none() {
                response
            } else {
                match (offered_tool, parse_reply(&response)) {
                    (Some(tool), AgentReply::Action { tool: name, input }) => {
                        tool_calls += 1;
                        let observation = self.observe(tool, &name, &input, task.stage);
                        scratchpad.push_str(strip_hallucinated_observation(&response));
                        scratchpad.push_str("\nObservation: ");
                        scratchpad.push_str(&observation);
                        scratchpad.push_str("\n\n");
                        continue;
                    }
                    (_, AgentReply::Final(text)) => text,
                    (None, AgentReply::Action { .. }) => response,
                }
            };

            if output.trim().is_empty() {
                self.log(
                    LogLevel::Error,
                    format!("The {} stage returned empty content.", task.stage),
                );
                return Err(GenerationError::EmptyResponse { stage: task.stage });
            }
            return Ok(output);
        }
    }

    fn compose_prompt(
        &self,
        agent: &Agent,
        task: &Task,
        context: &str,
        tool: Option<&dyn SearchTool>,
        scratchpad: &str,
        force_final: bool,
    ) -> Result<String, GenerationError> {
        let stage = task.stage;
        let prompt_error = |source| GenerationError::Prompt { stage, source };

        let mut sections = vec![
            self.prompts
                .format_with(
                    "agent_persona",
                    [
                        ("role", agent.title),
                        ("goal", agent.goal),
                        ("backstory", agent.backstory),
                    ],
                )
                .map_err(prompt_error)?,
            self.prompts
                .format_with(
                    "task_prompt",
                    [
                        ("description", task.description.as_str()),
                        ("expected_output", task.expected_output.as_str()),
                    ],
                )
                .map_err(prompt_error)?,
        ];

        if !context.is_empty() {
            sections.push(
                self.prompts
                    .format_with("task_context", [("context", context)])
                    .map_err(prompt_error)?,
            );
        }

        if let Some(tool) = tool {
            sections.push(
                self.prompts
                    .format_with(
                        "tool_instructions",
                        [
                            ("tool_name", tool.name()),
                            ("tool_description", tool.description()),
                        ],
                    )
                    .map_err(prompt_error)?,
            );
        }

        if !scratchpad.is_empty() {
            sections.push(
                self.prompts
                    .format_with("tool_scratchpad", [("scratchpad", scratchpad.trim_end())])
                    .map_err(prompt_error)?,
            );
        }

        if force_final {
            sections.push(
                self.prompts
                    .format("force_final_answer", &Default::default())
                    .map_err(prompt_error)?,
            );
        }

        Ok(sections.join("\n\n"))
    }

    fn observe(&self, tool: &dyn SearchTool, requested: &str, query: &str, stage: Stage) -> String {
        if !requested.trim().eq_ignore_ascii_case(tool.name()) {
            self.log(
                LogLevel::Warn,
                format!(
                    "The {stage} stage asked for unknown tool `{requested}`; only `{}` is available.",
                    tool.name()
                ),
            );
            return format!(
                "Tool `{requested}` does not exist. The only available tool is `{}`.",
                tool.name()
            );
        }

        self.log(LogLevel::Info, format!("Searching the web: {query}"));
        match tool.search(query) {
            Ok(result) if result.trim().is_empty() => NO_SEARCH_RESULTS.to_string(),
            Ok(result) => result,
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    format!("Search for `{query}` failed during the {stage} stage: {err}"),
                );
                format!("Search failed: {err}")
            }
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message.into()));
    }
}
