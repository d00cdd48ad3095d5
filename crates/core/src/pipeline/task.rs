use std::fmt;

use crate::prompts::PromptRegistry;

use super::agent::AgentRole;
use super::GenerationError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Research,
    Draft,
    Review,
    FinalRewrite,
}

impl Stage {
    /// Execution order. Never reordered.
    pub const ALL: [Stage; 4] = [
        Stage::Research,
        Stage::Draft,
        Stage::Review,
        Stage::FinalRewrite,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Draft => "draft",
            Self::Review => "review",
            Self::FinalRewrite => "final rewrite",
        }
    }

    /// 1-based position in the run.
    pub fn position(&self) -> usize {
        match self {
            Self::Research => 1,
            Self::Draft => 2,
            Self::Review => 3,
            Self::FinalRewrite => 4,
        }
    }

    pub fn agent(&self) -> AgentRole {
        match self {
            Self::Research => AgentRole::Researcher,
            Self::Draft | Self::FinalRewrite => AgentRole::Writer,
            Self::Review => AgentRole::Reviewer,
        }
    }

    pub fn uses_search(&self) -> bool {
        matches!(self, Self::Research)
    }

    /// Stages whose output is fed into this stage's prompt.
    pub fn context_stages(&self) -> &'static [Stage] {
        match self {
            Self::Research => &[],
            Self::Draft => &[Stage::Research],
            Self::Review => &[Stage::Research, Stage::Draft],
            Self::FinalRewrite => &[Stage::Research, Stage::Draft, Stage::Review],
        }
    }

    fn prompt_keys(&self) -> (&'static str, &'static str) {
        match self {
            Self::Research => ("research_task", "research_rubric"),
            Self::Draft => ("draft_task", "draft_rubric"),
            Self::Review => ("review_task", "review_rubric"),
            Self::FinalRewrite => ("final_task", "final_rubric"),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One unit of work: what to do, what the answer must contain, and whether
/// the search tool is offered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub stage: Stage,
    pub agent: AgentRole,
    pub description: String,
    pub expected_output: String,
    pub uses_search: bool,
}

impl Task {
    pub fn for_stage(
        prompts: &PromptRegistry,
        stage: Stage,
        topic: &str,
    ) -> Result<Self, GenerationError> {
        let (task_key, rubric_key) = stage.prompt_keys();
        let render = |key: &str| {
            prompts
                .format_with(key, [("topic", topic)])
                .map_err(|source| GenerationError::Prompt { stage, source })
        };

        Ok(Self {
            stage,
            agent: stage.agent(),
            description: render(task_key)?,
            expected_output: render(rubric_key)?,
            uses_search: stage.uses_search(),
        })
    }
}

/// The four tasks of a run, in execution order.
pub fn plan_tasks(prompts: &PromptRegistry, topic: &str) -> Result<Vec<Task>, GenerationError> {
    Stage::ALL
        .iter()
        .map(|stage| Task::for_stage(prompts, *stage, topic))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_grows_with_each_stage() {
        assert!(Stage::Research.context_stages().is_empty());
        assert_eq!(Stage::Draft.context_stages(), &[Stage::Research]);
        assert_eq!(
            Stage::FinalRewrite.context_stages(),
            &[Stage::Research, Stage::Draft, Stage::Review]
        );
    }

    #[test]
    fn writer_handles_draft_and_rewrite() {
        assert_eq!(Stage::Draft.agent(), AgentRole::Writer);
        assert_eq!(Stage::FinalRewrite.agent(), AgentRole::Writer);
        assert_eq!(Stage::Review.agent(), AgentRole::Reviewer);
        assert!(Stage::ALL
            .iter()
            .filter(|stage| stage.uses_search())
            .eq([Stage::Research].iter()));
    }

    #[test]
    fn plan_interpolates_topic_everywhere() {
        let prompts = PromptRegistry::new().unwrap();
        let tasks = plan_tasks(&prompts, "quantum networking").unwrap();
        let stages: Vec<Stage> = tasks.iter().map(|task| task.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        for task in &tasks {
            assert!(
                task.description.contains("quantum networking"),
                "{} description lacks topic",
                task.stage
            );
        }
        assert!(tasks[0].expected_output.contains("quantum networking"));
        assert!(tasks[3].expected_output.contains("at least 1000 words"));
    }
}
