use std::fmt;

/// Tool-call ceiling for agents that do not set their own.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AgentRole {
    Researcher,
    Writer,
    Reviewer,
}

impl AgentRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Writer => "Writer",
            Self::Reviewer => "Reviewer",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A persona the pipeline speaks through. Agents hold no state between
/// calls; the model client is supplied per run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Agent {
    pub role: AgentRole,
    pub title: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
    /// Tool calls allowed per stage before a final answer is demanded. Only
    /// read when the stage is offered a tool, which the built-in plan does for
    /// research alone.
    pub max_iterations: usize,
}

impl Agent {
    pub fn researcher() -> Self {
        Self {
            role: AgentRole::Researcher,
            title: "Blog Content Researcher",
            goal: "Conduct thorough research to uncover compelling insights for engaging blog content.",
            backstory: "An experienced content strategist with a knack for analyzing trends and audience behavior, delivering actionable insights for high-quality blog content.",
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn writer() -> Self {
        Self {
            role: AgentRole::Writer,
            title: "Blog Writer",
            goal: "Craft authoritative and engaging blog content that resonates with the audience and establishes the brand as a leader.",
            backstory: "A seasoned writer known for distilling complex topics into captivating stories, with a deep understanding of audience psychology.",
            max_iterations: 5,
        }
    }

    pub fn reviewer() -> Self {
        Self {
            role: AgentRole::Reviewer,
            title: "Content Reviewer",
            goal: "Review and refine blog drafts to ensure they meet high standards of quality and impact.",
            backstory: "An expert editor with a meticulous eye for detail, known for elevating content to publication-ready standards.",
            max_iterations: 5,
        }
    }

    pub fn for_role(role: AgentRole) -> Self {
        match role {
            AgentRole::Researcher => Self::researcher(),
            AgentRole::Writer => Self::writer(),
            AgentRole::Reviewer => Self::reviewer(),
        }
    }
}
