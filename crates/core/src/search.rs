use std::error::Error as StdError;
use std::fmt;

/// Observation handed back to the model when a search yields nothing.
pub const NO_SEARCH_RESULTS: &str = "No good search result found";

#[derive(Debug)]
pub struct SearchError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl SearchError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.inner
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl StdError for SearchError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// Web search capability offered to tool-enabled pipeline stages.
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn search(&self, query: &str) -> Result<String, SearchError>;
}
