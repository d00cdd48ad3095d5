use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct LanguageModelError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl LanguageModelError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            inner: message.into(),
        }
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.inner
    }

    pub fn as_inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl fmt::Display for LanguageModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl StdError for LanguageModelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// A blocking text-completion client. One call, one prompt, one reply.
pub trait LanguageModel: Send + Sync {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        (**self).invoke(prompt)
    }
}

impl<M: LanguageModel + ?Sized> LanguageModel for &M {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        (**self).invoke(prompt)
    }
}
