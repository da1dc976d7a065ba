use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use negotiator_types::{NegotiatorError, Result};

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

/// The single capability pipeline stages need from a model: text in, text out.
///
/// Implementations are shared across stages behind an `Arc`, so they must be
/// usable through `&self`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Returns pre-configured responses in order and records every prompt.
///
/// Running past the end of the script is an error, which makes an unexpected
/// extra generation call visible in tests.
pub struct ScriptedGenerator {
    responses: Vec<String>,
    cursor: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `generate` calls made so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.responses.get(idx).cloned().ok_or_else(|| {
            NegotiatorError::Other(format!(
                "scripted generator exhausted after {} responses",
                self.responses.len()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// FixedGenerator
// ---------------------------------------------------------------------------

/// Returns the same text for every prompt.
pub struct FixedGenerator {
    text: String,
    calls: AtomicUsize,
}

impl FixedGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

// ---------------------------------------------------------------------------
// RoutedGenerator
// ---------------------------------------------------------------------------

/// Picks a canned response by the first marker found in the prompt.
///
/// Used for offline runs, where each stage's prompt carries a distinct
/// heading the route can key on.
pub struct RoutedGenerator {
    routes: Vec<(String, String)>,
    fallback: String,
}

impl RoutedGenerator {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            fallback: fallback.into(),
        }
    }

    pub fn route(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.routes.push((marker.into(), response.into()));
        self
    }
}

#[async_trait]
impl TextGenerator for RoutedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let text = self
            .routes
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.fallback.clone());
        Ok(text)
    }
}
