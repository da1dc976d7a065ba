//! Text generation for the negotiation pipeline.
//!
//! Provides the `TextGenerator` capability consumed by pipeline stages, the
//! `ProviderAdapter` trait with its `DynProvider` wrapper, an OpenAI adapter,
//! a middleware chain, and `LlmClient` which ties a provider to a model.
//! `ScriptedGenerator`, `FixedGenerator` and `RoutedGenerator` stand in for a
//! real model in tests and dry runs.

mod client;
mod generator;
mod openai;
mod provider;
mod types;

pub use client::*;
pub use generator::*;
pub use openai::OpenAiAdapter;
pub use provider::*;
pub use types::*;
