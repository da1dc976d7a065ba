//! Runtime configuration: data locations and the generation backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;

use negotiator_llm::{LlmClient, LoggingMiddleware, OpenAiAdapter, TextGenerator, UsageTrackingMiddleware};
use negotiator_pipeline::{load_domain_chunks, InMemoryDealRepository, KnowledgeStore};

/// Options shared by every subcommand. Each falls back to an environment
/// variable, then to a default.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Root of the data directory (deals/, domain_knowledge/, submissions/)
    #[arg(long, env = "NEGOTIATOR_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Model used for generation
    #[arg(long, env = "NEGOTIATOR_MODEL", default_value = "gpt-4o", global = true)]
    pub model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Alternative OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    pub data_dir: PathBuf,
    pub deals_dir: PathBuf,
    pub knowledge_dir: PathBuf,
    pub submissions_dir: PathBuf,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl NegotiatorConfig {
    pub fn from_args(args: &ConfigArgs) -> Self {
        let data_dir = args.data_dir.clone();
        Self {
            deals_dir: data_dir.join("deals"),
            knowledge_dir: data_dir.join("domain_knowledge"),
            submissions_dir: data_dir.join("submissions"),
            data_dir,
            model: args.model.clone(),
            api_key: args.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: args.base_url.clone().filter(|u| !u.trim().is_empty()),
        }
    }

    /// Deals from `deals_dir`, or the built-in sample deals when the
    /// directory is missing or holds no deal files.
    pub async fn load_deals(&self) -> anyhow::Result<InMemoryDealRepository> {
        if is_dir(&self.deals_dir).await {
            let mut repo = InMemoryDealRepository::new();
            let loaded = repo
                .load_dir(&self.deals_dir)
                .await
                .with_context(|| format!("loading deals from {}", self.deals_dir.display()))?;
            if loaded > 0 {
                tracing::info!(dir = %self.deals_dir.display(), deals = loaded, "deals loaded");
                return Ok(repo);
            }
        }
        tracing::warn!(dir = %self.deals_dir.display(), "no deal files found, using sample deals");
        Ok(InMemoryDealRepository::with_samples())
    }

    /// Knowledge chunked from `knowledge_dir`, or the sample chunks when the
    /// directory is missing or yields nothing.
    pub async fn load_knowledge(&self) -> anyhow::Result<KnowledgeStore> {
        if is_dir(&self.knowledge_dir).await {
            let chunks = load_domain_chunks(&self.knowledge_dir)
                .await
                .with_context(|| format!("loading knowledge from {}", self.knowledge_dir.display()))?;
            if !chunks.is_empty() {
                let mut store = KnowledgeStore::new();
                store.add(chunks);
                tracing::info!(dir = %self.knowledge_dir.display(), chunks = store.len(), "knowledge loaded");
                return Ok(store);
            }
        }
        tracing::warn!(dir = %self.knowledge_dir.display(), "no knowledge documents found, using sample chunks");
        Ok(KnowledgeStore::with_samples())
    }

    /// The submissions directory, if it exists.
    pub async fn submissions(&self) -> Option<PathBuf> {
        is_dir(&self.submissions_dir)
            .await
            .then(|| self.submissions_dir.clone())
    }

    /// Build the OpenAI-backed generator. Usage is accumulated on `usage`.
    pub fn generator(&self, usage: &UsageTrackingMiddleware) -> anyhow::Result<Arc<dyn TextGenerator>> {
        let key = self
            .api_key
            .clone()
            .context("OPENAI_API_KEY is not set (use --dry-run to run offline)")?;
        let mut adapter = OpenAiAdapter::new(key).with_default_model(self.model.clone());
        if let Some(url) = &self.base_url {
            adapter = adapter.with_base_url(url.clone());
        }
        let client = LlmClient::new(adapter)
            .with_model(self.model.clone())
            .with_middleware(LoggingMiddleware)
            .with_middleware(usage.clone());
        Ok(Arc::new(client))
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
