// CLI commands and the wiring they share

pub mod ask;
pub mod chat;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use ragloop_core::{
    create_driver, AgentConfig, ConversationalAgent, KeywordRetriever, LlmDriver, RagAgent,
    RouterAgent, WebSearch,
};

use crate::settings::ProviderSettings;

/// Which agent answers questions
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AgentKind {
    /// Classify each question and pick documents, web search or a direct answer
    Router,
    /// Search the documents with sufficiency checks and retries
    Rag,
    /// Send the conversation straight to the LLM (drafts are always reviewed)
    Plain,
}

/// Ports built from settings
pub struct Ports {
    pub llm: Arc<dyn LlmDriver>,
    pub web_search: Option<Arc<dyn WebSearch>>,
}

impl Ports {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let llm: Arc<dyn LlmDriver> = Arc::from(
            create_driver(&settings.provider_config()).context("Failed to create LLM driver")?,
        );
        let web_search = settings
            .web_search()
            .map(|search| Arc::new(search) as Arc<dyn WebSearch>);
        Ok(Self { llm, web_search })
    }
}

/// Build the agent for `kind`; `Plain` has none
pub fn build_agent(
    kind: AgentKind,
    ports: &Ports,
    config: &AgentConfig,
    docs: &[PathBuf],
) -> Result<Option<Box<dyn ConversationalAgent>>> {
    if kind == AgentKind::Plain {
        return Ok(None);
    }

    let retriever = KeywordRetriever::from_files(docs, config.retrieval_k)
        .context("Failed to load documents")?;
    tracing::info!(
        documents = docs.len(),
        chunks = retriever.chunk_count(),
        "Document index ready"
    );
    let retriever = Arc::new(retriever);

    let agent: Box<dyn ConversationalAgent> = match kind {
        AgentKind::Router => Box::new(RouterAgent::new(
            ports.llm.clone(),
            retriever,
            ports.web_search.clone(),
            config.clone(),
        )),
        AgentKind::Rag => Box::new(RagAgent::new(ports.llm.clone(), retriever, config.clone())),
        AgentKind::Plain => return Ok(None),
    };
    Ok(Some(agent))
}
