//! The Muse orchestrator.
//!
//! `Muse` owns the Claude client, its configuration, and a handle to the
//! story bible store. It runs the two LLM workflows (extraction and session
//! synthesis) and exposes thin passthroughs to the rest of the engine so
//! callers wire up one object.

use super::detector;
use super::extraction::{merge_extraction, parse_extraction, ExtractionPayload, MergeReport};
use super::payload::ParseError;
use super::selector::{self, EntityNetwork};
use super::story_bible::backlog::BacklogItem;
use super::story_bible::entity::Entity;
use super::story_bible::store::{StoreError, StoryBible};
use super::synthesis::{apply_synthesis, parse_synthesis, SynthesisPayload, SynthesisReport};
use crate::id::{BacklogItemId, BookId, SessionId};
use claude::{Claude, Message, Request};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Extraction and synthesis want structured output, not creativity.
const STRUCTURED_TEMPERATURE: f32 = 0.0;

const EXTRACTION_SYSTEM: &str = "\
You extract story entities from a writing conversation. Respond with ONLY a \
JSON object, no markdown, of the shape:
{
  \"entities\": [{\"name\": \"...\", \"type\": \"person|place|theme|event\", \"description\": \"...\"}],
  \"relationships\": [{\"from\": \"...\", \"to\": \"...\", \"type\": \"...\", \"description\": \"...\"}]
}
Use an empty string for unknown descriptions. Only report entities actually \
mentioned in the text.";

const SYNTHESIS_SYSTEM: &str = "\
You summarize a writing session and propose follow-up work. Respond with ONLY \
a JSON object, no markdown, of the shape:
{
  \"summary\": \"...\",
  \"entities\": [{\"name\": \"...\", \"type\": \"person|place|theme|event\", \"description\": \"...\"}],
  \"backlog_items\": [{\"type\": \"question|contradiction|thin_spot|unexplored|review|idea\", \"content\": \"...\", \"priority\": 1}],
  \"workspace_files\": [{\"folder\": \"drafts|notes|outline|research\", \"title\": \"...\", \"content\": \"...\"}]
}
Priorities run 1 (low) to 5 (urgent). Report contradictions whenever the \
session conflicts with earlier material.";

/// Errors from Muse workflows.
#[derive(Debug, Error)]
pub enum MuseError {
    #[error("API error: {0:?}")]
    Api(#[from] claude::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration for the Muse orchestrator.
#[derive(Debug, Clone)]
pub struct MuseConfig {
    /// The model to use (None uses the client's default).
    pub model: Option<String>,

    /// Maximum tokens for responses.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for MuseConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            temperature: STRUCTURED_TEMPERATURE,
        }
    }
}

impl MuseConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The AI writing companion's knowledge engine.
pub struct Muse {
    client: Claude,
    config: MuseConfig,
    bible: Arc<dyn StoryBible>,
}

impl Muse {
    /// Create a new Muse with a client and a store.
    pub fn new(client: Claude, bible: Arc<dyn StoryBible>) -> Self {
        Self {
            client,
            config: MuseConfig::default(),
            bible,
        }
    }

    /// Create a Muse from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env(bible: Arc<dyn StoryBible>) -> Result<Self, MuseError> {
        let client = Claude::from_env()?;
        Ok(Self::new(client, bible))
    }

    /// Configure the Muse.
    pub fn with_config(mut self, config: MuseConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the underlying store handle.
    pub fn bible(&self) -> &Arc<dyn StoryBible> {
        &self.bible
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, MuseError> {
        let mut request = Request::new(vec![Message::user(user)])
            .with_system(system)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        let response = self.client.complete(request).await?;
        Ok(response.text())
    }

    /// Run extraction over a chunk of text and merge the result into the
    /// book's story bible.
    pub async fn extract_from_text(
        &self,
        book: BookId,
        text: &str,
        source_session: Option<SessionId>,
    ) -> Result<MergeReport, MuseError> {
        let raw = self.complete(EXTRACTION_SYSTEM, text.to_string()).await?;
        let payload = parse_extraction(&raw)?;
        let report = merge_extraction(self.bible.as_ref(), book, &payload, source_session).await?;
        info!(
            %book,
            created = report.created.len(),
            re_mentioned = report.re_mentioned.len(),
            relationships = report.relationships.len(),
            "extraction workflow complete"
        );
        Ok(report)
    }

    /// Synthesize a recorded session: summarize the transcript, merge the
    /// proposed entities, file backlog items and workspace output.
    pub async fn synthesize_session(
        &self,
        book: BookId,
        session: SessionId,
    ) -> Result<SynthesisReport, MuseError> {
        let stored = self
            .bible
            .get_session(session)
            .await?
            .ok_or(StoreError::UnknownSession(session))?;
        // Reject a mismatched pair before spending an API call.
        if stored.book_id != book {
            return Err(StoreError::UnknownSession(session).into());
        }

        let raw = self.complete(SYNTHESIS_SYSTEM, stored.transcript).await?;
        let payload = parse_synthesis(&raw)?;
        let report = apply_synthesis(self.bible.as_ref(), book, session, &payload).await?;
        info!(
            %book,
            %session,
            backlog = report.backlog.len(),
            entities = report.merge.entities_touched(),
            "synthesis workflow complete"
        );
        Ok(report)
    }

    /// Merge a pre-parsed extraction payload without an LLM call.
    pub async fn merge_extraction(
        &self,
        book: BookId,
        payload: &ExtractionPayload,
        source_session: Option<SessionId>,
    ) -> Result<MergeReport, MuseError> {
        Ok(merge_extraction(self.bible.as_ref(), book, payload, source_session).await?)
    }

    /// Apply a pre-parsed synthesis payload without an LLM call.
    pub async fn apply_synthesis(
        &self,
        book: BookId,
        session: SessionId,
        payload: &SynthesisPayload,
    ) -> Result<SynthesisReport, MuseError> {
        Ok(apply_synthesis(self.bible.as_ref(), book, session, payload).await?)
    }

    /// Find entities needing follow-up.
    pub async fn find_unresolved(&self, book: BookId) -> Result<Vec<Entity>, MuseError> {
        Ok(detector::find_unresolved(self.bible.as_ref(), book).await?)
    }

    /// Seed the backlog from unresolved entities.
    pub async fn seed_backlog(
        &self,
        book: BookId,
        source_session: Option<SessionId>,
    ) -> Result<Vec<BacklogItem>, MuseError> {
        Ok(detector::seed_backlog(self.bible.as_ref(), book, source_session).await?)
    }

    /// Add a backlog item directly.
    pub async fn add_backlog_item(&self, item: BacklogItem) -> Result<BacklogItem, MuseError> {
        Ok(self.bible.add_backlog_item(item).await?)
    }

    /// Mark a backlog item addressed.
    pub async fn address_item(&self, id: BacklogItemId) -> Result<BacklogItem, MuseError> {
        Ok(self.bible.address_item(id).await?)
    }

    /// Mark a backlog item dismissed.
    pub async fn dismiss_item(&self, id: BacklogItemId) -> Result<BacklogItem, MuseError> {
        Ok(self.bible.dismiss_item(id).await?)
    }

    /// Pick the next backlog item to surface in conversation.
    pub async fn next_item(&self, book: BookId) -> Result<Option<BacklogItem>, MuseError> {
        Ok(selector::next_item(self.bible.as_ref(), book).await?)
    }

    /// Fetch a book's entity network for visualization.
    pub async fn entity_network(&self, book: BookId) -> Result<EntityNetwork, MuseError> {
        Ok(selector::entity_network(self.bible.as_ref(), book).await?)
    }
}
