//! Testing utilities for the knowledge engine.
//!
//! This module provides tools for integration testing:
//! - `MockMuse` for deterministic testing without API calls
//! - `BibleHarness` for scripted story-bible scenarios
//! - Assertion helpers for verifying graph and backlog state

use crate::book::{Book, Session, WorkspaceFile, WorkspaceFolder};
use crate::id::{EntityId, SessionId};
use crate::muse::extraction::{merge_extraction, parse_extraction, MergeReport};
use crate::muse::story_bible::backlog::{BacklogItem, BacklogKind, BacklogStatus};
use crate::muse::story_bible::entity::{Entity, EntityKind};
use crate::muse::story_bible::relationship::Relationship;
use crate::muse::story_bible::store::{MemoryBible, StoryBible};
use crate::muse::synthesis::{apply_synthesis, parse_synthesis, SynthesisReport};
use crate::muse::MuseError;
use std::sync::Arc;

/// A mock muse that consumes scripted raw model output.
///
/// Responses run through the real parsing and merge code, so tests exercise
/// the full ingestion path without API calls. When the script runs out, the
/// mock returns an empty payload.
pub struct MockMuse {
    bible: Arc<dyn StoryBible>,
    /// Scripted raw responses to consume in order.
    responses: Vec<String>,
    /// Index of next response to consume.
    response_index: usize,
}

impl MockMuse {
    /// Create a mock muse over a store with scripted responses.
    pub fn new(bible: Arc<dyn StoryBible>, responses: Vec<String>) -> Self {
        Self {
            bible,
            responses,
            response_index: 0,
        }
    }

    /// Add a raw response to the queue.
    pub fn queue_response(&mut self, raw: impl Into<String>) {
        self.responses.push(raw.into());
    }

    /// Reset the response index to replay from the beginning.
    pub fn reset(&mut self) {
        self.response_index = 0;
    }

    fn next_response(&mut self) -> String {
        if self.response_index < self.responses.len() {
            let raw = self.responses[self.response_index].clone();
            self.response_index += 1;
            raw
        } else {
            "{}".to_string()
        }
    }

    /// Run the extraction workflow with the next scripted response.
    pub async fn extract(
        &mut self,
        book: &Book,
        source_session: Option<SessionId>,
    ) -> Result<MergeReport, MuseError> {
        let raw = self.next_response();
        let payload = parse_extraction(&raw)?;
        Ok(merge_extraction(self.bible.as_ref(), book.id, &payload, source_session).await?)
    }

    /// Run the synthesis workflow with the next scripted response.
    pub async fn synthesize(
        &mut self,
        book: &Book,
        session: SessionId,
    ) -> Result<SynthesisReport, MuseError> {
        let raw = self.next_response();
        let payload = parse_synthesis(&raw)?;
        Ok(apply_synthesis(self.bible.as_ref(), book.id, session, &payload).await?)
    }
}

/// Test harness over an in-memory store with one pre-created book.
pub struct BibleHarness {
    /// The store under test.
    pub bible: Arc<MemoryBible>,
    /// The harness's book.
    pub book: Book,
}

impl BibleHarness {
    /// Create a harness with an empty book.
    pub async fn new() -> Self {
        Self::with_title("Test Book").await
    }

    /// Create a harness with a named book.
    pub async fn with_title(title: &str) -> Self {
        let bible = Arc::new(MemoryBible::new());
        let book = bible
            .create_book(Book::new(title))
            .await
            .expect("create book");
        Self { bible, book }
    }

    /// Build a mock muse over this harness's store.
    pub fn mock(&self, responses: Vec<String>) -> MockMuse {
        MockMuse::new(self.bible.clone(), responses)
    }

    /// Add an undescribed entity.
    pub async fn entity(&self, kind: EntityKind, name: &str) -> Entity {
        self.bible
            .add_entity(Entity::new(self.book.id, kind, name))
            .await
            .expect("add entity")
    }

    /// Add a described entity.
    pub async fn described_entity(
        &self,
        kind: EntityKind,
        name: &str,
        description: &str,
    ) -> Entity {
        self.bible
            .add_entity(Entity::new(self.book.id, kind, name).with_description(description))
            .await
            .expect("add entity")
    }

    /// Connect two entities.
    pub async fn relate(&self, from: EntityId, to: EntityId, relation: &str) -> Relationship {
        self.bible
            .add_relationship(Relationship::new(self.book.id, from, to, relation))
            .await
            .expect("add relationship")
    }

    /// File a backlog item.
    pub async fn backlog(&self, kind: BacklogKind, content: &str, priority: i32) -> BacklogItem {
        self.bible
            .add_backlog_item(
                BacklogItem::new(self.book.id, kind, content).with_priority(priority),
            )
            .await
            .expect("add backlog item")
    }

    /// Record a session.
    pub async fn session(&self, transcript: &str) -> Session {
        self.bible
            .add_session(Session::new(self.book.id, transcript))
            .await
            .expect("add session")
    }

    /// Record several empty sessions to age the backlog.
    pub async fn age_sessions(&self, count: u32) {
        for _ in 0..count {
            self.session("...").await;
        }
    }

    /// File a draft so finish bonuses apply.
    pub async fn draft(&self, title: &str, content: &str) -> WorkspaceFile {
        self.bible
            .add_workspace_file(WorkspaceFile::new(
                self.book.id,
                WorkspaceFolder::Drafts,
                title,
                content,
            ))
            .await
            .expect("add workspace file")
    }

    /// Find an entity by name, using the merge protocol's normalization.
    pub async fn find_entity(&self, name: &str) -> Option<Entity> {
        self.bible
            .get_entities(self.book.id, None)
            .await
            .expect("get entities")
            .into_iter()
            .find(|e| e.matches_name(name))
    }

    /// Total entities in the book.
    pub async fn entity_count(&self) -> usize {
        self.bible
            .get_entities(self.book.id, None)
            .await
            .expect("get entities")
            .len()
    }

    /// Open backlog items, in listing order.
    pub async fn open_backlog(&self) -> Vec<BacklogItem> {
        self.bible
            .get_backlog_items(self.book.id, Some(BacklogStatus::Open), None)
            .await
            .expect("get backlog items")
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the book contains an entity with the given name.
#[track_caller]
pub async fn assert_has_entity(harness: &BibleHarness, name: &str) {
    assert!(
        harness.find_entity(name).await.is_some(),
        "Expected entity '{name}' to exist in the story bible"
    );
}

/// Assert that the book does NOT contain an entity with the given name.
#[track_caller]
pub async fn assert_no_entity(harness: &BibleHarness, name: &str) {
    assert!(
        harness.find_entity(name).await.is_none(),
        "Expected entity '{name}' to NOT exist in the story bible"
    );
}

/// Assert an entity's mention count.
#[track_caller]
pub async fn assert_mentions(harness: &BibleHarness, name: &str, expected: u32) {
    let entity = harness
        .find_entity(name)
        .await
        .unwrap_or_else(|| panic!("Expected entity '{name}' to exist"));
    assert_eq!(
        entity.mention_count, expected,
        "Expected '{name}' to have {expected} mentions, got {}",
        entity.mention_count
    );
}

/// Assert the number of open backlog items.
#[track_caller]
pub async fn assert_open_backlog(harness: &BibleHarness, expected: usize) {
    let open = harness.open_backlog().await;
    assert_eq!(
        open.len(),
        expected,
        "Expected {expected} open backlog items, got {}",
        open.len()
    );
}
