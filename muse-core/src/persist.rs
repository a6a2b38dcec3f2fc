//! Book snapshots for save/load functionality.
//!
//! A [`SavedBook`] captures everything the store holds for one book so it
//! can be carried between machines or store backends and restored into a
//! fresh [`StoryBible`].

use crate::book::{Book, Session, WorkspaceFile};
use crate::id::BookId;
use crate::muse::story_bible::backlog::{BacklogItem, BacklogStatus};
use crate::muse::story_bible::entity::Entity;
use crate::muse::story_bible::relationship::Relationship;
use crate::muse::story_bible::store::{StoreError, StoryBible};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("unknown book: {0}")]
    UnknownBook(BookId),
}

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// A complete snapshot of one book's story bible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedBook {
    /// Snapshot format version for compatibility checking.
    pub version: u32,

    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,

    pub book: Book,
    pub sessions: Vec<Session>,
    pub files: Vec<WorkspaceFile>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub backlog: Vec<BacklogItem>,

    /// Quick-access metadata for listings.
    pub metadata: SnapshotMetadata,
}

/// Metadata about a snapshot, readable without the full payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub title: String,
    pub sessions: usize,
    pub entities: usize,
    pub open_backlog: usize,

    /// When the snapshot was taken (duplicated from parent for peek access).
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SavedBook {
    /// Capture a snapshot of a book from a store.
    pub async fn capture(bible: &dyn StoryBible, book: BookId) -> Result<Self, SnapshotError> {
        let book = bible
            .get_book(book)
            .await?
            .ok_or(SnapshotError::UnknownBook(book))?;
        let sessions = bible.get_sessions(book.id).await?;
        let files = bible.get_workspace_files(book.id).await?;
        let entities = bible.get_entities(book.id, None).await?;
        let relationships = bible.get_relationships(book.id, None).await?;
        let backlog = bible.get_backlog_items(book.id, None, None).await?;

        let saved_at = Utc::now();
        let metadata = SnapshotMetadata {
            title: book.title.clone(),
            sessions: sessions.len(),
            entities: entities.len(),
            open_backlog: backlog.iter().filter(|i| i.status.is_open()).count(),
            saved_at: Some(saved_at),
        };

        Ok(Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            book,
            sessions,
            files,
            entities,
            relationships,
            backlog,
            metadata,
        })
    }

    /// Restore the snapshot into a store, recreating every row with its
    /// original id and timestamps. Entities go in before relationships so
    /// endpoint validation passes.
    pub async fn restore(&self, bible: &dyn StoryBible) -> Result<(), SnapshotError> {
        bible.create_book(self.book.clone()).await?;
        for session in &self.sessions {
            bible.add_session(session.clone()).await?;
        }
        for file in &self.files {
            bible.add_workspace_file(file.clone()).await?;
        }
        for entity in &self.entities {
            bible.add_entity(entity.clone()).await?;
        }
        for relationship in &self.relationships {
            bible.add_relationship(relationship.clone()).await?;
        }
        for item in &self.backlog {
            bible.add_backlog_item(item.clone()).await?;
        }
        Ok(())
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Get a snapshot's metadata without deserializing the full payload.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SnapshotMetadata, SnapshotError> {
        let content = fs::read_to_string(path).await?;

        // Parse just enough to get metadata
        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SnapshotMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// Information about a snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Path to the snapshot file.
    pub path: String,

    /// Snapshot metadata.
    pub metadata: SnapshotMetadata,
}

/// List all snapshot files in a directory, sorted by title. Files that are
/// not valid snapshots are skipped.
pub async fn list_snapshots(dir: impl AsRef<Path>) -> Result<Vec<SnapshotInfo>, SnapshotError> {
    let mut snapshots = Vec::new();

    let dir_path = dir.as_ref();
    if !dir_path.exists() {
        fs::create_dir_all(dir_path).await?;
        return Ok(snapshots);
    }

    let mut entries = fs::read_dir(dir_path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedBook::peek_metadata(&path).await {
                snapshots.push(SnapshotInfo {
                    path: path.to_string_lossy().to_string(),
                    metadata,
                });
            }
        }
    }

    snapshots.sort_by(|a, b| a.metadata.title.cmp(&b.metadata.title));
    Ok(snapshots)
}

/// Generate a snapshot path for a book title.
pub fn snapshot_path(dir: impl AsRef<Path>, title: &str) -> std::path::PathBuf {
    let sanitized = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    dir.as_ref().join(format!("{sanitized}.json"))
}
