//! The book aggregate: sessions and workspace files.
//!
//! A book is the root of the ownership tree. Every entity, relationship,
//! session, workspace file, and backlog item belongs to exactly one book.

use crate::id::{BookId, FileId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A book being written with the companion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier.
    pub id: BookId,
    /// Working title.
    pub title: String,
    /// When the book was created.
    pub created_at: DateTime<Utc>,
    /// When the book was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create a new book with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: BookId::new(),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One recorded conversation session for a book.
///
/// The total session count per book feeds the backlog scorer's age bonus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier.
    pub id: SessionId,
    /// The book this session belongs to.
    pub book_id: BookId,
    /// Raw transcript of the conversation.
    pub transcript: String,
    /// Synthesized summary, filled in after synthesis runs.
    pub summary: Option<String>,
    /// When the session was recorded.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a transcript.
    pub fn new(book_id: BookId, transcript: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            book_id,
            transcript: transcript.into(),
            summary: None,
            created_at: Utc::now(),
        }
    }
}

/// Workspace areas a file can live in.
///
/// Draft presence is a scoring signal: a book with any file in `Drafts`
/// is considered to be in the drafting stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceFolder {
    /// Draft prose.
    Drafts,
    /// Loose notes.
    Notes,
    /// Structural outlines.
    Outline,
    /// Background research.
    Research,
}

impl WorkspaceFolder {
    /// Parse a folder name leniently. Returns `None` for unknown names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "drafts" | "draft" => Some(WorkspaceFolder::Drafts),
            "notes" | "note" => Some(WorkspaceFolder::Notes),
            "outline" | "outlines" => Some(WorkspaceFolder::Outline),
            "research" => Some(WorkspaceFolder::Research),
            _ => None,
        }
    }

    /// Get the display name for this folder.
    pub fn name(&self) -> &'static str {
        match self {
            WorkspaceFolder::Drafts => "drafts",
            WorkspaceFolder::Notes => "notes",
            WorkspaceFolder::Outline => "outline",
            WorkspaceFolder::Research => "research",
        }
    }
}

/// A file in a book's workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceFile {
    /// Unique identifier.
    pub id: FileId,
    /// The book this file belongs to.
    pub book_id: BookId,
    /// Which workspace area the file lives in.
    pub folder: WorkspaceFolder,
    /// File title.
    pub title: String,
    /// File content.
    pub content: String,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
}

impl WorkspaceFile {
    /// Create a new workspace file.
    pub fn new(
        book_id: BookId,
        folder: WorkspaceFolder,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: FileId::new(),
            book_id,
            folder,
            title: title.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
