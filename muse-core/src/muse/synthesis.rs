//! Session synthesis payloads and ingestion.
//!
//! After a session ends, the synthesis collaborator summarizes the
//! transcript and proposes entities, backlog items, and workspace files.
//! This engine consumes that output with the same lenient, per-item
//! isolation as extraction: invalid backlog kinds are dropped with a log
//! line, priorities are clamped into range, and unknown workspace folders
//! land in notes so synthesis output alone never flips draft presence.

use super::extraction::{merge_extraction, EntityCandidate, ExtractionPayload, MergeReport};
use super::payload::{parse_relaxed, ParseError};
use super::story_bible::backlog::{BacklogItem, BacklogKind, MAX_PRIORITY, MIN_PRIORITY};
use super::story_bible::store::{StoreError, StoryBible};
use crate::book::{WorkspaceFile, WorkspaceFolder};
use crate::id::{BookId, SessionId};
use serde::Deserialize;
use tracing::{debug, warn};

/// The structured result expected from the synthesis collaborator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthesisPayload {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub entities: Vec<EntityCandidate>,
    #[serde(default)]
    pub backlog_items: Vec<BacklogCandidate>,
    #[serde(default)]
    pub workspace_files: Vec<FileCandidate>,
}

/// A candidate backlog item. The kind is validated against the fixed enum
/// before insertion; invalid entries are silently dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct BacklogCandidate {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// A candidate workspace file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileCandidate {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Parse raw synthesis output into a payload.
pub fn parse_synthesis(raw: &str) -> Result<SynthesisPayload, ParseError> {
    parse_relaxed(raw)
}

/// What one synthesis pass persisted.
#[derive(Debug, Default)]
pub struct SynthesisReport {
    /// Whether a summary was stored on the session.
    pub summary_stored: bool,
    /// Result of merging the payload's entities.
    pub merge: MergeReport,
    /// Backlog items created.
    pub backlog: Vec<BacklogItem>,
    /// Workspace files created.
    pub files: Vec<WorkspaceFile>,
    /// Backlog candidates dropped (unknown kind, blank content, store failure).
    pub dropped_backlog: usize,
    /// File candidates dropped (store failure).
    pub dropped_files: usize,
}

/// Apply a synthesis payload to a book's story bible.
///
/// The session must exist and belong to the book; a mismatched pair is
/// rejected up front so nothing merges into the wrong book. The summary
/// write is the one primary mutation: its failure propagates. Everything
/// else is a batch with per-item isolation.
pub async fn apply_synthesis(
    bible: &dyn StoryBible,
    book: BookId,
    session: SessionId,
    payload: &SynthesisPayload,
) -> Result<SynthesisReport, StoreError> {
    let stored = bible
        .get_session(session)
        .await?
        .ok_or(StoreError::UnknownSession(session))?;
    if stored.book_id != book {
        return Err(StoreError::UnknownSession(session));
    }

    let mut report = SynthesisReport::default();

    if !payload.summary.trim().is_empty() {
        bible
            .set_session_summary(session, payload.summary.trim().to_string())
            .await?;
        report.summary_stored = true;
    }

    // Synthesis carries no relationship list; run the entity half of the
    // merge protocol.
    let entities_only = ExtractionPayload {
        entities: payload.entities.clone(),
        relationships: Vec::new(),
    };
    report.merge = merge_extraction(bible, book, &entities_only, Some(session)).await?;

    for candidate in &payload.backlog_items {
        let Some(kind) = BacklogKind::parse(&candidate.kind) else {
            warn!(kind = %candidate.kind, "dropping backlog candidate with unknown kind");
            report.dropped_backlog += 1;
            continue;
        };
        let content = candidate.content.trim();
        if content.is_empty() {
            warn!(kind = kind.name(), "dropping backlog candidate with blank content");
            report.dropped_backlog += 1;
            continue;
        }
        let priority = candidate
            .priority
            .unwrap_or(MIN_PRIORITY as i64)
            .clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as i32;

        let item = BacklogItem::new(book, kind, content)
            .with_priority(priority)
            .with_source_session(session);

        match bible.add_backlog_item(item).await {
            Ok(created) => report.backlog.push(created),
            Err(error) => {
                warn!(kind = kind.name(), %error, "backlog insert failed, skipping");
                report.dropped_backlog += 1;
            }
        }
    }

    for candidate in &payload.workspace_files {
        let folder = WorkspaceFolder::parse(&candidate.folder).unwrap_or(WorkspaceFolder::Notes);
        let file = WorkspaceFile::new(book, folder, candidate.title.trim(), &candidate.content);

        match bible.add_workspace_file(file).await {
            Ok(created) => report.files.push(created),
            Err(error) => {
                warn!(title = %candidate.title, %error, "workspace file insert failed, skipping");
                report.dropped_files += 1;
            }
        }
    }

    debug!(
        summary_stored = report.summary_stored,
        entities = report.merge.entities_touched(),
        backlog = report.backlog.len(),
        dropped_backlog = report.dropped_backlog,
        files = report.files.len(),
        "synthesis applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Book, Session};
    use crate::muse::story_bible::backlog::BacklogStatus;
    use crate::muse::story_bible::store::MemoryBible;

    fn backlog(kind: &str, content: &str, priority: Option<i64>) -> BacklogCandidate {
        BacklogCandidate {
            kind: kind.to_string(),
            content: content.to_string(),
            priority,
        }
    }

    async fn store_with_session() -> (MemoryBible, Book, Session) {
        let bible = MemoryBible::new();
        let book = bible.create_book(Book::new("Test")).await.unwrap();
        let session = bible
            .add_session(Session::new(book.id, "We talked for an hour."))
            .await
            .unwrap();
        (bible, book, session)
    }

    #[test]
    fn test_parse_synthesis_payload() {
        let raw = r#"{
            "summary": "Maria's backstory came up.",
            "entities": [{"name": "Maria", "type": "person", "description": ""}],
            "backlog_items": [{"type": "thin_spot", "content": "Maria's backstory is unclear", "priority": 3}],
            "workspace_files": [{"folder": "notes", "title": "Maria", "content": "..."}]
        }"#;
        let payload = parse_synthesis(raw).unwrap();
        assert_eq!(payload.summary, "Maria's backstory came up.");
        assert_eq!(payload.backlog_items[0].priority, Some(3));
    }

    #[tokio::test]
    async fn test_apply_stores_summary_and_backlog() {
        let (bible, book, session) = store_with_session().await;
        let payload = SynthesisPayload {
            summary: "Maria's backstory came up.".to_string(),
            entities: vec![],
            backlog_items: vec![backlog("thin_spot", "Maria's backstory is unclear", Some(3))],
            workspace_files: vec![],
        };

        let report = apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();
        assert!(report.summary_stored);
        assert_eq!(report.backlog.len(), 1);
        assert_eq!(report.backlog[0].priority, 3);
        assert_eq!(report.backlog[0].source_session, Some(session.id));
        assert_eq!(report.backlog[0].status, BacklogStatus::Open);

        let stored = bible.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Maria's backstory came up."));
    }

    #[tokio::test]
    async fn test_invalid_backlog_kinds_dropped() {
        let (bible, book, session) = store_with_session().await;
        let payload = SynthesisPayload {
            backlog_items: vec![
                backlog("todo", "not a real kind", Some(5)),
                backlog("question", "", Some(2)),
                backlog("idea", "A parallel timeline", None),
            ],
            ..Default::default()
        };

        let report = apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();
        assert_eq!(report.dropped_backlog, 2);
        assert_eq!(report.backlog.len(), 1);
        assert_eq!(report.backlog[0].kind, BacklogKind::Idea);
        assert_eq!(report.backlog[0].priority, MIN_PRIORITY);
    }

    #[tokio::test]
    async fn test_priority_clamped_into_range() {
        let (bible, book, session) = store_with_session().await;
        let payload = SynthesisPayload {
            backlog_items: vec![
                backlog("question", "too big", Some(12)),
                backlog("question", "too small", Some(-4)),
            ],
            ..Default::default()
        };

        let report = apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();
        assert_eq!(report.backlog[0].priority, MAX_PRIORITY);
        assert_eq!(report.backlog[1].priority, MIN_PRIORITY);
    }

    #[tokio::test]
    async fn test_unknown_folder_lands_in_notes() {
        let (bible, book, session) = store_with_session().await;
        let payload = SynthesisPayload {
            workspace_files: vec![FileCandidate {
                folder: "attic".to_string(),
                title: "misc".to_string(),
                content: "...".to_string(),
            }],
            ..Default::default()
        };

        let report = apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();
        assert_eq!(report.files[0].folder, WorkspaceFolder::Notes);
        // Filing into notes must not flip draft presence.
        assert!(!bible.has_drafts(book.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_entities_merge_through_protocol() {
        let (bible, book, session) = store_with_session().await;
        let payload = SynthesisPayload {
            entities: vec![EntityCandidate {
                name: "Maria".to_string(),
                kind: "person".to_string(),
                description: "a midwife".to_string(),
            }],
            ..Default::default()
        };

        apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();
        // Second synthesis re-mentions rather than duplicating.
        apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();

        let entities = bible.get_entities(book.id, None).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].mention_count, 2);
    }

    #[tokio::test]
    async fn test_session_from_another_book_rejected() {
        let (bible, _book, session) = store_with_session().await;
        let other = bible.create_book(Book::new("Other")).await.unwrap();

        let payload = SynthesisPayload {
            summary: "Wrong ledger.".to_string(),
            entities: vec![EntityCandidate {
                name: "Maria".to_string(),
                kind: "person".to_string(),
                description: String::new(),
            }],
            ..Default::default()
        };

        let err = apply_synthesis(&bible, other.id, session.id, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownSession(_)));

        // Nothing leaked into the wrong book, and the session is untouched.
        assert!(bible.get_entities(other.id, None).await.unwrap().is_empty());
        let stored = bible.get_session(session.id).await.unwrap().unwrap();
        assert!(stored.summary.is_none());

        let err = apply_synthesis(&bible, other.id, crate::id::SessionId::new(), &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn test_blank_summary_not_stored() {
        let (bible, book, session) = store_with_session().await;
        let payload = SynthesisPayload {
            summary: "   ".to_string(),
            ..Default::default()
        };
        let report = apply_synthesis(&bible, book.id, session.id, &payload)
            .await
            .unwrap();
        assert!(!report.summary_stored);
        let stored = bible.get_session(session.id).await.unwrap().unwrap();
        assert!(stored.summary.is_none());
    }
}
