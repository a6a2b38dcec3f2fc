//! Unresolved-entity detection and backlog seeding.
//!
//! An entity is unresolved when its description is blank OR no relationship
//! touches it — the union of both gaps, not the intersection. Detection is a
//! pure scan over a snapshot of the graph, intended to run after session
//! synthesis rather than on every mutation.

use super::story_bible::backlog::{BacklogItem, BacklogKind, BacklogStatus};
use super::story_bible::entity::Entity;
use super::story_bible::relationship::Relationship;
use super::story_bible::store::{StoreError, StoryBible};
use crate::id::{BookId, SessionId};
use tracing::{debug, warn};

/// Pure predicate: does this entity need follow-up?
pub fn is_unresolved(entity: &Entity, relationships: &[Relationship]) -> bool {
    !entity.has_description() || !relationships.iter().any(|r| r.involves(entity.id))
}

/// Find all unresolved entities for a book, in the store's entity listing
/// order (mention count descending).
pub async fn find_unresolved(
    bible: &dyn StoryBible,
    book: BookId,
) -> Result<Vec<Entity>, StoreError> {
    let entities = bible.get_entities(book, None).await?;
    let relationships = bible.get_relationships(book, None).await?;
    Ok(entities
        .into_iter()
        .filter(|e| is_unresolved(e, &relationships))
        .collect())
}

/// Seed the backlog from unresolved entities.
///
/// A blank description yields a `thin_spot` item; zero relationships yields
/// an `unexplored` item. Each item links its source entity. Entities that
/// already have an open item of the same kind pointing at them are skipped,
/// so re-running the detector is idempotent. The seeded item and the finding
/// are not committed atomically; a crash between the two is tolerated
/// because the next run re-finds the gap.
pub async fn seed_backlog(
    bible: &dyn StoryBible,
    book: BookId,
    source_session: Option<SessionId>,
) -> Result<Vec<BacklogItem>, StoreError> {
    let entities = bible.get_entities(book, None).await?;
    let relationships = bible.get_relationships(book, None).await?;
    let open = bible
        .get_backlog_items(book, Some(BacklogStatus::Open), None)
        .await?;

    let has_open = |kind: BacklogKind, entity: &Entity| {
        open.iter()
            .any(|item| item.kind == kind && item.source_entity == Some(entity.id))
    };

    let mut seeded = Vec::new();
    for entity in &entities {
        let mut wanted = Vec::new();
        if !entity.has_description() && !has_open(BacklogKind::ThinSpot, entity) {
            wanted.push((
                BacklogKind::ThinSpot,
                format!("{} needs a description", entity.name),
            ));
        }
        let connected = relationships.iter().any(|r| r.involves(entity.id));
        if !connected && !has_open(BacklogKind::Unexplored, entity) {
            wanted.push((
                BacklogKind::Unexplored,
                format!("{} has no connections yet", entity.name),
            ));
        }

        for (kind, content) in wanted {
            let mut item = BacklogItem::new(book, kind, content).with_source_entity(entity.id);
            if let Some(session) = source_session {
                item = item.with_source_session(session);
            }
            match bible.add_backlog_item(item).await {
                Ok(created) => seeded.push(created),
                Err(error) => {
                    warn!(entity = %entity.name, %error, "backlog seed insert failed, skipping");
                }
            }
        }
    }

    debug!(seeded = seeded.len(), "backlog seeding complete");
    Ok(seeded)
}
