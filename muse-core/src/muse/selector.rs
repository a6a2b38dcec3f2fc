//! The consumer-facing read APIs: next item and entity network.

use super::story_bible::backlog::{BacklogItem, BacklogStatus};
use super::story_bible::entity::Entity;
use super::story_bible::relationship::Relationship;
use super::story_bible::score::{effective_score, ScoreContext};
use super::story_bible::store::{StoreError, StoryBible};
use crate::id::BookId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot of a book's knowledge graph, for visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityNetwork {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// Fetch a book's full entity network. Entities come back in listing order
/// (mention count descending), relationships in insertion order.
pub async fn entity_network(
    bible: &dyn StoryBible,
    book: BookId,
) -> Result<EntityNetwork, StoreError> {
    Ok(EntityNetwork {
        entities: bible.get_entities(book, None).await?,
        relationships: bible.get_relationships(book, None).await?,
    })
}

/// Pick the single best open backlog item to surface next, or `None` if the
/// backlog is empty.
///
/// Scores every open item with the book-wide context, fetched once, and
/// returns the maximum. Ties go to the item listed first in the store's
/// default order (base priority descending, insertion order within a tie),
/// so the result is deterministic for identical store state.
pub async fn next_item(
    bible: &dyn StoryBible,
    book: BookId,
) -> Result<Option<BacklogItem>, StoreError> {
    let open = bible
        .get_backlog_items(book, Some(BacklogStatus::Open), None)
        .await?;
    if open.is_empty() {
        return Ok(None);
    }

    let ctx = ScoreContext {
        session_count: bible.session_count(book).await?,
        has_drafts: bible.has_drafts(book).await?,
    };

    let mut best: Option<(BacklogItem, i32)> = None;
    for item in open {
        let score = effective_score(&item, &ctx);
        // Strict comparison keeps the first-listed item on ties.
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((item, score));
        }
    }

    if let Some((item, score)) = &best {
        debug!(
            kind = item.kind.name(),
            score,
            sessions = ctx.session_count,
            has_drafts = ctx.has_drafts,
            "selected next backlog item"
        );
    }
    Ok(best.map(|(item, _)| item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Book, Session, WorkspaceFile, WorkspaceFolder};
    use crate::muse::story_bible::backlog::BacklogKind;
    use crate::muse::story_bible::entity::EntityKind;
    use crate::muse::story_bible::store::MemoryBible;

    async fn store_with_book() -> (MemoryBible, Book) {
        let bible = MemoryBible::new();
        let book = bible.create_book(Book::new("Test")).await.unwrap();
        (bible, book)
    }

    #[tokio::test]
    async fn test_empty_backlog_yields_none() {
        let (bible, book) = store_with_book().await;
        assert!(next_item(&bible, book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_highest_effective_score_wins() {
        let (bible, book) = store_with_book().await;

        bible
            .add_backlog_item(
                BacklogItem::new(book.id, BacklogKind::Idea, "an idea").with_priority(5),
            )
            .await
            .unwrap();
        let contradiction = bible
            .add_backlog_item(
                BacklogItem::new(book.id, BacklogKind::Contradiction, "dates clash")
                    .with_priority(4),
            )
            .await
            .unwrap();

        // idea: 5 - 1 = 4; contradiction: 4 + 2 = 6.
        let picked = next_item(&bible, book.id).await.unwrap().unwrap();
        assert_eq!(picked.id, contradiction.id);
    }

    #[tokio::test]
    async fn test_tie_break_is_listing_order_and_stable() {
        let (bible, book) = store_with_book().await;
        for _ in 0..6 {
            bible
                .add_session(Session::new(book.id, "..."))
                .await
                .unwrap();
        }

        // thin_spot p3: 3 + 2 + 1 = 6; idea p5: 5 + 2 - 1 = 6. The idea
        // lists first (base priority 5 beats 3 in the default order).
        bible
            .add_backlog_item(
                BacklogItem::new(book.id, BacklogKind::ThinSpot, "Maria's backstory is unclear")
                    .with_priority(3),
            )
            .await
            .unwrap();
        let idea = bible
            .add_backlog_item(
                BacklogItem::new(book.id, BacklogKind::Idea, "a framing device").with_priority(5),
            )
            .await
            .unwrap();

        for _ in 0..3 {
            let picked = next_item(&bible, book.id).await.unwrap().unwrap();
            assert_eq!(picked.id, idea.id);
        }
    }

    #[tokio::test]
    async fn test_finish_bonus_promotes_entity_linked_items() {
        let (bible, book) = store_with_book().await;
        let maria = bible
            .add_entity(Entity::new(book.id, EntityKind::Person, "Maria"))
            .await
            .unwrap();

        let plain = bible
            .add_backlog_item(
                BacklogItem::new(book.id, BacklogKind::Question, "plain").with_priority(3),
            )
            .await
            .unwrap();
        let linked = bible
            .add_backlog_item(
                BacklogItem::new(book.id, BacklogKind::Question, "about Maria")
                    .with_priority(3)
                    .with_source_entity(maria.id),
            )
            .await
            .unwrap();

        // No drafts: tied at 3, first-listed (plain) wins.
        let picked = next_item(&bible, book.id).await.unwrap().unwrap();
        assert_eq!(picked.id, plain.id);

        // With a draft the linked item gets +2 and jumps the queue.
        bible
            .add_workspace_file(WorkspaceFile::new(
                book.id,
                WorkspaceFolder::Drafts,
                "ch1",
                "...",
            ))
            .await
            .unwrap();
        let picked = next_item(&bible, book.id).await.unwrap().unwrap();
        assert_eq!(picked.id, linked.id);
    }

    #[tokio::test]
    async fn test_terminal_items_never_surface() {
        let (bible, book) = store_with_book().await;
        let only = bible
            .add_backlog_item(BacklogItem::new(book.id, BacklogKind::Question, "q"))
            .await
            .unwrap();
        bible.address_item(only.id).await.unwrap();
        assert!(next_item(&bible, book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entity_network_snapshot() {
        let (bible, book) = store_with_book().await;
        let a = bible
            .add_entity(Entity::new(book.id, EntityKind::Person, "A"))
            .await
            .unwrap();
        let b = bible
            .add_entity(Entity::new(book.id, EntityKind::Place, "B"))
            .await
            .unwrap();
        bible
            .add_relationship(Relationship::new(book.id, a.id, b.id, "lives in"))
            .await
            .unwrap();

        let network = entity_network(&bible, book.id).await.unwrap();
        assert_eq!(network.entities.len(), 2);
        assert_eq!(network.relationships.len(), 1);
    }
}
