//! QA tests for the full story bible flow, driven through scripted model
//! output so no API key is needed:
//! - extraction merges entities and relationships into the graph
//! - the detector finds and seeds unresolved entities
//! - synthesis files summaries, backlog items, and workspace output
//! - the selector ranks the backlog by effective score
//!
//! Run with: `cargo test -p muse-core qa_story_bible`

use muse_core::muse::story_bible::score::{effective_score, ScoreContext};
use muse_core::muse::{detector, selector};
use muse_core::testing::{assert_has_entity, assert_mentions, assert_open_backlog, BibleHarness};
use muse_core::{BacklogItem, BacklogKind, BacklogStatus, SavedBook, StoryBible};

#[tokio::test]
async fn test_extraction_builds_the_graph() {
    let harness = BibleHarness::with_title("The Tide House").await;
    let session = harness.session("Maria walked the Alfama at dawn.").await;

    let mut mock = harness.mock(vec![r#"```json
    {
        "entities": [
            {"name": "Maria", "type": "person", "description": "a midwife with a secret"},
            {"name": "the Alfama", "type": "place", "description": ""}
        ],
        "relationships": [
            {"from": "Maria", "to": "the Alfama", "type": "walks through", "description": "her morning route"}
        ]
    }
    ```"#
        .to_string()]);

    let report = mock.extract(&harness.book, Some(session.id)).await.unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.relationships.len(), 1);

    assert_has_entity(&harness, "Maria").await;
    let maria = harness.find_entity("maria").await.unwrap();
    assert_eq!(maria.first_session, Some(session.id));

    let network = selector::entity_network(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap();
    assert_eq!(network.entities.len(), 2);
    assert_eq!(network.relationships.len(), 1);
}

#[tokio::test]
async fn test_re_mention_deduplicates_across_sessions() {
    let harness = BibleHarness::new().await;
    let extraction = r#"{
        "entities": [{"name": "MARIA", "type": "person", "description": ""}]
    }"#;
    let mut mock = harness.mock(vec![extraction.to_string(), extraction.to_string()]);

    let first = harness.session("first").await;
    mock.extract(&harness.book, Some(first.id)).await.unwrap();
    let second = harness.session("second").await;
    mock.extract(&harness.book, Some(second.id)).await.unwrap();

    assert_eq!(harness.entity_count().await, 1);
    assert_mentions(&harness, "Maria", 2).await;
    // First sighting wins the provenance.
    let maria = harness.find_entity("Maria").await.unwrap();
    assert_eq!(maria.first_session, Some(first.id));
}

#[tokio::test]
async fn test_detector_seeds_and_synthesis_fills() {
    let harness = BibleHarness::new().await;
    harness
        .entity(muse_core::EntityKind::Person, "Maria")
        .await;

    // Undescribed and unconnected: both gaps seed.
    let unresolved = detector::find_unresolved(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap();
    assert_eq!(unresolved.len(), 1);

    let seeded = detector::seed_backlog(harness.bible.as_ref(), harness.book.id, None)
        .await
        .unwrap();
    assert_eq!(seeded.len(), 2);
    assert_open_backlog(&harness, 2).await;

    // A later synthesis describes Maria; the thin-spot gap closes.
    let session = harness.session("We fleshed out Maria's past.").await;
    let mut mock = harness.mock(vec![r#"{
        "summary": "Fleshed out Maria's past in Lisbon.",
        "entities": [{"name": "Maria", "type": "person", "description": "a midwife who left Lisbon in disgrace"}]
    }"#
    .to_string()]);
    mock.synthesize(&harness.book, session.id).await.unwrap();

    let unresolved = detector::find_unresolved(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap();
    // Still unconnected, so still unresolved, but only the one gap remains.
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].has_description());

    let stored = harness.bible.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(
        stored.summary.as_deref(),
        Some("Fleshed out Maria's past in Lisbon.")
    );
}

#[tokio::test]
async fn test_scoring_scenario_and_selection() {
    let harness = BibleHarness::new().await;

    // Six sessions in, a priority-3 thin spot scores 3 + 2 + 1 = 6, pulling
    // even with a fresh priority-5 idea at 5 + 2 - 1 = 6.
    harness.age_sessions(6).await;
    let thin = harness
        .backlog(BacklogKind::ThinSpot, "Maria's backstory is unclear", 3)
        .await;
    let idea = harness
        .backlog(BacklogKind::Idea, "tell it backwards", 5)
        .await;

    let ctx = ScoreContext {
        session_count: 6,
        has_drafts: false,
    };
    assert_eq!(effective_score(&thin, &ctx), 6);
    assert_eq!(effective_score(&idea, &ctx), 6);

    // The tie goes to the item listed first: the idea, on base priority.
    let picked = selector::next_item(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picked.id, idea.id);

    // Addressing it surfaces the thin spot next.
    harness.bible.address_item(idea.id).await.unwrap();
    let picked = selector::next_item(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picked.id, thin.id);

    // A contradiction outranks everything at equal priority.
    let contradiction = harness
        .backlog(BacklogKind::Contradiction, "Maria's age shifts", 3)
        .await;
    let picked = selector::next_item(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picked.id, contradiction.id);
}

#[tokio::test]
async fn test_finish_bonus_needs_drafts_and_source_entity() {
    let harness = BibleHarness::new().await;
    let maria = harness
        .entity(muse_core::EntityKind::Person, "Maria")
        .await;

    let linked = harness
        .bible
        .add_backlog_item(
            BacklogItem::new(harness.book.id, BacklogKind::Question, "about Maria")
                .with_priority(2)
                .with_source_entity(maria.id),
        )
        .await
        .unwrap();
    let loose = harness
        .backlog(BacklogKind::Question, "something vaguer", 3)
        .await;

    // Without drafts the loose item's higher base wins.
    let picked = selector::next_item(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picked.id, loose.id);

    // With a draft in hand, entity-linked work jumps ahead: 2 + 2 > 3.
    harness.draft("chapter one", "It rained the day Maria came home.").await;
    let picked = selector::next_item(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(picked.id, linked.id);
}

#[tokio::test]
async fn test_snapshot_survives_the_whole_flow() {
    let harness = BibleHarness::new().await;
    let session = harness.session("Maria and the tide house.").await;
    let mut mock = harness.mock(vec![r#"{
        "summary": "Introduced the tide house.",
        "entities": [{"name": "the tide house", "type": "place", "description": "a house below the waterline"}],
        "backlog_items": [{"type": "question", "content": "Who built the tide house?", "priority": 4}],
        "workspace_files": [{"folder": "drafts", "title": "opening", "content": "The sea kept the ledger."}]
    }"#
    .to_string()]);
    mock.synthesize(&harness.book, session.id).await.unwrap();
    detector::seed_backlog(harness.bible.as_ref(), harness.book.id, Some(session.id))
        .await
        .unwrap();

    let saved = SavedBook::capture(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap();
    let fresh = muse_core::MemoryBible::new();
    saved.restore(&fresh).await.unwrap();

    assert!(fresh.has_drafts(harness.book.id).await.unwrap());
    assert_eq!(fresh.session_count(harness.book.id).await.unwrap(), 1);
    let open = fresh
        .get_backlog_items(harness.book.id, Some(BacklogStatus::Open), None)
        .await
        .unwrap();
    assert_eq!(open.len(), harness.open_backlog().await.len());

    // The restored store ranks the backlog identically.
    let before = selector::next_item(harness.bible.as_ref(), harness.book.id)
        .await
        .unwrap()
        .unwrap();
    let after = selector::next_item(&fresh, harness.book.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.id, after.id);
}
