//! Entity extraction payloads and the merge-on-mention protocol.
//!
//! Extraction runs over one chunk of text and produces candidate entities
//! and relationships. Merging them into the story bible is the consistency
//! core: candidates whose normalized name matches an existing entity become
//! re-mentions instead of duplicates, relationship endpoints are resolved by
//! name, and every candidate fails or succeeds on its own. A failed merge
//! returns whatever subset was persisted; partial success is the designed
//! behavior.

use super::payload::{parse_relaxed, ParseError};
use super::story_bible::entity::{normalize_name, Entity, EntityKind};
use super::story_bible::relationship::Relationship;
use super::story_bible::store::{increment_mention_count, EntityPatch, StoreError, StoryBible};
use crate::id::{BookId, SessionId};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The structured result expected from the extraction collaborator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub entities: Vec<EntityCandidate>,
    #[serde(default)]
    pub relationships: Vec<RelationshipCandidate>,
}

/// A candidate entity from one extraction pass. Loosely typed: the kind is
/// validated against the fixed enum at merge time.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityCandidate {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// A candidate relationship, endpoints referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipCandidate {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(rename = "type", default)]
    pub relation: String,
    #[serde(default)]
    pub description: String,
}

/// Parse raw extraction output into a payload.
pub fn parse_extraction(raw: &str) -> Result<ExtractionPayload, ParseError> {
    parse_relaxed(raw)
}

/// What one merge pass persisted.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Entities created by this pass.
    pub created: Vec<Entity>,
    /// Existing entities re-mentioned by this pass (post-update state).
    pub re_mentioned: Vec<Entity>,
    /// Relationships created by this pass.
    pub relationships: Vec<Relationship>,
    /// Entity candidates dropped (blank name, unknown kind, store failure).
    pub skipped_entities: usize,
    /// Relationship candidates dropped (dangling endpoint, store failure).
    pub skipped_relationships: usize,
}

impl MergeReport {
    /// Total entities this pass touched.
    pub fn entities_touched(&self) -> usize {
        self.created.len() + self.re_mentioned.len()
    }
}

/// Merge an extraction payload into a book's story bible.
///
/// The name map is seeded with all existing entities for the book, keyed by
/// normalized name, then extended with entities created during the pass so
/// relationship candidates can reference brand-new names. Candidates are
/// isolated: one failing entity or edge is logged and skipped, never
/// aborting its siblings. Only the initial graph read propagates an error.
pub async fn merge_extraction(
    bible: &dyn StoryBible,
    book: BookId,
    payload: &ExtractionPayload,
    source_session: Option<SessionId>,
) -> Result<MergeReport, StoreError> {
    let mut report = MergeReport::default();

    let mut by_name: HashMap<String, Entity> = bible
        .get_entities(book, None)
        .await?
        .into_iter()
        .map(|e| (e.normalized_name(), e))
        .collect();

    for candidate in &payload.entities {
        let key = normalize_name(&candidate.name);
        if key.is_empty() {
            warn!("dropping extraction candidate with blank name");
            report.skipped_entities += 1;
            continue;
        }
        let Some(kind) = EntityKind::parse(&candidate.kind) else {
            warn!(
                name = %candidate.name,
                kind = %candidate.kind,
                "dropping extraction candidate with unknown kind"
            );
            report.skipped_entities += 1;
            continue;
        };

        if let Some(existing) = by_name.get(&key) {
            // Re-mention: bump the counter, and fill in the description only
            // if the stored one is blank. Existing prose is never overwritten.
            let result = if !existing.has_description()
                && !candidate.description.trim().is_empty()
            {
                let patch = EntityPatch::new()
                    .with_mention_count(existing.mention_count + 1)
                    .with_description(candidate.description.clone());
                bible.update_entity(existing.id, patch).await
            } else {
                increment_mention_count(bible, existing.id).await
            };

            match result {
                Ok(updated) => {
                    debug!(name = %updated.name, mentions = updated.mention_count, "re-mention");
                    by_name.insert(key, updated.clone());
                    report.re_mentioned.push(updated);
                }
                Err(error) => {
                    warn!(name = %candidate.name, %error, "re-mention update failed, skipping");
                    report.skipped_entities += 1;
                }
            }
        } else {
            let mut entity = Entity::new(book, kind, candidate.name.trim())
                .with_description(candidate.description.trim());
            if let Some(session) = source_session {
                entity = entity.with_first_session(session);
            }

            match bible.add_entity(entity).await {
                Ok(created) => {
                    debug!(name = %created.name, kind = created.kind.name(), "created entity");
                    by_name.insert(key, created.clone());
                    report.created.push(created);
                }
                Err(error) => {
                    warn!(name = %candidate.name, %error, "entity insert failed, skipping");
                    report.skipped_entities += 1;
                }
            }
        }
    }

    for candidate in &payload.relationships {
        let from = by_name.get(&normalize_name(&candidate.from));
        let to = by_name.get(&normalize_name(&candidate.to));
        let (Some(from), Some(to)) = (from, to) else {
            // Dangling reference: the edge is dropped, the batch continues.
            warn!(
                from = %candidate.from,
                to = %candidate.to,
                "dropping relationship with unresolvable endpoint"
            );
            report.skipped_relationships += 1;
            continue;
        };

        let relationship = Relationship::new(book, from.id, to.id, candidate.relation.trim())
            .with_description(candidate.description.trim());

        match bible.add_relationship(relationship).await {
            Ok(created) => report.relationships.push(created),
            Err(error) => {
                warn!(
                    from = %candidate.from,
                    to = %candidate.to,
                    %error,
                    "relationship insert failed, skipping"
                );
                report.skipped_relationships += 1;
            }
        }
    }

    debug!(
        created = report.created.len(),
        re_mentioned = report.re_mentioned.len(),
        relationships = report.relationships.len(),
        skipped_entities = report.skipped_entities,
        skipped_relationships = report.skipped_relationships,
        "extraction merge complete"
    );
    Ok(report)
}
