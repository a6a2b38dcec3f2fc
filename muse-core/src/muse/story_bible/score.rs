//! Effective score computation for backlog items.
//!
//! The effective score combines four independent integer signals:
//!
//! ```text
//! effective_score = base_priority + age_bonus + type_weight + finish_bonus
//! ```
//!
//! The age bonus is a book-wide proxy (total session count, not per-item
//! age): item creation sessions are not tracked reliably enough to compute
//! true per-item age, so every open item ages together. This is a documented
//! approximation, not a bug.
//!
//! Scores are not clamped; negative and zero scores are valid and rank low.

use super::backlog::BacklogItem;
use serde::{Deserialize, Serialize};

/// Sessions that must pass for the age bonus to grow by one.
const SESSIONS_PER_AGE_STEP: u32 = 3;

/// Bonus for entity-linked items once the book has draft content.
const FINISH_BONUS: i32 = 2;

/// Book-wide signals the scorer needs, fetched once per ranking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreContext {
    /// Total sessions recorded for the book so far.
    pub session_count: u32,
    /// Whether any file exists in the book's drafts folder.
    pub has_drafts: bool,
}

/// Age bonus: `floor(session_count / 3)`.
pub fn age_bonus(session_count: u32) -> i32 {
    (session_count / SESSIONS_PER_AGE_STEP) as i32
}

/// Finish bonus: +2 iff the book has draft content and this item is linked
/// to a specific entity. Entity-linked follow-ups plausibly block finishing
/// a passage once drafting has started, so they jump the queue.
pub fn finish_bonus(item: &BacklogItem, has_drafts: bool) -> i32 {
    if has_drafts && item.source_entity.is_some() {
        FINISH_BONUS
    } else {
        0
    }
}

/// The four score terms for one item, kept separate for diagnostics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_priority: i32,
    pub age_bonus: i32,
    pub type_weight: i32,
    pub finish_bonus: i32,
}

impl ScoreBreakdown {
    /// Sum of all four terms.
    pub fn total(&self) -> i32 {
        self.base_priority + self.age_bonus + self.type_weight + self.finish_bonus
    }
}

/// Compute the score breakdown for a backlog item.
pub fn score_breakdown(item: &BacklogItem, ctx: &ScoreContext) -> ScoreBreakdown {
    ScoreBreakdown {
        base_priority: item.priority,
        age_bonus: age_bonus(ctx.session_count),
        type_weight: item.kind.weight(),
        finish_bonus: finish_bonus(item, ctx.has_drafts),
    }
}

/// Compute the effective ranking score for a backlog item.
pub fn effective_score(item: &BacklogItem, ctx: &ScoreContext) -> i32 {
    score_breakdown(item, ctx).total()
}
