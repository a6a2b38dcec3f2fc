//! The muse: extraction, synthesis, detection, and selection over the
//! story bible.

pub mod agent;
pub mod detector;
pub mod extraction;
pub mod payload;
pub mod selector;
pub mod story_bible;
pub mod synthesis;

pub use agent::{Muse, MuseConfig, MuseError};
pub use extraction::{ExtractionPayload, MergeReport};
pub use selector::EntityNetwork;
pub use synthesis::{SynthesisPayload, SynthesisReport};
