//! Per-server sync passes.

mod commit;
pub mod decision;
mod engine;
mod episodes;
pub mod fields;
mod movies;
mod parents;
mod pass;
pub mod report;
mod seasons;
pub mod settings;
mod shows;
pub mod strategy;

pub use decision::{EntityRef, FieldChange, SyncDecision};
pub use engine::SyncEngine;
pub use report::{
    EntitySyncResults, PerformanceStats, StrategyKind, SyncFailure, SyncReport,
    UpdatedEntity,
};
pub use settings::SyncSettings;
pub use strategy::{SyncStrategy, detect_strategy};
