pub mod types;
pub mod error;
pub mod config;
pub mod geometry;
pub mod match_state;
pub mod builder;
pub mod mutator;
pub mod eligibility;
pub mod store;
pub mod service;
pub mod telemetry;

pub use builder::{build_bracket, build_team_bracket};
pub use config::{load_config, EngineConfig, ReachabilityDepth};
pub use eligibility::{evaluate_wager, is_biddable, resolve_eligibility, resolve_for_contender, OpenWagers};
pub use error::{BracketError, ConfigError, ErrorKind, ServiceError, StoreError};
pub use mutator::{
    advance_winner, apply_report, handle_participant_removal, mark_match_as_requires_admin, start_match,
};
pub use service::TournamentService;
pub use store::{MemoryStore, SnapshotStore};
pub use telemetry::init_tracing;
pub use types::*;
