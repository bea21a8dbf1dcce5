//! Orchestration layer: game operations, league resolution, the adaptive
//! scheduler, and its activity/visibility wrappers.

pub mod activity;
pub mod game_service;
pub mod league_service;
pub mod notifier;
pub mod scheduler;
pub mod storage_supervisor;
