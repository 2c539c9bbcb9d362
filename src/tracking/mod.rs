// src/tracking/mod.rs
//
// Persistent entity identities across frames.
//
//   ClassifiedRegions → tracker (greedy NN on Kalman predictions) → TrackedEntities
//                          ↑
//                     kalman::FilterArena (one filter per live id)

pub mod entity;
pub mod kalman;
pub mod tracker;

pub use entity::{TrackState, TrackedEntity};
pub use kalman::{ConstantVelocityFilter, FilterArena, KalmanConfig};
pub use tracker::{IdentityTracker, TrackerConfig, TrackerCounters, TrackerStatistics};
