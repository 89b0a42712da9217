//! Application layer: the purchase workflow and the views built on top of it.
//!
//! `VoteOrchestrator` owns the purchase state machine and is the only caller
//! that credits votes. `AdminService` covers the allow-listed contestant
//! management paths, and `ranking` turns a store snapshot into standings.

pub mod admin;
pub mod orchestrator;
pub mod ranking;
