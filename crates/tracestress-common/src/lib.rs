//! # tracestress-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the tracestress workspace.
//!
//! This crate is the leaf of the dependency graph. It owns the run context
//! that the harness hands to a stressor and the outcome types a stressor
//! hands back.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
