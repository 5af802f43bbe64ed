// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the spatial graph crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`database`] - Instrumented in-memory store with failure injection
//! - [`fixtures`] - Fixture archetypes, graph builders and log setup

pub mod database;
pub mod fixtures;

pub use database::{InstrumentedDatabase, Op};
pub use fixtures::{
    city, highway, init_tracing, star, Capital, City, Highway, Memo, Railway,
};
