//! Fieldhands library crate — re-exports all modules for integration testing.
//!
//! An autonomous farm scheduler: a farmer working a per-zone task queue,
//! seven kinds of bots driven by small state machines, a seasonal crop
//! market and the buildings and money that tie them together.
//!
//! Everything lives in the [`sim::Simulation`] resource and advances through
//! [`sim::Simulation::tick`]. The plugins wrap that core with request events
//! and publish what each tick produced, so the binary and the `tests/`
//! integration tests can drive it headlessly.

pub mod shared;
pub mod data;
pub mod grid;
pub mod wildlife;
pub mod market;
pub mod farming;
pub mod bots;
pub mod world;
pub mod economy;
pub mod sim;
pub mod save;
