//! Mirrors the slippy map tiles covering a region from a remote tile API.
//!
//! The region's coverage is turned into a tree of empty placeholder tiles,
//! which later runs fill in a few downloads at a time.

pub mod boundary;
pub mod commands;
pub mod coverage;
pub mod error;
pub mod orchestrator;
pub mod slippy;
pub mod tile_api;
pub mod tile_store;
