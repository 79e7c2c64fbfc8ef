//! Local driver for the repertoire engine: studies and games from disk in,
//! JSON findings out.

pub mod config;
pub mod error;
pub mod filter;
pub mod input;
pub mod output;
pub mod runner;
