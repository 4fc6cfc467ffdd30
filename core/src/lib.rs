//! Staged-outcome simulation engine.
//!
//! A participant starts with a fixed balance and makes an up/down call at
//! each stage against a synthetic price chart. Every stage result comes
//! from a fixed outcome table; the chart is drawn afterwards to match.

pub mod clock;
pub mod collaborator;
pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod event;
pub mod market;
pub mod notification;
pub mod operation;
pub mod outcome;
pub mod rng;
pub mod snapshot;
pub mod timer;
pub mod types;
pub mod wager;
