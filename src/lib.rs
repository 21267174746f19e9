//! tandem - keeps two-player turn-based sessions in sync across server processes
//!
//! This crate provides the core functionality for tandem, including:
//! - Shared session records with TTL (Redis or in-memory)
//! - Per-session event bus between server processes
//! - Connection registry and fan-out to attached players
//! - Clock arbitration for timed games
//! - WebSocket protocol handling
//!
//! # Architecture
//!
//! Any number of stateless `tandem-server` processes share one store and one
//! bus. Each player's WebSocket lands on some process; moves are validated
//! against the shared record, written back, and published so that the
//! process holding the opponent's connection can deliver them.

pub mod bus;
pub mod clock;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod rules;
pub mod server;
pub mod store;

pub use store::Side;
