//! Sprocket League - authoritative vehicle-soccer game server
//!
//! Cars push a ball into goals inside a walled arena. The server owns the
//! simulation: it applies control inputs, integrates physics, detects goals
//! and keeps per-team scores and rosters. Clients connect over WebSocket and
//! receive object lifecycle events, periodic snapshots and metadata updates.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod hud;
pub mod util;
pub mod ws;
