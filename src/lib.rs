//! Arena Shooter Server - authoritative multiplayer FPS gameplay
//!
//! The library exposes the gameplay core (arenas, weapons, hit
//! resolution, health) so integration tests and embedders can drive an
//! arena directly; the binary in `main.rs` wires it to the network.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
