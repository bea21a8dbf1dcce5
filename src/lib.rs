//! Library crate for domino-league-back, exposing the game lifecycle engine,
//! the league status resolver, and the adaptive scheduler for binaries and
//! integration tests.

pub mod clock;
pub mod config;
pub mod dao;
pub mod error;
pub mod game;
pub mod league;
pub mod services;
pub mod state;
