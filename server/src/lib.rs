/// Server library crate: the game server's subsystems, exposed so the
/// integration tests can drive them without a live socket loop.
pub mod act;
pub mod commands;
pub mod copyover;
pub mod crash;
pub mod db;
pub mod game_loop;
pub mod net;
pub mod paths;
pub mod profiling;
pub mod rng;
pub mod session;
pub mod world;
