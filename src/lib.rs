//! Othello against a human: board rules, a time-boxed alpha-beta search and a
//! text game loop.

pub mod board;
pub mod engine;
pub mod game;
