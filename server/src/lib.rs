//! Lamp array wave server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod animation;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod layout;
pub mod stats;
pub mod streak;
pub mod touch;
pub mod transport;
pub mod wave;
pub mod words;
pub mod ws;
