// src/lib.rs

//! Competitor intelligence crawler library.
//!
//! Watches competitor release notes and documentation, detects which
//! sections changed since the last run, and turns relevant changes into
//! capability events.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
