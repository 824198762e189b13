//! Zyvarin - compose once, publish everywhere
//!
//! This library provides the core functionality for the Zyvarin
//! cross-posting backend: social account connections, post scheduling,
//! AI content variations, billing, teams, and the public blog.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
