//! # ReliefNet: disaster-relief coordination core
//!
//! Finds verified incident reports near a user, keeps a batched AI translation
//! cache for UI strings, and stores reports, donations and users.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, validation and defaults
//! - **[`geo`]**: Coordinates, haversine distance, proximity filter, geolocation seam
//! - **[`generator`]**: Text-generation trait with Gemini and mock backends
//! - **[`translation`]**: Debounced, persisted, per-language translation cache
//! - **[`db`]**: SQLite document store for reports, donations and users
//! - **[`alerts`]**: Nearby verified reports around the user's position
//! - **[`assistant`]**: Safety chat assistant with typed failure outcomes
//! - **[`weather`]**: Current conditions via Open-Meteo

pub mod alerts;
pub mod assistant;
pub mod config;
pub mod db;
pub mod generator;
pub mod geo;
pub mod translation;
pub mod weather;
