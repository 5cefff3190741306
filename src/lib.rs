//! Restaurant discovery and curation service.
//!
//! Searches the Naver local API around a point, enriches and scores the
//! results, caches them by location, and makes weighted random picks.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
