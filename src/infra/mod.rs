//! Infrastructure layer (adapters/implementations).
//!
//! This module contains IO-heavy integrations (SQLite, HTTP, filesystem).

pub mod app_config;
pub mod capabilities;
pub mod db;
pub mod llm;
pub mod paper_search;
pub mod payload;
