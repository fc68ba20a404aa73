//! Credit Scoring Engine Library
//!
//! This library provides the core functionality for the credit scoring API:
//! a deterministic scoring engine that converts self-reported financial,
//! business, and social data into a normalized creditworthiness score, a
//! risk classification, and actionable recommendations, for individual
//! users and for cohorts.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and shared state.
//! - `models`: Core data models and wire DTOs.
//! - `scoring`: Pure factor calculators and the score aggregator.
//! - `services`: Individual and group scoring orchestrators.
//! - `store`: Persistence boundary (profile store adapter).

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod scoring;
pub mod services;
pub mod store;
