//! # ECMWF Charts MCP Server Core
//!
//! This module turns product/time requests into ECMWF OpenCharts chart fetches.
//!
//! ## Features
//! - Static catalog of sub-seasonal and medium-range chart products
//! - Weekly valid times computed locally, six-hourly ones asked upstream
//! - Cadence validation of (base_time, valid_time) pairs
//! - Chart retrieval with metadata and pass-through image bytes
//!
//! ## Modules
//! - `catalog`: Product table and range/parameter filters
//! - `error`: Custom error types and error handling
//! - `models`: Tool requests, results and chart payloads
//! - `orchestrator`: Chart fetch orchestration over a chart source
//! - `source`: The upstream chart source abstraction
//! - `time_model`: Timestamp parsing and cadence rules

pub mod catalog;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod source;
pub mod time_model;
