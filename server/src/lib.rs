//! Mazra Server
//!
//! Admission-control gateway for the Mazra agricultural platform. Every
//! inbound request passes through distributed, sliding-window rate limiting
//! before reaching dashboards, IoT ingestion, or CRUD services.

pub mod admission;
pub mod api;
pub mod config;
pub mod db;
