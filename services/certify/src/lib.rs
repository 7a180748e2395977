//! certify: issues completion certificates.
//!
//! This crate primarily ships a `certify` binary, but we expose the library
//! surface to enable integration testing and reuse.

pub mod api;
pub mod config;
pub mod files;
pub mod name;
pub mod render;
pub mod service;
pub mod state;
pub mod store;
