//! Shared fixtures for the end-to-end tests
//!
//! Each test binary uses a different subset of the harness.
#![allow(dead_code)]

pub mod config;
pub mod mock_provider;
pub mod mock_store;
pub mod studio;
