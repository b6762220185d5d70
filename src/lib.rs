//! Quillpost - a blogging REST API
//!
//! Posts with tags, one-level comment threads, likes and reports, and
//! accounts with email confirmation and JWT authentication.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
