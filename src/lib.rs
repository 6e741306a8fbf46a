//! Threaded blog comments with a read-through reply-tree cache in front of
//! Postgres.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
