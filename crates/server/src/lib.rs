//! Mercadito server library.
//!
//! This crate provides the HTTP API as a library, allowing the router to be
//! driven in-process by tests as well as by the `mercadito-server` binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
