// Copyright 2026 Vitrin Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vitrin runtime library: product-page crawling behind a CRUD API.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(dead_code, unused_imports, clippy::new_without_default)]

pub mod cli;
pub mod crawl;
pub mod enhance;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod maintenance;
pub mod model;
pub mod renderer;
pub mod rest;
pub mod server;
pub mod store;
