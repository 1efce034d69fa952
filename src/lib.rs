//! Blink Motors: REST backend for users, products, orders, reviews and blogs.
//!
//! Documents live in an embedded Sled store, one tree per collection.
//! Sensitive routes require a bearer token issued by `PUT /user/:email`;
//! promoting a user to admin additionally requires the caller to be an admin.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
// REST API module: Axum router and handlers
pub mod rest;
pub mod storage;
