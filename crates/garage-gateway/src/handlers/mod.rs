//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod clusters;
pub mod health;
pub mod nodes;
