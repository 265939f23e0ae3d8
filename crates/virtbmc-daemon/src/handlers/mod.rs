//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the daemon API.

pub mod bmcs;
pub mod health;
