//! HTTP handlers, one module per dashboard page.

pub mod admin;
pub mod auth;
pub mod hr;
pub mod inbox;
pub mod marketing;
pub mod sales;
pub mod tenant;
