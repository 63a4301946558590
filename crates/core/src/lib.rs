//! Mindy Munchs Core - Shared domain types.
//!
//! This crate provides the types used across all Mindy Munchs components:
//! - `api` - The REST backend (storefront and admin endpoints)
//! - `cli` - Command-line tools for migrations, admin accounts and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure business rules - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, statuses and stock levels
//! - [`validation`] - Field-level validation helpers shared by request bodies
//! - [`admin`] - Super-admin protection list and the admin ordering rule

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin;
pub mod types;
pub mod validation;

pub use admin::SuperAdminList;
pub use types::*;
pub use validation::ValidationError;
