//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login and bearer tokens
//! - `catalog` - Product and dashboard caches
//! - `email` - Transactional and newsletter email over SMTP
//! - `payments` - Payment gateway client and signature checks

pub mod auth;
pub mod catalog;
pub mod email;
pub mod payments;

pub use auth::{AuthError, AuthService};
pub use catalog::CatalogCache;
pub use email::{EmailError, EmailService, Notification};
pub use payments::{PaymentError, PaymentGateway};
