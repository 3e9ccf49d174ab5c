//! Business logic layer for the storefront.
//!
//! The services coordinate the session cart, the product catalog, order
//! persistence, and the outbound assistant call, providing transactional
//! guarantees, input validation, and repository abstraction.
//!
//! # Features
//! - Stock-clamped cart mutation and the priced cart view ([`cart`]).
//! - Atomic checkout: order plus items in one transaction ([`checkout`]).
//! - Effective-price resolution for flash sales ([`pricing`]).
//! - Assistant proxy with explicit downstream-failure mapping ([`assistant`]).
//! - Account registration and login ([`auth`]).
//! - Dependency injection for testability and loose coupling.
//! - Well-typed error handling via [`ServiceError`].

use repository::RepositoryError;
use serde::Serialize;
use thiserror::Error;

pub mod assistant;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod pricing;

#[cfg(test)]
pub(crate) mod test_support;

pub use assistant::{
    AssistantConfig, AssistantService, GenerationClient, GenerationError, HttpGenerationClient,
};
pub use auth::{AuthError, AuthService};
pub use cart::{CartOutcome, CartService, RejectReason};
pub use checkout::{CheckoutError, CheckoutService, OrderWriter, PgOrderWriter, PlacedOrder};
pub use pricing::{effective_price, is_flash_active};

/// The main error type for service-layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The provided input is structurally or semantically invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The referenced entity does not exist.
    #[error("Not found")]
    NotFound,
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
    /// Some unexpected or unhandled error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// One field-level validation failure, as surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
