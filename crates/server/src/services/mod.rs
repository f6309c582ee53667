//! Business services on top of the repositories.

pub mod auth;
pub mod checkout;

pub use auth::{AuthError, AuthService, JwtKeys};
pub use checkout::{CheckoutError, CheckoutService};
