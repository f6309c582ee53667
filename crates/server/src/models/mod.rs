//! Domain types.
//!
//! These represent validated domain objects separate from database row
//! types; repositories map rows into them and routes serialize them.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem};
pub use product::{Category, Product};
pub use user::{CurrentUser, User};
