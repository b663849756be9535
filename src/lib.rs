//! QuickShop cart library
//!
//! Cart reconciliation for the QuickShop storefront: anonymous and user
//! carts, add-to-cart with quantity accumulation, quantity updates, clearing
//! and discarding carts, and merging an anonymous cart into a user's cart at
//! login. Persistence goes through SeaORM; events are published on an
//! in-process channel.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;
pub mod services;

pub use errors::{ErrorResponse, ServiceError};
pub use services::commerce::{CartKey, CartService};
