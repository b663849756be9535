/// Commerce services module - cart reconciliation
pub mod cart_service;

// Re-export services for convenience
pub use cart_service::{
    AddToCartInput, CartKey, CartService, CartWithItems, CreateCartInput, UpdateQuantityInput,
};
