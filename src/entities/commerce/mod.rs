/// Commerce entities module
pub mod cart;
pub mod cart_item;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use super::product::{Entity as Product, Model as ProductModel};
pub use super::user::{Entity as User, Model as UserModel};
