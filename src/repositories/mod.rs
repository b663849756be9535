use sea_orm::ConnectionTrait;

pub mod cart_item_repository;
pub mod cart_repository;
pub mod product_repository;
pub mod user_repository;

pub use cart_item_repository::{CartItemRepository, LineQuantity};
pub use cart_repository::CartRepository;
pub use product_repository::ProductRepository;
pub use user_repository::UserRepository;

/// Repository trait for common database operations.
///
/// Repositories borrow any connection, so the same type works over the pool
/// and inside an open transaction.
pub trait Repository {
    type Conn: ConnectionTrait;

    fn get_db(&self) -> &Self::Conn;
}
