use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

use crate::entities::product::Entity as Product;
use crate::errors::ServiceError;

use super::Repository;

/// Read-only product lookups used by the cart core.
#[derive(Debug)]
pub struct ProductRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ProductRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn exists(&self, id: i32) -> Result<bool, ServiceError> {
        let count = Product::find_by_id(id).count(self.get_db()).await?;
        Ok(count > 0)
    }
}

impl<'a, C: ConnectionTrait> Repository for ProductRepository<'a, C> {
    type Conn = C;

    fn get_db(&self) -> &C {
        self.db
    }
}
