use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

use crate::entities::user::Entity as User;
use crate::errors::ServiceError;

use super::Repository;

#[derive(Debug)]
pub struct UserRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Whether a user with this id has been registered
    pub async fn exists(&self, id: i32) -> Result<bool, ServiceError> {
        let count = User::find_by_id(id).count(self.get_db()).await?;
        Ok(count > 0)
    }
}

impl<'a, C: ConnectionTrait> Repository for UserRepository<'a, C> {
    type Conn = C;

    fn get_db(&self) -> &C {
        self.db
    }
}
