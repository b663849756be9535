use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::debug;
use uuid::Uuid;

use crate::entities::commerce::cart::{ActiveModel as CartActiveModel, Column};
use crate::entities::commerce::{Cart, CartModel};
use crate::errors::ServiceError;

use super::Repository;

/// Repository for cart records
#[derive(Debug)]
pub struct CartRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> CartRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a cart by its token
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CartModel>, ServiceError> {
        Ok(Cart::find_by_id(id).one(self.get_db()).await?)
    }

    /// Find the cart owned by a user
    pub async fn find_by_user(&self, user_id: i32) -> Result<Option<CartModel>, ServiceError> {
        Ok(Cart::find()
            .filter(Column::UserId.eq(user_id))
            .one(self.get_db())
            .await?)
    }

    /// Insert a new anonymous cart with a fresh v4 token
    pub async fn create_anonymous(&self) -> Result<CartModel, ServiceError> {
        let now = Utc::now();
        let cart = CartActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(cart.insert(self.get_db()).await?)
    }

    /// Returns the user's cart, inserting it first when the user has none.
    ///
    /// The boolean is `true` when this call created the row. Concurrent
    /// callers converge on one cart through the unique `user_id` column.
    pub async fn ensure_for_user(&self, user_id: i32) -> Result<(CartModel, bool), ServiceError> {
        let now = Utc::now();
        let cart = CartActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(user_id)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = Cart::insert(cart)
            .on_conflict(OnConflict::column(Column::UserId).do_nothing().to_owned())
            .exec_without_returning(self.get_db())
            .await?;

        let cart = self.find_by_user(user_id).await?.ok_or_else(|| {
            ServiceError::InternalError(format!("Cart for user {} vanished after upsert", user_id))
        })?;

        debug!(cart_id = %cart.id, user_id, created = inserted > 0, "User cart ensured");
        Ok((cart, inserted > 0))
    }

    /// Delete a cart record. Its lines must already be gone.
    pub async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        let result = Cart::delete_by_id(id).exec(self.get_db()).await?;
        Ok(result.rows_affected)
    }

    /// Bump `updated_at` after a line mutation
    pub async fn touch(&self, id: Uuid) -> Result<(), ServiceError> {
        Cart::update_many()
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(self.get_db())
            .await?;
        Ok(())
    }
}

impl<'a, C: ConnectionTrait> Repository for CartRepository<'a, C> {
    type Conn = C;

    fn get_db(&self) -> &C {
        self.db
    }
}
