use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict, SimpleExpr};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entities::commerce::cart_item::{self, ActiveModel as CartItemActiveModel, Column};
use crate::entities::commerce::{CartItem, CartItemModel};
use crate::errors::ServiceError;

use super::Repository;

/// How an upsert treats the quantity of an existing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineQuantity {
    /// Add to the stored quantity (add-to-cart, merge)
    Increment(i32),
    /// Replace the stored quantity
    Set(i32),
}

impl LineQuantity {
    fn value(self) -> i32 {
        match self {
            LineQuantity::Increment(n) | LineQuantity::Set(n) => n,
        }
    }

    fn on_conflict_expr(self) -> SimpleExpr {
        match self {
            LineQuantity::Increment(n) => Expr::col((cart_item::Entity, Column::Quantity)).add(n),
            LineQuantity::Set(n) => Expr::value(n),
        }
    }

    /// Guard on the update branch: an increment only applies while the sum
    /// still fits the quantity column.
    fn on_conflict_guard(self) -> Option<SimpleExpr> {
        match self {
            LineQuantity::Increment(n) => Some(
                Expr::col((cart_item::Entity, Column::Quantity)).lte(i32::MAX.saturating_sub(n)),
            ),
            LineQuantity::Set(_) => None,
        }
    }
}

/// Repository for cart lines
#[derive(Debug)]
pub struct CartItemRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> CartItemRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_line(
        &self,
        cart_id: Uuid,
        product_id: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        Ok(CartItem::find_by_id((cart_id, product_id))
            .one(self.get_db())
            .await?)
    }

    /// Inserts the line or updates it in place with a single
    /// `INSERT .. ON CONFLICT (cart_id, product_id) DO UPDATE` statement,
    /// then returns the stored row.
    ///
    /// # Errors
    /// Returns `ServiceError::ValidationError` when an increment would push the
    /// stored quantity past `i32::MAX`; the line is left as it was.
    pub async fn upsert_line(
        &self,
        cart_id: Uuid,
        product_id: i32,
        quantity: LineQuantity,
    ) -> Result<CartItemModel, ServiceError> {
        let now = Utc::now();
        let line = CartItemActiveModel {
            cart_id: Set(cart_id),
            product_id: Set(product_id),
            quantity: Set(quantity.value()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let written = CartItem::insert(line)
            .on_conflict(
                OnConflict::columns([Column::CartId, Column::ProductId])
                    .value(Column::Quantity, quantity.on_conflict_expr())
                    .update_column(Column::UpdatedAt)
                    .action_and_where_option(quantity.on_conflict_guard())
                    .to_owned(),
            )
            .exec_without_returning(self.get_db())
            .await?;

        if written == 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for product {} in cart {} would exceed {}",
                product_id,
                cart_id,
                i32::MAX
            )));
        }

        self.find_line(cart_id, product_id).await?.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Line for product {} in cart {} vanished after upsert",
                product_id, cart_id
            ))
        })
    }

    /// Sets the absolute quantity of an existing line. Returns the number of
    /// rows touched, so `0` means the line does not exist.
    pub async fn set_quantity(
        &self,
        cart_id: Uuid,
        product_id: i32,
        quantity: i32,
    ) -> Result<u64, ServiceError> {
        let result = CartItem::update_many()
            .col_expr(Column::Quantity, Expr::value(quantity))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::CartId.eq(cart_id))
            .filter(Column::ProductId.eq(product_id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_line(&self, cart_id: Uuid, product_id: i32) -> Result<u64, ServiceError> {
        let result = CartItem::delete_by_id((cart_id, product_id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    /// Lines of a cart, oldest first
    pub async fn list_lines(&self, cart_id: Uuid) -> Result<Vec<CartItemModel>, ServiceError> {
        Ok(CartItem::find()
            .filter(Column::CartId.eq(cart_id))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::ProductId)
            .all(self.get_db())
            .await?)
    }

    pub async fn delete_all_lines(&self, cart_id: Uuid) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(Column::CartId.eq(cart_id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }
}

impl<'a, C: ConnectionTrait> Repository for CartItemRepository<'a, C> {
    type Conn = C;

    fn get_db(&self) -> &C {
        self.db
    }
}
