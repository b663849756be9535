use crate::{
    db::with_transaction,
    entities::commerce::{CartItemModel, CartModel},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{
        CartItemRepository, CartRepository, LineQuantity, ProductRepository, UserRepository,
    },
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Identifies the cart an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartKey {
    /// Any cart addressed by its token; anonymous carts are only reachable this way
    Token(Uuid),
    /// The single cart owned by a user
    User(i32),
}

impl CartKey {
    /// Parses a client-supplied cart token.
    ///
    /// Only the hyphenated form of an RFC 4122 version 4 UUID is accepted.
    pub fn parse_token(raw: &str) -> Result<Self, ServiceError> {
        let invalid =
            || ServiceError::ValidationError(format!("cartId must be a UUID v4: {}", raw));

        if raw.len() != 36 {
            return Err(invalid());
        }
        let token = Uuid::try_parse(raw).map_err(|_| invalid())?;
        if token.get_version_num() != 4 || token.get_variant() != uuid::Variant::RFC4122 {
            return Err(invalid());
        }

        Ok(CartKey::Token(token))
    }

    fn validate(&self) -> Result<(), ServiceError> {
        match self {
            CartKey::User(user_id) => validate_id("userId", *user_id),
            CartKey::Token(_) => Ok(()),
        }
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartKey::Token(id) => write!(f, "Cart {}", id),
            CartKey::User(user_id) => write!(f, "Cart for user {}", user_id),
        }
    }
}

fn validate_id(field: &str, id: i32) -> Result<(), ServiceError> {
    if id < 1 {
        return Err(ServiceError::ValidationError(format!(
            "{} must be a positive integer, got {}",
            field, id
        )));
    }
    Ok(())
}

/// Cart reconciliation service.
///
/// Owns every write to carts and cart lines: creation, add-to-cart with
/// quantity accumulation, absolute quantity updates, line removal, clearing a
/// cart, discarding an anonymous cart, and folding an anonymous cart into a
/// user's cart at login.
///
/// Uniqueness of `(cart, product)` lines is held by the store: adds go through
/// a composite-key upsert and multi-statement operations run in a single
/// transaction. Events are published only after the transaction commits.
///
/// # Examples
///
/// ```ignore
/// use quickshop_cart::services::commerce::{AddToCartInput, CartKey, CartService};
///
/// let cart_service = CartService::new(db, event_sender);
///
/// let cart = cart_service.create_cart(CreateCartInput::anonymous()).await?;
/// cart_service
///     .add_item(CartKey::Token(cart.id), AddToCartInput { product_id: 7, quantity: 2 })
///     .await?;
///
/// // On login
/// cart_service.merge_carts(user_id, cart.id).await?;
/// ```
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing cart events
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a cart.
    ///
    /// Without an owner a new anonymous cart with a fresh token is inserted.
    /// With an owner the user's existing cart is returned if there is one, so
    /// repeated or concurrent calls for one user all yield the same cart.
    /// `CartCreated` is published only when a row was inserted.
    ///
    /// # Returns
    ///
    /// * `Ok(CartModel)` - The new or existing cart
    /// * `Err(ServiceError::ValidationError)` - Non-positive user id
    /// * `Err(ServiceError::NotFound)` - Unknown user
    #[instrument(skip(self))]
    pub async fn create_cart(&self, input: CreateCartInput) -> Result<CartModel, ServiceError> {
        input.validate()?;

        let carts = CartRepository::new(&*self.db);
        let (cart, created) = match input.user_id {
            Some(user_id) => {
                ensure_user_exists(&*self.db, user_id).await?;
                carts.ensure_for_user(user_id).await?
            }
            None => (carts.create_anonymous().await?, true),
        };

        if created {
            self.event_sender
                .send_or_log(Event::CartCreated(cart.id))
                .await;
            info!(cart_id = %cart.id, user_id = ?cart.user_id, "Created cart");
        }

        Ok(cart)
    }

    /// Adds a product to the cart, accumulating onto an existing line.
    ///
    /// The line is written with one `INSERT .. ON CONFLICT DO UPDATE`, so
    /// concurrent adds of the same product never produce a second line and
    /// never lose an increment. A user key provisions the user's cart if it
    /// does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `key` - Target cart
    /// * `input` - Product id and the quantity to add
    ///
    /// # Returns
    ///
    /// * `Ok(CartItemModel)` - The line after accumulation
    /// * `Err(ServiceError::ValidationError)` - Non-positive product id or
    ///   quantity, or a line total that would pass `i32::MAX`
    /// * `Err(ServiceError::NotFound)` - Cart, user or product not found
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        key: CartKey,
        input: AddToCartInput,
    ) -> Result<CartItemModel, ServiceError> {
        key.validate()?;
        input.validate()?;

        let AddToCartInput {
            product_id,
            quantity,
        } = input;

        let (line, cart_created) = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let (cart, created) = match key {
                    CartKey::Token(_) => (find_cart(txn, key).await?, false),
                    CartKey::User(user_id) => {
                        ensure_user_exists(txn, user_id).await?;
                        CartRepository::new(txn).ensure_for_user(user_id).await?
                    }
                };

                if !ProductRepository::new(txn).exists(product_id).await? {
                    return Err(ServiceError::NotFound(format!(
                        "Product {} not found",
                        product_id
                    )));
                }

                let line = CartItemRepository::new(txn)
                    .upsert_line(cart.id, product_id, LineQuantity::Increment(quantity))
                    .await?;
                CartRepository::new(txn).touch(cart.id).await?;

                Ok((line, created))
            })
        })
        .await
        .map_err(|e| {
            warn!(%key, product_id, error = %e, "Add to cart rejected");
            e
        })?;

        if cart_created {
            self.event_sender
                .send_or_log(Event::CartCreated(line.cart_id))
                .await;
        }
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: line.cart_id,
                product_id,
                quantity,
            })
            .await;

        info!(
            cart_id = %line.cart_id,
            product_id,
            added = quantity,
            total = line.quantity,
            "Added item to cart"
        );
        Ok(line)
    }

    /// Lists the lines of a cart, oldest first (ties broken by product id).
    ///
    /// An existing cart without lines yields an empty list; an unknown token
    /// or a user without a cart is `NotFound`.
    #[instrument(skip(self))]
    pub async fn get_items(&self, key: CartKey) -> Result<Vec<CartItemModel>, ServiceError> {
        key.validate()?;

        let cart = find_cart(&*self.db, key).await?;
        CartItemRepository::new(&*self.db).list_lines(cart.id).await
    }

    /// Retrieves a cart together with its ordered lines.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, key: CartKey) -> Result<CartWithItems, ServiceError> {
        key.validate()?;

        let cart = find_cart(&*self.db, key).await?;
        let items = CartItemRepository::new(&*self.db).list_lines(cart.id).await?;

        Ok(CartWithItems { cart, items })
    }

    /// Sets the absolute quantity of an existing line.
    ///
    /// Unlike [`CartService::add_item`] the stored quantity is replaced, not
    /// increased. The line must already exist.
    ///
    /// # Returns
    ///
    /// * `Ok(CartItemModel)` - The updated line
    /// * `Err(ServiceError::ValidationError)` - Quantity below 1
    /// * `Err(ServiceError::NotFound)` - Cart or line not found
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        key: CartKey,
        product_id: i32,
        input: UpdateQuantityInput,
    ) -> Result<CartItemModel, ServiceError> {
        key.validate()?;
        validate_id("productId", product_id)?;
        input.validate()?;

        let quantity = input.quantity;
        let line = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let cart = find_cart(txn, key).await?;
                let items = CartItemRepository::new(txn);

                if items.set_quantity(cart.id, product_id, quantity).await? == 0 {
                    return Err(line_not_found(cart.id, product_id));
                }
                CartRepository::new(txn).touch(cart.id).await?;

                items
                    .find_line(cart.id, product_id)
                    .await?
                    .ok_or_else(|| line_not_found(cart.id, product_id))
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: line.cart_id,
                product_id,
                quantity,
            })
            .await;

        info!(cart_id = %line.cart_id, product_id, quantity, "Updated cart line quantity");
        Ok(line)
    }

    /// Removes one product line from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, key: CartKey, product_id: i32) -> Result<(), ServiceError> {
        key.validate()?;
        validate_id("productId", product_id)?;

        let cart_id = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let cart = find_cart(txn, key).await?;

                if CartItemRepository::new(txn)
                    .delete_line(cart.id, product_id)
                    .await?
                    == 0
                {
                    return Err(line_not_found(cart.id, product_id));
                }
                CartRepository::new(txn).touch(cart.id).await?;

                Ok(cart.id)
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id,
                product_id,
            })
            .await;

        info!(%cart_id, product_id, "Removed item from cart");
        Ok(())
    }

    /// Empties the cart. The cart record itself is kept, so a user's cart
    /// persists with zero lines.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, key: CartKey) -> Result<(), ServiceError> {
        key.validate()?;

        let (cart_id, removed) = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let cart = find_cart(txn, key).await?;
                let removed = CartItemRepository::new(txn)
                    .delete_all_lines(cart.id)
                    .await?;
                CartRepository::new(txn).touch(cart.id).await?;
                Ok((cart.id, removed))
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;

        info!(%cart_id, lines_removed = removed, "Cleared cart");
        Ok(())
    }

    /// Deletes an anonymous cart and all of its lines.
    ///
    /// User carts cannot be discarded; use [`CartService::clear_cart`] to
    /// empty them.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::NotFound)` - Cart not found
    /// * `Err(ServiceError::InvalidOperation)` - Cart is owned by a user
    #[instrument(skip(self))]
    pub async fn discard_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let cart = find_cart(txn, CartKey::Token(cart_id)).await?;
                if !cart.is_anonymous() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Cart {} belongs to a user and can only be cleared",
                        cart_id
                    )));
                }

                CartItemRepository::new(txn)
                    .delete_all_lines(cart_id)
                    .await?;
                CartRepository::new(txn).delete(cart_id).await?;
                Ok(())
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::CartDiscarded(cart_id))
            .await;

        info!(%cart_id, "Discarded anonymous cart");
        Ok(())
    }

    /// Folds an anonymous cart into the user's cart and deletes it.
    ///
    /// Runs as one transaction: the user cart is provisioned if missing, each
    /// anonymous line is upserted with the same accumulate rule as
    /// [`CartService::add_item`], then the anonymous lines and cart are
    /// deleted. A storage failure at any step rolls the whole merge back and
    /// surfaces as `TransactionFailed`. Calling it again with the same token
    /// fails with `NotFound`.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The user who just authenticated
    /// * `anonymous_cart_id` - Token of the cart built before login
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Merge committed
    /// * `Err(ServiceError::NotFound)` - User or anonymous cart not found
    /// * `Err(ServiceError::InvalidOperation)` - Source cart is owned by a user
    /// * `Err(ServiceError::ValidationError)` - A merged line would pass `i32::MAX`
    /// * `Err(ServiceError::TransactionFailed)` - Storage failure, nothing applied
    #[instrument(skip(self))]
    pub async fn merge_carts(
        &self,
        user_id: i32,
        anonymous_cart_id: Uuid,
    ) -> Result<bool, ServiceError> {
        validate_id("userId", user_id)?;

        let outcome = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                ensure_user_exists(txn, user_id).await?;

                let carts = CartRepository::new(txn);
                let items = CartItemRepository::new(txn);

                let anonymous = carts.find_by_id(anonymous_cart_id).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Anonymous cart {} not found",
                        anonymous_cart_id
                    ))
                })?;
                if !anonymous.is_anonymous() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Cart {} belongs to a user and cannot be merged",
                        anonymous_cart_id
                    )));
                }

                let (user_cart, created) = carts.ensure_for_user(user_id).await?;

                let lines = items.list_lines(anonymous.id).await?;
                for line in &lines {
                    items
                        .upsert_line(
                            user_cart.id,
                            line.product_id,
                            LineQuantity::Increment(line.quantity),
                        )
                        .await?;
                }

                items.delete_all_lines(anonymous.id).await?;
                carts.delete(anonymous.id).await?;
                carts.touch(user_cart.id).await?;

                Ok(MergeOutcome {
                    user_cart_id: user_cart.id,
                    user_cart_created: created,
                    lines_merged: lines.len(),
                })
            })
        })
        .await
        .map_err(|e| {
            let e = e.into_transaction_failure();
            match &e {
                ServiceError::TransactionFailed(_) => {
                    error!(user_id, %anonymous_cart_id, error = %e, "Cart merge rolled back")
                }
                _ => warn!(user_id, %anonymous_cart_id, error = %e, "Cart merge rejected"),
            }
            e
        })?;

        if outcome.user_cart_created {
            self.event_sender
                .send_or_log(Event::CartCreated(outcome.user_cart_id))
                .await;
        }
        self.event_sender
            .send_or_log(Event::CartsMerged {
                user_cart_id: outcome.user_cart_id,
                anonymous_cart_id,
                lines_merged: outcome.lines_merged,
            })
            .await;

        info!(
            user_id,
            user_cart_id = %outcome.user_cart_id,
            %anonymous_cart_id,
            lines_merged = outcome.lines_merged,
            "Merged anonymous cart into user cart"
        );
        Ok(true)
    }
}

struct MergeOutcome {
    user_cart_id: Uuid,
    user_cart_created: bool,
    lines_merged: usize,
}

async fn find_cart<C>(conn: &C, key: CartKey) -> Result<CartModel, ServiceError>
where
    C: ConnectionTrait,
{
    let carts = CartRepository::new(conn);
    let found = match key {
        CartKey::Token(id) => carts.find_by_id(id).await?,
        CartKey::User(user_id) => carts.find_by_user(user_id).await?,
    };
    found.ok_or_else(|| ServiceError::NotFound(format!("{} not found", key)))
}

async fn ensure_user_exists<C>(conn: &C, user_id: i32) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    if UserRepository::new(conn).exists(user_id).await? {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}

fn line_not_found(cart_id: Uuid, product_id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Product {} is not in cart {}", product_id, cart_id))
}

/// Input for creating a cart
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateCartInput {
    /// Owner of the cart; `None` creates an anonymous cart
    #[validate(range(min = 1))]
    pub user_id: Option<i32>,
}

impl CreateCartInput {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn for_user(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// Input for adding item to cart
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddToCartInput {
    #[validate(range(min = 1))]
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Input for setting a line's quantity
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuantityInput {
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Cart with items
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<CartItemModel>,
}
