//! Checkout: turn the current priced cart view into a persisted order.
//!
//! Totals are always recomputed server-side from authoritative prices; the
//! client never supplies an amount. The order row and its item rows are
//! written through one [`OrderWriter`] call so they commit or fail as a
//! single unit, and the cart is cleared only after the write succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use model::{CheckoutRequest, Order, OrderItem, OrderStatus, PaymentMethod};
use repository::{OrdersRepository, ProductsRepository};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::{cart::CartService, FieldError, ServiceError};

/// Errors a checkout attempt can surface to the shopper.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart holds no purchasable lines; nothing was persisted.
    #[error("Cart is empty")]
    EmptyCart,
    /// One or more submitted fields failed validation; nothing was persisted.
    #[error("Invalid checkout fields")]
    Validation(Vec<FieldError>),
    /// An underlying service failure.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Successful checkout result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub id: Uuid,
    pub total: i64,
}

/// All-or-nothing persistence boundary for an order and its items.
#[async_trait]
pub trait OrderWriter: Send + Sync {
    async fn persist(&self, order: &Order, items: &[OrderItem]) -> Result<(), ServiceError>;
}

/// Postgres-backed [`OrderWriter`]: begins a transaction from the pool,
/// writes the order and every item through it, and commits.
pub struct PgOrderWriter<R> {
    pool: Pool,
    orders: R,
}

impl<R> PgOrderWriter<R>
where
    R: OrdersRepository,
{
    pub fn new(pool: Pool, orders: R) -> Self {
        Self { pool, orders }
    }
}

#[async_trait]
impl<R> OrderWriter for PgOrderWriter<R>
where
    R: OrdersRepository,
{
    async fn persist(&self, order: &Order, items: &[OrderItem]) -> Result<(), ServiceError> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Pool error: {e}")))?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        self.orders.insert_tx(&tx, order, items).await?;

        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;
        Ok(())
    }
}

/// Validated checkout fields, ready to be frozen into an order.
#[derive(Debug, Clone)]
struct ValidatedFields {
    customer_name: String,
    phone: String,
    address: String,
    payment_method: PaymentMethod,
}

/// Validates the submitted customer fields, collecting every failure rather
/// than stopping at the first.
fn validate(req: &CheckoutRequest) -> Result<ValidatedFields, Vec<FieldError>> {
    let mut errors = Vec::new();

    let customer_name = req.customer_name.trim();
    if customer_name.is_empty() {
        errors.push(FieldError::new("customer_name", "Vui lòng nhập họ và tên."));
    } else if customer_name.chars().count() > 120 {
        errors.push(FieldError::new("customer_name", "Họ và tên quá dài."));
    }

    let phone_digits: String = req
        .phone
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect();
    if phone_digits.is_empty() {
        errors.push(FieldError::new("phone", "Vui lòng nhập số điện thoại."));
    } else if !phone_digits.chars().all(|c| c.is_ascii_digit())
        || !(8..=15).contains(&phone_digits.len())
    {
        errors.push(FieldError::new("phone", "Số điện thoại không hợp lệ."));
    }

    let address = req.address.trim();
    if address.is_empty() {
        errors.push(FieldError::new("address", "Vui lòng nhập địa chỉ nhận hàng."));
    } else if address.chars().count() > 500 {
        errors.push(FieldError::new("address", "Địa chỉ quá dài."));
    }

    let payment_method = match PaymentMethod::parse(req.payment_method.trim()) {
        Some(m) => Some(m),
        None => {
            errors.push(FieldError::new(
                "payment_method",
                "Phương thức thanh toán không hợp lệ.",
            ));
            None
        }
    };

    if let (true, Some(payment_method)) = (errors.is_empty(), payment_method) {
        Ok(ValidatedFields {
            customer_name: customer_name.to_string(),
            phone: req.phone.trim().to_string(),
            address: address.to_string(),
            payment_method,
        })
    } else {
        Err(errors)
    }
}

/// Checkout engine.
pub struct CheckoutService<P, W> {
    cart: Arc<CartService<P>>,
    writer: W,
}

impl<P, W> CheckoutService<P, W>
where
    P: ProductsRepository,
    W: OrderWriter,
{
    pub fn new(cart: Arc<CartService<P>>, writer: W) -> Self {
        Self { cart, writer }
    }

    /// Place an order from the session's cart.
    ///
    /// Recomputes the priced view, validates the customer fields, persists
    /// the order plus one item per surviving line in one unit, then clears
    /// the cart. Any failure before the write leaves cart and storage
    /// untouched.
    #[instrument(skip(self, request))]
    pub async fn place_order(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        request: &CheckoutRequest,
    ) -> Result<PlacedOrder, CheckoutError> {
        let view = self.cart.view(session_id).await?;
        if view.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let fields = validate(request).map_err(CheckoutError::Validation)?;

        let order_id = Uuid::new_v4();
        let order = Order {
            id: order_id,
            user_id,
            customer_name: fields.customer_name,
            phone: fields.phone,
            address: fields.address,
            payment_method: fields.payment_method,
            status: OrderStatus::New,
            total: view.total,
            created_at: Utc::now(),
        };
        let items: Vec<OrderItem> = view
            .lines
            .iter()
            .map(|line| OrderItem {
                order_id,
                product_id: line.product.id,
                product_name: line.product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
            })
            .collect();

        self.writer.persist(&order, &items).await?;
        self.cart.clear(session_id).await;

        Ok(PlacedOrder {
            id: order_id,
            total: order.total,
        })
    }
}
