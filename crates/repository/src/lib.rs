//! # Data Repository Layer
//!
//! This module provides repository traits and PostgreSQL implementations
//! for all entities: products, categories, banners, orders, users.
//! The order repository writes through a caller-owned transaction so the
//! checkout service can persist an order and its items as one atomic unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Pool, PoolError};
use model::{Banner, Category, Order, OrderItem, OrderStatus, PaymentMethod, Product, User};
use thiserror::Error;
use tokio_postgres::{Row, Transaction};
use uuid::Uuid;

/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error.
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A stored value could not be mapped back into the domain model.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Catalog query parameters for [`ProductsRepository::search`].
///
/// Only active products are ever returned; the optional fields narrow the
/// result further.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Substring match against name and description (case-insensitive).
    pub query: Option<String>,
    /// Also match the substring against the specification text. Used by the
    /// assistant context builder.
    pub match_specification: bool,
    /// Category slug equality.
    pub category_slug: Option<String>,
    /// Result size cap.
    pub limit: i64,
}

/// # ProductsRepository
///
/// Read surface over the product catalog: filtered listing, flash-sale
/// window queries, and the bulk lookup the cart view depends on.
#[async_trait]
pub trait ProductsRepository: Send + Sync {
    /// Filtered, active-only catalog listing, newest first.
    async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    /// Active products currently inside their flash-sale window, ordered by
    /// window end ascending (soonest-ending first).
    async fn flash_items(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Single product by id.
    async fn get(&self, id: i64) -> Result<Product, RepositoryError>;

    /// Bulk lookup by id: one query regardless of how many ids are asked
    /// for. Missing ids are simply absent from the result.
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Product>, RepositoryError>;

    /// Other active products in the same category, for the product page.
    async fn related(
        &self,
        category_id: i64,
        exclude_id: i64,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError>;
}

/// PostgreSQL implementation of the ProductsRepository trait.
pub struct PgProductsRepository {
    pool: Pool,
}

impl PgProductsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLS: &str = "id, name, slug, description, specification, colors, price, \
     flash_price, flash_starts_at, flash_ends_at, stock, is_active, \
     category_id, image_url, created_at";

fn product_from_row(row: &Row) -> Product {
    Product {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        specification: row.get("specification"),
        colors: row.get("colors"),
        price: row.get("price"),
        flash_price: row.get("flash_price"),
        flash_starts_at: row.get("flash_starts_at"),
        flash_ends_at: row.get("flash_ends_at"),
        stock: row.get("stock"),
        is_active: row.get("is_active"),
        category_id: row.get("category_id"),
        image_url: row.get("image_url"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ProductsRepository for PgProductsRepository {
    async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {PRODUCT_COLS}
            FROM products
            WHERE is_active = TRUE
              AND ($1::TEXT IS NULL
                   OR name ILIKE '%' || $1 || '%'
                   OR description ILIKE '%' || $1 || '%'
                   OR ($2 AND specification ILIKE '%' || $1 || '%'))
              AND ($3::TEXT IS NULL
                   OR category_id IN (SELECT id FROM categories WHERE slug = $3))
            ORDER BY created_at DESC
            LIMIT $4
        "#
        );
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                &query,
                &[
                    &filter.query,
                    &filter.match_specification,
                    &filter.category_slug,
                    &filter.limit,
                ],
            )
            .await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn flash_items(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {PRODUCT_COLS}
            FROM products
            WHERE is_active = TRUE
              AND flash_price IS NOT NULL AND flash_price > 0
              AND flash_starts_at <= $1 AND flash_ends_at >= $1
            ORDER BY flash_ends_at ASC
            LIMIT $2
        "#
        );
        let conn = self.pool.get().await?;
        let rows = conn.query(&query, &[&now, &limit]).await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn get(&self, id: i64) -> Result<Product, RepositoryError> {
        let query = format!("SELECT {PRODUCT_COLS} FROM products WHERE id = $1");
        let conn = self.pool.get().await?;
        let row = conn.query_opt(&query, &[&id]).await?;
        match row {
            Some(row) => Ok(product_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {PRODUCT_COLS} FROM products WHERE id = ANY($1)");
        let conn = self.pool.get().await?;
        let rows = conn.query(&query, &[&ids]).await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn related(
        &self,
        category_id: i64,
        exclude_id: i64,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {PRODUCT_COLS}
            FROM products
            WHERE is_active = TRUE AND category_id = $1 AND id <> $2
            ORDER BY created_at DESC
            LIMIT $3
        "#
        );
        let conn = self.pool.get().await?;
        let rows = conn.query(&query, &[&category_id, &exclude_id, &limit]).await?;
        Ok(rows.iter().map(product_from_row).collect())
    }
}

/// # CategoriesRepository
///
/// Read surface over catalog categories.
#[async_trait]
pub trait CategoriesRepository: Send + Sync {
    async fn all(&self) -> Result<Vec<Category>, RepositoryError>;
}

/// PostgreSQL implementation of the CategoriesRepository trait.
pub struct PgCategoriesRepository {
    pool: Pool,
}

impl PgCategoriesRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoriesRepository for PgCategoriesRepository {
    async fn all(&self) -> Result<Vec<Category>, RepositoryError> {
        let query = "SELECT id, name, slug FROM categories ORDER BY name";
        let conn = self.pool.get().await?;
        let rows = conn.query(query, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
            })
            .collect())
    }
}

/// # BannersRepository
///
/// Read surface over landing-page banners.
#[async_trait]
pub trait BannersRepository: Send + Sync {
    async fn active(&self) -> Result<Vec<Banner>, RepositoryError>;
}

/// PostgreSQL implementation of the BannersRepository trait.
pub struct PgBannersRepository {
    pool: Pool,
}

impl PgBannersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BannersRepository for PgBannersRepository {
    async fn active(&self) -> Result<Vec<Banner>, RepositoryError> {
        let query = r#"
            SELECT id, title, image_url, link_url, is_active, sort_order
            FROM banners WHERE is_active = TRUE
            ORDER BY sort_order ASC, id ASC
        "#;
        let conn = self.pool.get().await?;
        let rows = conn.query(query, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| Banner {
                id: row.get("id"),
                title: row.get("title"),
                image_url: row.get("image_url"),
                link_url: row.get("link_url"),
                is_active: row.get("is_active"),
                sort_order: row.get("sort_order"),
            })
            .collect())
    }
}

/// # OrdersRepository
///
/// Write and read surface for persisted orders. The insert path takes a
/// caller-owned transaction: the order row and every item row commit or roll
/// back together, never partially.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Insert the order and all of its items inside `tx`.
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), RepositoryError>;

    /// Order header by id.
    async fn get(&self, id: Uuid) -> Result<Order, RepositoryError>;

    /// Frozen line items of one order.
    async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError>;
}

/// PostgreSQL implementation of the OrdersRepository trait.
pub struct PgOrdersRepository {
    pool: Pool,
}

impl PgOrdersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn order_from_row(row: &Row) -> Result<Order, RepositoryError> {
    let payment_method: String = row.get("payment_method");
    let status: String = row.get("status");
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        customer_name: row.get("customer_name"),
        phone: row.get("phone"),
        address: row.get("address"),
        payment_method: PaymentMethod::parse(&payment_method).ok_or_else(|| {
            RepositoryError::CorruptRow(format!("unknown payment method '{payment_method}'"))
        })?,
        status: OrderStatus::parse(&status)
            .ok_or_else(|| RepositoryError::CorruptRow(format!("unknown status '{status}'")))?,
        total: row.get("total"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl OrdersRepository for PgOrdersRepository {
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), RepositoryError> {
        let query = r#"
            INSERT INTO orders (
                id, user_id, customer_name, phone, address,
                payment_method, status, total, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        "#;
        tx.execute(
            query,
            &[
                &order.id,
                &order.user_id,
                &order.customer_name,
                &order.phone,
                &order.address,
                &order.payment_method.as_str(),
                &order.status.as_str(),
                &order.total,
                &order.created_at,
            ],
        )
        .await?;

        let query = r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, subtotal)
            VALUES ($1,$2,$3,$4,$5,$6)
        "#;
        for it in items {
            tx.execute(
                query,
                &[
                    &it.order_id,
                    &it.product_id,
                    &it.product_name,
                    &(it.quantity as i32),
                    &it.unit_price,
                    &it.subtotal,
                ],
            )
            .await?;
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order, RepositoryError> {
        let query = r#"
            SELECT id, user_id, customer_name, phone, address,
                   payment_method, status, total, created_at
            FROM orders WHERE id = $1
        "#;
        let conn = self.pool.get().await?;
        let row = conn.query_opt(query, &[&id]).await?;
        match row {
            Some(row) => order_from_row(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
        let query = r#"
            SELECT order_id, product_id, product_name, quantity, unit_price, subtotal
            FROM order_items WHERE order_id = $1
            ORDER BY id
        "#;
        let conn = self.pool.get().await?;
        let rows = conn.query(query, &[&order_id]).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let quantity: i32 = row.get("quantity");
                OrderItem {
                    order_id: row.get("order_id"),
                    product_id: row.get("product_id"),
                    product_name: row.get("product_name"),
                    quantity: quantity.max(0) as u32,
                    unit_price: row.get("unit_price"),
                    subtotal: row.get("subtotal"),
                }
            })
            .collect())
    }
}

/// Fields required to create a user account. The digest is produced by the
/// auth service; repositories never see plaintext passwords.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// # UsersRepository
///
/// Account storage for registration and login.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Insert a new account and return the stored row.
    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Look up an account by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
}

/// PostgreSQL implementation of the UsersRepository trait.
pub struct PgUsersRepository {
    pool: Pool,
}

impl PgUsersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let query = r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at
        "#;
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(query, &[&user.username, &user.email, &user.password_hash])
            .await?;
        Ok(user_from_row(&row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let query = r#"
            SELECT id, username, email, password_hash, created_at
            FROM users WHERE username = $1
        "#;
        let conn = self.pool.get().await?;
        let row = conn.query_opt(query, &[&username]).await?;
        Ok(row.as_ref().map(user_from_row))
    }
}
