//! Session cart mutation and the priced cart view.
//!
//! All writes go through stock clamping: a stored quantity never exceeds
//! `min(999, stock)` and zero quantities are never stored. The view joins
//! cart entries against the catalog with one bulk lookup and eagerly prunes
//! entries whose product no longer resolves.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use model::{Cart, CartLine, CartView, Product, MAX_LINE_QTY};
use repository::{ProductsRepository, RepositoryError};
use session::CartStore;
use tracing::instrument;

use crate::{pricing::effective_price, ServiceError};

/// Why an add/update was refused outright (no state change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotFound,
    Inactive,
    OutOfStock,
}

/// Result of a cart mutation, for the caller to turn into a user notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOutcome {
    /// The full requested amount was added.
    Added { qty: u32 },
    /// The quantity was set as requested.
    Updated { qty: u32 },
    /// Stock (or the 999 ceiling) capped the request; `stored` is what the
    /// cart now holds.
    Capped { stored: u32 },
    /// The entry was removed.
    Removed,
    /// Nothing changed.
    Rejected(RejectReason),
}

/// Cart engine: mutates the session cart against the product catalog.
pub struct CartService<P> {
    products: Arc<P>,
    store: Arc<CartStore>,
}

impl<P> CartService<P>
where
    P: ProductsRepository,
{
    pub fn new(products: Arc<P>, store: Arc<CartStore>) -> Self {
        Self { products, store }
    }

    /// Largest quantity one line of this product may hold.
    fn line_cap(product: &Product) -> u32 {
        match product.stock {
            None => MAX_LINE_QTY,
            Some(s) if s <= 0 => 0,
            Some(s) => (s as u32).min(MAX_LINE_QTY),
        }
    }

    /// Add `requested` units of a product to the session cart.
    ///
    /// The request is clamped to `[1, 999]` first; the stored quantity is
    /// additionally capped by stock. A missing, inactive, or sold-out
    /// product is rejected with no state change.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        session_id: &str,
        product_id: i64,
        requested: u32,
    ) -> Result<CartOutcome, ServiceError> {
        let requested = requested.clamp(1, MAX_LINE_QTY);
        let product = match self.products.get(product_id).await {
            Ok(p) => p,
            Err(RepositoryError::NotFound) => {
                return Ok(CartOutcome::Rejected(RejectReason::NotFound))
            }
            Err(e) => return Err(e.into()),
        };
        if !product.is_active {
            return Ok(CartOutcome::Rejected(RejectReason::Inactive));
        }
        let cap = Self::line_cap(&product);
        if cap == 0 {
            return Ok(CartOutcome::Rejected(RejectReason::OutOfStock));
        }

        let mut cart = self.store.cart(session_id).await;
        let current = cart.qty(product_id);
        let desired = current.saturating_add(requested);
        let stored = desired.min(cap);
        cart.set(product_id, stored);
        self.store.put_cart(session_id, cart).await;

        if stored < desired {
            Ok(CartOutcome::Capped { stored })
        } else {
            Ok(CartOutcome::Added { qty: stored })
        }
    }

    /// Set the exact quantity for a product line.
    ///
    /// Zero, or a product that is missing, inactive, or sold out, removes
    /// the line entirely. Otherwise the quantity is clamped to stock.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        session_id: &str,
        product_id: i64,
        requested: u32,
    ) -> Result<CartOutcome, ServiceError> {
        let requested = requested.min(MAX_LINE_QTY);

        let cap = match self.products.get(product_id).await {
            Ok(p) if p.is_active => Self::line_cap(&p),
            Ok(_) => 0,
            Err(RepositoryError::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };

        let mut cart = self.store.cart(session_id).await;
        if requested == 0 || cap == 0 {
            cart.remove(product_id);
            self.store.put_cart(session_id, cart).await;
            return Ok(CartOutcome::Removed);
        }

        let stored = requested.min(cap);
        cart.set(product_id, stored);
        self.store.put_cart(session_id, cart).await;

        if stored < requested {
            Ok(CartOutcome::Capped { stored })
        } else {
            Ok(CartOutcome::Updated { qty: stored })
        }
    }

    /// Delete a line if present; absent lines are not an error.
    #[instrument(skip(self))]
    pub async fn remove(&self, session_id: &str, product_id: i64) {
        let mut cart = self.store.cart(session_id).await;
        cart.remove(product_id);
        self.store.put_cart(session_id, cart).await;
    }

    /// Reset the session cart to empty.
    #[instrument(skip(self))]
    pub async fn clear(&self, session_id: &str) {
        self.store.put_cart(session_id, Cart::new()).await;
    }

    /// Units currently in the cart (header badge).
    pub async fn item_count(&self, session_id: &str) -> u32 {
        self.store.cart(session_id).await.item_count()
    }

    /// Priced view of the cart as of now.
    pub async fn view(&self, session_id: &str) -> Result<CartView, ServiceError> {
        self.view_at(session_id, Utc::now()).await
    }

    /// Priced view of the cart at an explicit instant.
    ///
    /// One bulk catalog lookup covers every referenced product. Entries
    /// whose product is gone or deactivated are pruned from the stored cart
    /// and reported through [`CartView::pruned`].
    pub async fn view_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CartView, ServiceError> {
        let mut cart = self.store.cart(session_id).await;
        if cart.is_empty() {
            return Ok(CartView::default());
        }

        let ids = cart.product_ids();
        let products = self.products.get_many(&ids).await?;
        let by_id: HashMap<i64, Product> = products.into_iter().map(|p| (p.id, p)).collect();

        let entries: Vec<(i64, u32)> = cart.entries().collect();
        let mut lines = Vec::with_capacity(entries.len());
        let mut total = 0i64;
        let mut pruned = 0u32;

        for (product_id, quantity) in entries {
            match by_id.get(&product_id).filter(|p| p.is_active) {
                Some(product) => {
                    let unit_price = effective_price(product, now);
                    let subtotal = unit_price * i64::from(quantity);
                    total += subtotal;
                    lines.push(CartLine {
                        product: product.clone(),
                        quantity,
                        unit_price,
                        list_price: product.price,
                        is_discounted: unit_price < product.price,
                        subtotal,
                    });
                }
                None => {
                    cart.remove(product_id);
                    pruned += 1;
                }
            }
        }

        if pruned > 0 {
            self.store.put_cart(session_id, cart).await;
        }

        Ok(CartView {
            lines,
            total,
            pruned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, FakeProducts};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;

    fn setup(products: Vec<Product>) -> (CartService<FakeProducts>, Arc<CartStore>) {
        let store = Arc::new(CartStore::new(Duration::from_secs(3600)));
        let svc = CartService::new(Arc::new(FakeProducts::new(products)), store.clone());
        (svc, store)
    }

    #[tokio::test]
    async fn test_add_within_stock() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(10))]);
        let out = svc.add("sid", 1, 3).await.unwrap();
        assert_eq!(out, CartOutcome::Added { qty: 3 });
        assert_eq!(store.cart("sid").await.qty(1), 3);
    }

    #[tokio::test]
    async fn test_add_is_capped_by_stock() {
        // Stock 5, already 3 in cart: adding 5 stores 5, with a cap notice.
        let (svc, store) = setup(vec![product(1, 100_000, Some(5))]);
        svc.add("sid", 1, 3).await.unwrap();
        let out = svc.add("sid", 1, 5).await.unwrap();
        assert_eq!(out, CartOutcome::Capped { stored: 5 });
        assert_eq!(store.cart("sid").await.qty(1), 5);
    }

    #[tokio::test]
    async fn test_add_out_of_stock_is_refused() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(0))]);
        let out = svc.add("sid", 1, 1).await.unwrap();
        assert_eq!(out, CartOutcome::Rejected(RejectReason::OutOfStock));
        assert!(store.cart("sid").await.is_empty());
    }

    #[tokio::test]
    async fn test_add_missing_or_inactive_is_refused() {
        let mut inactive = product(2, 100_000, Some(5));
        inactive.is_active = false;
        let (svc, store) = setup(vec![inactive]);

        assert_eq!(
            svc.add("sid", 99, 1).await.unwrap(),
            CartOutcome::Rejected(RejectReason::NotFound)
        );
        assert_eq!(
            svc.add("sid", 2, 1).await.unwrap(),
            CartOutcome::Rejected(RejectReason::Inactive)
        );
        assert!(store.cart("sid").await.is_empty());
    }

    #[tokio::test]
    async fn test_add_respects_hard_ceiling_for_unlimited_stock() {
        let (svc, store) = setup(vec![product(1, 100_000, None)]);
        svc.add("sid", 1, 999).await.unwrap();
        let out = svc.add("sid", 1, 1).await.unwrap();
        assert_eq!(out, CartOutcome::Capped { stored: 999 });
        assert_eq!(store.cart("sid").await.qty(1), 999);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(10))]);
        svc.add("sid", 1, 2).await.unwrap();
        let out = svc.set_quantity("sid", 1, 0).await.unwrap();
        assert_eq!(out, CartOutcome::Removed);
        assert!(store.cart("sid").await.is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_clamps_to_stock() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(4))]);
        let out = svc.set_quantity("sid", 1, 50).await.unwrap();
        assert_eq!(out, CartOutcome::Capped { stored: 4 });
        assert_eq!(store.cart("sid").await.qty(1), 4);
    }

    #[tokio::test]
    async fn test_set_quantity_for_stale_product_removes_entry() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(10))]);
        svc.add("sid", 1, 2).await.unwrap();
        // Product disappears from the catalog, then the shopper edits it.
        let (svc2, _) = setup(vec![]);
        let cart = store.cart("sid").await;
        svc2.store.put_cart("sid", cart).await;
        let out = svc2.set_quantity("sid", 1, 3).await.unwrap();
        assert_eq!(out, CartOutcome::Removed);
    }

    #[tokio::test]
    async fn test_quantities_never_zero_after_any_sequence() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(5)), product(2, 50_000, None)]);
        svc.add("sid", 1, 2).await.unwrap();
        svc.add("sid", 2, 1).await.unwrap();
        svc.set_quantity("sid", 1, 9).await.unwrap();
        svc.set_quantity("sid", 2, 0).await.unwrap();
        svc.add("sid", 2, 3).await.unwrap();
        svc.remove("sid", 2).await;

        let cart = store.cart("sid").await;
        for (_, qty) in cart.entries() {
            assert!(qty > 0 && qty <= 999);
        }
        assert_eq!(cart.qty(1), 5); // clamped to stock
        assert_eq!(cart.qty(2), 0);
    }

    #[tokio::test]
    async fn test_view_totals_and_flash_pricing() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut flash = product(1, 200_000, Some(10));
        flash.flash_price = Some(150_000);
        flash.flash_starts_at = Some(now - ChronoDuration::hours(1));
        flash.flash_ends_at = Some(now + ChronoDuration::hours(1));
        let plain = product(2, 80_000, Some(10));

        let (svc, _) = setup(vec![flash, plain]);
        svc.add("sid", 1, 2).await.unwrap();
        svc.add("sid", 2, 3).await.unwrap();

        let view = svc.view_at("sid", now).await.unwrap();
        assert_eq!(view.lines.len(), 2);
        let flash_line = view.lines.iter().find(|l| l.product.id == 1).unwrap();
        assert_eq!(flash_line.unit_price, 150_000);
        assert_eq!(flash_line.list_price, 200_000);
        assert!(flash_line.is_discounted);
        assert_eq!(view.total, 2 * 150_000 + 3 * 80_000);
        assert_eq!(view.pruned, 0);
    }

    #[tokio::test]
    async fn test_view_prunes_stale_entries_from_stored_cart() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(10))]);
        svc.add("sid", 1, 2).await.unwrap();
        // Sneak a dead reference into the stored cart.
        let mut cart = store.cart("sid").await;
        cart.set(999, 4);
        store.put_cart("sid", cart).await;

        let view = svc.view("sid").await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.pruned, 1);
        assert_eq!(view.total, 200_000);
        // Pruned from stored state too, not just the rendered view.
        assert_eq!(store.cart("sid").await.qty(999), 0);
    }

    #[tokio::test]
    async fn test_item_count_matches_lines_after_view_prunes() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(10))]);
        svc.add("sid", 1, 2).await.unwrap();
        let mut cart = store.cart("sid").await;
        cart.set(999, 4);
        store.put_cart("sid", cart).await;
        assert_eq!(svc.item_count("sid").await, 6);

        let view = svc.view("sid").await.unwrap();
        let line_units: u32 = view.lines.iter().map(|l| l.quantity).sum();
        assert_eq!(svc.item_count("sid").await, line_units);
        assert_eq!(svc.item_count("sid").await, 2);
    }

    #[tokio::test]
    async fn test_clear_empties_cart() {
        let (svc, store) = setup(vec![product(1, 100_000, Some(10))]);
        svc.add("sid", 1, 2).await.unwrap();
        svc.clear("sid").await;
        assert!(store.cart("sid").await.is_empty());
        assert!(svc.view("sid").await.unwrap().is_empty());
    }
}
