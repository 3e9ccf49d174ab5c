use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for any single cart line, regardless of stock.
pub const MAX_LINE_QTY: u32 = 999;

/// Product — catalog entry. Prices are minor-unit integers (VND).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Free-text technical specification shown on the product page.
    pub specification: String,
    pub colors: Vec<String>,
    pub price: i64,
    #[serde(rename = "flash_price")]
    pub flash_price: Option<i64>,
    #[serde(rename = "flash_starts_at")]
    pub flash_starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "flash_ends_at")]
    pub flash_ends_at: Option<DateTime<Utc>>,
    /// None means unlimited stock.
    pub stock: Option<i32>,
    #[serde(rename = "is_active")]
    pub is_active: bool,
    #[serde(rename = "category_id")]
    pub category_id: Option<i64>,
    #[serde(rename = "image_url")]
    pub image_url: Option<String>,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Category — a catalog grouping addressed by slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Banner — promotional strip on the landing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Banner {
    pub id: i64,
    pub title: String,
    #[serde(rename = "image_url")]
    pub image_url: String,
    #[serde(rename = "link_url")]
    pub link_url: Option<String>,
    #[serde(rename = "is_active")]
    pub is_active: bool,
    #[serde(rename = "sort_order")]
    pub sort_order: i32,
}

/// Cart — per-session mapping of product id (as string) to quantity.
///
/// Zero quantities are never stored; `set` with 0 prunes the entry. The map
/// is ordered so a rendered cart keeps a stable line order across requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart(BTreeMap<String, u32>);

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity for a product, 0 if absent.
    pub fn qty(&self, product_id: i64) -> u32 {
        self.0.get(&product_id.to_string()).copied().unwrap_or(0)
    }

    /// Store a quantity; 0 removes the entry.
    pub fn set(&mut self, product_id: i64, qty: u32) {
        let key = product_id.to_string();
        if qty == 0 {
            self.0.remove(&key);
        } else {
            self.0.insert(key, qty);
        }
    }

    pub fn remove(&mut self, product_id: i64) {
        self.0.remove(&product_id.to_string());
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total units across all lines (badge counter).
    pub fn item_count(&self) -> u32 {
        self.0.values().sum()
    }

    /// Distinct product ids referenced by the cart, in stored order.
    /// Keys that fail to parse are skipped.
    pub fn product_ids(&self) -> Vec<i64> {
        self.0.keys().filter_map(|k| k.parse().ok()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (i64, u32)> + '_ {
        self.0
            .iter()
            .filter_map(|(k, &q)| k.parse().ok().map(|id| (id, q)))
    }
}

/// One priced row of the cart view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    #[serde(rename = "unit_price")]
    pub unit_price: i64,
    /// The list price, kept alongside so a strike-through can be rendered.
    #[serde(rename = "list_price")]
    pub list_price: i64,
    #[serde(rename = "is_discounted")]
    pub is_discounted: bool,
    pub subtotal: i64,
}

/// Priced cart view: surviving lines plus their grand total.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: i64,
    /// Entries dropped because their product no longer resolves.
    pub pruned: u32,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Payment method selected at checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cod" => Some(PaymentMethod::Cod),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

/// Order lifecycle status. New orders always start as `New`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Confirmed,
    Shipped,
    Done,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Done => "done",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(OrderStatus::New),
            "confirmed" => Some(OrderStatus::Confirmed),
            "shipped" => Some(OrderStatus::Shipped),
            "done" => Some(OrderStatus::Done),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// Order — persisted checkout result. `total` is frozen at creation time and
/// never recomputed from live prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub user_id: Option<i64>,
    #[serde(rename = "customer_name")]
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    #[serde(rename = "payment_method")]
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub total: i64,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// OrderItem — one frozen line of an order. The product reference is weak:
/// the product may later be deleted or repriced without touching this row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    #[serde(rename = "order_id")]
    pub order_id: Uuid,
    #[serde(rename = "product_id")]
    pub product_id: i64,
    #[serde(rename = "product_name")]
    pub product_name: String,
    pub quantity: u32,
    #[serde(rename = "unit_price")]
    pub unit_price: i64,
    pub subtotal: i64,
}

/// Registered shopper account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Speaker of one chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the assistant conversation, as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Checkout form payload as submitted; validated by the checkout service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutRequest {
    #[serde(rename = "customer_name", default)]
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "payment_method", default)]
    pub payment_method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_set_zero_prunes_entry() {
        let mut cart = Cart::new();
        cart.set(7, 3);
        assert_eq!(cart.qty(7), 3);
        cart.set(7, 0);
        assert_eq!(cart.qty(7), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn cart_counts_and_ids_are_stable() {
        let mut cart = Cart::new();
        cart.set(10, 2);
        cart.set(2, 1);
        cart.set(10, 4);
        assert_eq!(cart.item_count(), 5);
        // BTreeMap keys are strings, so order is lexicographic and stable.
        assert_eq!(cart.product_ids(), vec![10, 2]);
    }

    #[test]
    fn cart_survives_json_round_trip() {
        let mut cart = Cart::new();
        cart.set(42, 9);
        let json = serde_json::to_string(&cart).unwrap();
        assert_eq!(json, r#"{"42":9}"#);
        let back: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn payment_method_round_trips_via_str() {
        for m in [PaymentMethod::Cod, PaymentMethod::BankTransfer] {
            assert_eq!(PaymentMethod::parse(m.as_str()), Some(m));
        }
        assert_eq!(PaymentMethod::parse("credit_card"), None);
    }

    #[test]
    fn chat_turn_deserializes_from_client_json() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"user","content":"còn hàng không?"}"#).unwrap();
        assert_eq!(turn.role, ChatRole::User);
        assert_eq!(turn.content, "còn hàng không?");
    }
}
