//! Effective-price resolution.
//!
//! A product is charged its flash-sale price only while the sale is active:
//! the flash price must be present and positive, both window bounds must be
//! present, and `now` must lie inside the closed interval. Anything missing
//! or malformed means "not on flash sale", never an error.

use chrono::{DateTime, Utc};
use model::Product;

/// Whether the product is currently inside an active flash-sale window.
pub fn is_flash_active(product: &Product, now: DateTime<Utc>) -> bool {
    match (
        product.flash_price,
        product.flash_starts_at,
        product.flash_ends_at,
    ) {
        (Some(price), Some(starts), Some(ends)) if price > 0 => starts <= now && now <= ends,
        _ => false,
    }
}

/// The price actually charged right now: flash price while the sale is
/// active, list price otherwise. No side effects.
pub fn effective_price(product: &Product, now: DateTime<Utc>) -> i64 {
    if is_flash_active(product, now) {
        // Guarded by is_flash_active; the window requires a present price.
        product.flash_price.unwrap_or(product.price)
    } else {
        product.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn product(price: i64) -> Product {
        Product {
            id: 1,
            name: "Tai nghe".into(),
            slug: "tai-nghe".into(),
            description: String::new(),
            specification: String::new(),
            colors: vec![],
            price,
            flash_price: None,
            flash_starts_at: None,
            flash_ends_at: None,
            stock: Some(10),
            is_active: true,
            category_id: None,
            image_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn flash_price_wins_inside_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut p = product(200_000);
        p.flash_price = Some(150_000);
        p.flash_starts_at = Some(now - Duration::hours(1));
        p.flash_ends_at = Some(now + Duration::hours(1));
        assert!(is_flash_active(&p, now));
        assert_eq!(effective_price(&p, now), 150_000);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let mut p = product(200_000);
        p.flash_price = Some(150_000);
        p.flash_starts_at = Some(start);
        p.flash_ends_at = Some(end);
        assert_eq!(effective_price(&p, start), 150_000);
        assert_eq!(effective_price(&p, end), 150_000);
        assert_eq!(effective_price(&p, end + Duration::seconds(1)), 200_000);
    }

    #[test]
    fn list_price_outside_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut p = product(200_000);
        p.flash_price = Some(150_000);
        p.flash_starts_at = Some(now + Duration::hours(1));
        p.flash_ends_at = Some(now + Duration::hours(2));
        assert_eq!(effective_price(&p, now), 200_000);
    }

    #[test]
    fn missing_or_zero_flash_fields_fall_back_to_list_price() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        // No flash fields at all.
        let p = product(200_000);
        assert_eq!(effective_price(&p, now), 200_000);

        // Price present but no window.
        let mut p = product(200_000);
        p.flash_price = Some(150_000);
        assert_eq!(effective_price(&p, now), 200_000);

        // Zero flash price is treated as absent.
        let mut p = product(200_000);
        p.flash_price = Some(0);
        p.flash_starts_at = Some(now - Duration::hours(1));
        p.flash_ends_at = Some(now + Duration::hours(1));
        assert!(!is_flash_active(&p, now));
        assert_eq!(effective_price(&p, now), 200_000);

        // Window missing one bound.
        let mut p = product(200_000);
        p.flash_price = Some(150_000);
        p.flash_starts_at = Some(now - Duration::hours(1));
        assert_eq!(effective_price(&p, now), 200_000);
    }
}
