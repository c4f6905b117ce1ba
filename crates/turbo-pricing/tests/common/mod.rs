//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use turbo_pricing::config::{WeightTier, ZoneConfig};
use turbo_pricing::prelude::*;

pub fn usd(cents: i64) -> Money {
    Money::new(cents, Currency::USD)
}

/// Fixed evaluation instant so repeated runs are identical.
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

pub fn config() -> PricingConfig {
    let mut config = PricingConfig::default();
    config.shipping.zones = vec![
        ZoneConfig {
            id: "domestic".to_string(),
            name: Some("Domestic".to_string()),
            countries: vec!["US".to_string()],
            regions: vec![],
            postal_prefixes: vec![],
            base_rate_cents: 599,
            tiers: vec![
                WeightTier {
                    from_grams: 0,
                    surcharge_cents: 0,
                },
                WeightTier {
                    from_grams: 1000,
                    surcharge_cents: 250,
                },
                WeightTier {
                    from_grams: 5000,
                    surcharge_cents: 900,
                },
            ],
            per_kg_beyond_last: None,
        },
        ZoneConfig {
            id: "canada".to_string(),
            name: None,
            countries: vec!["CA".to_string()],
            regions: vec![],
            postal_prefixes: vec![],
            base_rate_cents: 1299,
            tiers: vec![],
            per_kg_beyond_last: Some(dec!(200)),
        },
    ];
    config
}

pub fn catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.insert(CatalogEntry::new(
        "jacket",
        "Rain Jacket",
        usd(10000),
        StockLevel::new(10),
        ShippingAttributes::physical(1500).with_dimensions(Dimensions::new(50, 40, 30)),
    ));
    catalog.insert(CatalogEntry::new(
        "socks",
        "Wool Socks",
        usd(700),
        StockLevel::new(50),
        ShippingAttributes::physical(80),
    ));
    catalog.insert(CatalogEntry::new(
        "ebook",
        "Trail Guide (PDF)",
        usd(1500),
        StockLevel::untracked(),
        ShippingAttributes::digital(),
    ));
    catalog.insert(CatalogEntry::new(
        "gift-card",
        "Gift Card",
        usd(5000),
        StockLevel::untracked(),
        ShippingAttributes::digital(),
    ));
    catalog
}

pub fn coupons() -> InMemoryCouponRepository {
    let repo = InMemoryCouponRepository::new();
    repo.insert(Coupon::percent_off("TEN", "10% Off", dec!(10)).stackable());
    repo.insert(Coupon::percent_off("TWENTY", "20% Off", dec!(20)).stackable());
    repo.insert(Coupon::percent_off("SOLO", "15% Off Alone", dec!(15)));
    repo.insert(Coupon::fixed_amount_off("FIVEOFF", "$5 Off", usd(500)).stackable());
    repo.insert(Coupon::free_shipping("SHIPFREE", "Free Shipping").stackable());
    repo.insert(
        Coupon::percent_off("BIGSPEND", "10% Over $200", dec!(10))
            .with_min_subtotal(usd(20000))
            .stackable(),
    );
    repo.insert(
        Coupon::percent_off("NOGIFTS", "25% Off Gear", dec!(25))
            .excluding(["gift-card"])
            .stackable(),
    );
    repo.insert(
        Coupon::percent_off("SPRING", "Spring Sale", dec!(30))
            .valid_between(None, Some(Utc.with_ymd_and_hms(2026, 5, 31, 23, 59, 59).unwrap()))
            .stackable(),
    );
    repo
}

pub fn engine() -> PricingEngine {
    engine_with(config())
}

pub fn engine_with(config: PricingConfig) -> PricingEngine {
    PricingEngine::with_rate_table(config, Arc::new(catalog()), Arc::new(coupons()))
        .expect("valid config")
}

pub fn request() -> CartRequest {
    CartRequest::new("shopper-1", Destination::new("US").with_region("OR"))
        .with_cart_id("cart-1")
        .as_of(as_of())
}

/// Checks every breakdown invariant from the outside.
pub fn assert_consistent(breakdown: &PriceBreakdown) {
    let subtotal = breakdown.subtotal.amount_cents;
    let discount = breakdown.discount_total.amount_cents;
    let shipping = breakdown.shipping_total.amount_cents;

    assert!(discount >= 0 && discount <= subtotal, "discount {} of {}", discount, subtotal);
    assert!(shipping >= 0);
    assert!(breakdown.grand_total.amount_cents >= 0);
    assert_eq!(breakdown.grand_total.amount_cents, subtotal - discount + shipping);

    let lines: i64 = breakdown
        .line_items
        .iter()
        .map(|l| l.line_subtotal.amount_cents)
        .sum();
    assert_eq!(lines, subtotal);

    for applied in &breakdown.discounts {
        assert!(!applied.amount.is_negative());
        let allocated: i64 = applied.allocations.iter().map(|a| a.amount.amount_cents).sum();
        assert_eq!(allocated, applied.amount.amount_cents);
    }

    for total in breakdown.line_totals() {
        assert!(!total.total.is_negative(), "line {} went negative", total.item_id);
    }
}
