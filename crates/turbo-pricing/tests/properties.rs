//! Property tests over random carts and coupon lists.

mod common;

use common::*;
use proptest::prelude::*;
use turbo_pricing::prelude::*;

const ITEMS: &[&str] = &["jacket", "socks", "ebook", "gift-card"];
const CODES: &[&str] = &[
    "TEN", "TWENTY", "SOLO", "FIVEOFF", "SHIPFREE", "BIGSPEND", "NOGIFTS", "SPRING", "MISSING",
    "ten",
];

fn price(request: &CartRequest) -> Result<PriceBreakdown, PricingError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(engine().price(request))
}

fn cart_request() -> impl Strategy<Value = CartRequest> {
    let lines = prop::collection::vec((0..ITEMS.len(), 1i64..=5), 1..6);
    let codes = prop::collection::vec(0..CODES.len(), 0..6);
    (lines, codes).prop_map(|(lines, codes)| {
        let mut request = request();
        for (item, qty) in lines {
            request = request.with_line(ITEMS[item], qty);
        }
        for code in codes {
            request = request.with_coupon(CODES[code]);
        }
        request
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn breakdown_invariants_hold(request in cart_request()) {
        match price(&request) {
            Ok(breakdown) => {
                assert_consistent(&breakdown);
                // Every requested code is either applied or reported
                prop_assert_eq!(
                    breakdown.discounts.len() + breakdown.warnings.len(),
                    request.coupon_codes.len()
                );
            }
            // Merged jacket lines can exceed the 10 in stock
            Err(PricingError::OutOfStock { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn no_coupons_means_no_discount(request in cart_request()) {
        let mut request = request;
        request.coupon_codes.clear();
        if let Ok(breakdown) = price(&request) {
            prop_assert!(breakdown.discount_total.is_zero());
            prop_assert_eq!(
                breakdown.grand_total.amount_cents,
                breakdown.subtotal.amount_cents + breakdown.shipping_total.amount_cents
            );
        }
    }

    #[test]
    fn pricing_is_deterministic(request in cart_request()) {
        let first = price(&request).map(|b| serde_json::to_string(&b).unwrap());
        let second = price(&request).map(|b| serde_json::to_string(&b).unwrap());
        prop_assert_eq!(first, second);
    }
}
