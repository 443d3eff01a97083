//! Sale totals in exact decimal arithmetic

use rust_decimal::Decimal;

/// Line total = unit price x quantity, `None` when it exceeds the decimal range
pub fn line_total(unit_price: Decimal, quantity: i64) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Sale total = sum of the line totals, `None` on overflow
pub fn sale_total<I>(line_totals: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    line_totals
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, total| acc.checked_add(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dec("3.49"), 3), Some(dec("10.47")));
        assert_eq!(line_total(dec("0.10"), 7), Some(dec("0.70")));
    }

    #[test]
    fn test_line_total_overflow_is_none() {
        assert_eq!(line_total(Decimal::MAX, 2), None);
        assert_eq!(line_total(dec("1e20"), 1_000_000_000), None);
    }

    #[test]
    fn test_sale_total_overflow_is_none() {
        assert_eq!(sale_total(vec![Decimal::MAX, dec("1")]), None);
        assert_eq!(sale_total(vec![Decimal::MAX, Decimal::ZERO]), Some(Decimal::MAX));
    }

    #[test]
    fn test_no_float_drift() {
        // 0.1 + 0.2 must be exactly 0.3
        let total = sale_total(vec![dec("0.1"), dec("0.2")]);
        assert_eq!(total, Some(dec("0.3")));
    }

    #[test]
    fn test_empty_sale_total_is_zero() {
        assert_eq!(sale_total(Vec::new()), Some(Decimal::ZERO));
    }

    #[test]
    fn test_many_small_lines() {
        let totals = std::iter::repeat(dec("0.01")).take(1000);
        assert_eq!(sale_total(totals), Some(dec("10.00")));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_sale_total_is_order_independent(
                cents in prop::collection::vec((1i64..100_000, 1i64..500), 0..30)
            ) {
                let totals: Vec<Decimal> = cents
                    .iter()
                    .map(|(c, q)| line_total(Decimal::new(*c, 2), *q).unwrap())
                    .collect();
                let mut reversed = totals.clone();
                reversed.reverse();
                prop_assert_eq!(sale_total(totals), sale_total(reversed));
            }

            #[test]
            fn prop_line_total_matches_repeated_addition(cents in 1i64..10_000, quantity in 1i64..50) {
                let price = Decimal::new(cents, 2);
                let added = sale_total(std::iter::repeat(price).take(quantity as usize));
                prop_assert_eq!(line_total(price, quantity), added);
            }

            #[test]
            fn prop_line_total_checked_never_panics(mantissa in any::<i64>(), scale in 0u32..28, quantity in 1i64..i64::MAX) {
                let price = Decimal::new(mantissa, scale).abs();
                let _ = line_total(price, quantity);
            }
        }
    }
}
