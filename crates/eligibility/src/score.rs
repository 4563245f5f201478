//! Compatibility scoring
//!
//! The exact formula is a business rule, so it lives behind the
//! [`CompatibilityScorer`] trait. [`DefaultScorer`] is the stock
//! implementation: a deterministic function of location, date overlap and
//! price proximity, which makes its results safe to memoize.

use serde::{Deserialize, Serialize};

use listings::Reservation;

/// Result of scoring a listing pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    /// 0-100, higher is better
    pub score: u8,
    /// Human-readable breakdown
    pub analysis: String,
}

/// Business-rule collaborator computing how well two listings match
///
/// Implementations must be deterministic: same reservations in, same
/// compatibility out, or the cache would change results instead of latency.
pub trait CompatibilityScorer: Send + Sync {
    /// Score the exchange of `a` against `b`
    fn score(&self, a: &Reservation, b: &Reservation) -> Compatibility;
}

/// Default scoring heuristic
///
/// Location match is worth 50 points, date overlap 30, price proximity 20.
pub struct DefaultScorer;

impl DefaultScorer {
    fn location_points(a: &Reservation, b: &Reservation) -> u8 {
        if a.location.eq_ignore_ascii_case(&b.location) {
            50
        } else {
            0
        }
    }

    fn date_points(a: &Reservation, b: &Reservation) -> u8 {
        let overlap_start = a.check_in.max(b.check_in);
        let overlap_end = a.check_out.min(b.check_out);
        if overlap_start < overlap_end {
            30
        } else {
            let gap = (overlap_start - overlap_end).num_days().abs();
            if gap <= 7 {
                15
            } else {
                0
            }
        }
    }

    fn price_points(a: &Reservation, b: &Reservation) -> u8 {
        if a.price.currency != b.price.currency {
            return 0;
        }
        let (low, high) = if a.price.amount_minor <= b.price.amount_minor {
            (a.price.amount_minor, b.price.amount_minor)
        } else {
            (b.price.amount_minor, a.price.amount_minor)
        };
        if high <= 0 {
            return 0;
        }
        // Linear in the price ratio: identical prices score the full 20
        ((low * 20) / high) as u8
    }
}

impl CompatibilityScorer for DefaultScorer {
    fn score(&self, a: &Reservation, b: &Reservation) -> Compatibility {
        let location = Self::location_points(a, b);
        let dates = Self::date_points(a, b);
        let price = Self::price_points(a, b);

        Compatibility {
            score: location + dates + price,
            analysis: format!(
                "location {}/50, dates {}/30, price {}/20",
                location, dates, price
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::types::{Money, UserId};

    fn reservation(location: &str, check_in: &str, nights: u64, price: i64) -> Reservation {
        let check_in = NaiveDate::parse_from_str(check_in, "%Y-%m-%d").unwrap();
        Reservation::new(
            UserId::new(),
            check_in,
            check_in + chrono::Duration::days(nights as i64),
            location,
            Money::new(price, "EUR"),
        )
    }

    #[test]
    fn test_identical_pair_scores_full() {
        let a = reservation("Lisbon", "2026-09-01", 7, 50000);
        let b = reservation("Lisbon", "2026-09-01", 7, 50000);
        let result = DefaultScorer.score(&a, &b);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_disjoint_pair_scores_low() {
        let a = reservation("Lisbon", "2026-09-01", 7, 50000);
        let b = reservation("Oslo", "2026-12-01", 7, 10000);
        let result = DefaultScorer.score(&a, &b);
        assert_eq!(result.score, 4); // 10000/50000 of the 20 price points
    }

    #[test]
    fn test_near_dates_score_partial_overlap() {
        let a = reservation("Lisbon", "2026-09-01", 5, 50000);
        let b = reservation("Lisbon", "2026-09-08", 5, 50000);
        let result = DefaultScorer.score(&a, &b);
        // 50 location + 15 adjacent dates + 20 price
        assert_eq!(result.score, 85);
    }

    #[test]
    fn test_deterministic() {
        let a = reservation("Porto", "2026-10-01", 3, 30000);
        let b = reservation("Porto", "2026-10-02", 3, 42000);
        assert_eq!(DefaultScorer.score(&a, &b), DefaultScorer.score(&a, &b));
        // Symmetric inputs, same result either way round
        assert_eq!(
            DefaultScorer.score(&a, &b).score,
            DefaultScorer.score(&b, &a).score
        );
    }
}
