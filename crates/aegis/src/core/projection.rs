//! Twelve-month compounding projection of the supplied balance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::constants::PROJECTION_MONTHS;
use crate::types::wad_ray::round_display;
use crate::types::{ProjectionPoint, YieldReading};

/// `M0..=M12`, compounding monthly at `apy / 100 / 12`.
///
/// A zero balance projects from 1.0 so the curve still shows the rate.
/// An unavailable yield projects flat. Values are rounded to four places
/// for display; compounding runs on the unrounded value.
pub fn project(balance: Decimal, yield_reading: YieldReading) -> Vec<ProjectionPoint> {
    let apy = yield_reading.apy().unwrap_or(Decimal::ZERO);
    let growth = Decimal::ONE + apy / dec!(100) / dec!(12);
    let mut current = if balance > Decimal::ZERO {
        balance
    } else {
        Decimal::ONE
    };

    (0..=PROJECTION_MONTHS)
        .map(|month| {
            let point = ProjectionPoint {
                month: format!("M{month}"),
                value: round_display(current, 4),
            };
            current = current.checked_mul(growth).unwrap_or(Decimal::MAX);
            point
        })
        .collect()
}

/// Simple monthly share of the APY, two places. `None` when the feed failed.
pub fn projected_growth(yield_reading: YieldReading) -> Option<Decimal> {
    yield_reading
        .apy()
        .map(|apy| round_display(apy / dec!(12), 2))
}
