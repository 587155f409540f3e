use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::ledger::{InstrumentLedger, LedgerEntry, PositionState};
use crate::models::position::MonthlyPosition;

/// Expands irregular ledgers into one row per calendar month-end.
///
/// Each month-end carries the position of the latest ledger row dated on or
/// before that day. A synthetic row at `now`, repeating the position in
/// effect at that instant, extends every series through the current month.
pub struct ResampleService;

/// A ledger row placed on a continuous timeline.
struct TimelinePoint<'a> {
    at: NaiveDateTime,
    position: PositionState,
    source: &'a LedgerEntry,
}

impl ResampleService {
    pub fn new() -> Self {
        Self
    }

    /// Monthly series for every ledger, concatenated in ledger order.
    pub fn monthly_positions(&self, ledgers: &[InstrumentLedger], now: NaiveDateTime) -> Vec<MonthlyPosition> {
        ledgers
            .iter()
            .flat_map(|ledger| self.monthly_positions_for(ledger, now))
            .collect()
    }

    /// Monthly series of one ledger, from its first transaction's month
    /// through the month of `now` (or of its last transaction, if later).
    pub fn monthly_positions_for(&self, ledger: &InstrumentLedger, now: NaiveDateTime) -> Vec<MonthlyPosition> {
        let timeline = Self::timeline(ledger, now);
        let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        let mut cursor = 0usize;
        let mut month = (first.at.year(), first.at.month());
        let end = (last.at.year(), last.at.month());

        while month <= end {
            let month_end = month_end(month.0, month.1);

            // Advance to the last point dated on or before the month-end.
            while cursor + 1 < timeline.len() && timeline[cursor + 1].at.date() <= month_end {
                cursor += 1;
            }
            let point = &timeline[cursor];

            rows.push(MonthlyPosition {
                date: month_end,
                ticker: ledger.ticker.clone(),
                broker: point.source.broker.clone(),
                exchange: point.source.exchange.clone(),
                adjusted_quantity: point.position.adjusted_quantity,
                adjusted_cost: point.position.adjusted_cost,
                adjusted_unit_price: point.position.adjusted_unit_price,
                year: month.0,
                month: month.1,
            });

            month = next_month(month.0, month.1);
        }

        rows
    }

    /// Ledger rows plus the synthetic as-of-now row, in time order.
    ///
    /// Same-day rows get distinct millisecond offsets so they keep their
    /// accounting order instead of collapsing into one instant.
    fn timeline(ledger: &InstrumentLedger, now: NaiveDateTime) -> Vec<TimelinePoint<'_>> {
        let mut points: Vec<TimelinePoint<'_>> = Vec::with_capacity(ledger.entries.len() + 1);
        let mut previous_date: Option<NaiveDate> = None;
        let mut same_day = 0i64;

        for entry in &ledger.entries {
            if previous_date == Some(entry.date) {
                same_day += 1;
            } else {
                same_day = 0;
                previous_date = Some(entry.date);
            }
            points.push(TimelinePoint {
                at: entry.date.and_time(NaiveTime::MIN) + Duration::milliseconds(same_day),
                position: entry.position(),
                source: entry,
            });
        }

        // Before the first transaction there is nothing to carry forward.
        if let Some(current) = ledger.entry_at(now.date()) {
            points.push(TimelinePoint {
                at: now,
                position: current.position(),
                source: current,
            });
        }

        // A future-dated transaction sorts after "now"; the stable sort keeps
        // the synthetic row behind any real row sharing its instant.
        points.sort_by_key(|p| p.at);
        points
    }
}

impl Default for ResampleService {
    fn default() -> Self {
        Self::new()
    }
}

/// Last calendar day of a month.
pub fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = next_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
