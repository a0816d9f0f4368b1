use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::services::holidays::HolidayCalendar;

/// Guests included in the base nightly price before the extra-guest fee kicks in.
pub const DEFAULT_BASE_GUEST_COUNT: i64 = 2;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    DebitCard,
    BankTransfer,
    Cash,
    Stripe,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::BankTransfer => "bank_transfer",
            Self::Cash => "cash",
            Self::Stripe => "stripe",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pix" => Some(Self::Pix),
            "credit_card" => Some(Self::CreditCard),
            "debit_card" => Some(Self::DebitCard),
            "bank_transfer" => Some(Self::BankTransfer),
            "cash" => Some(Self::Cash),
            "stripe" => Some(Self::Stripe),
            _ => None,
        }
    }
}

/// Static per-property pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    pub base_price_per_night: f64,
    pub price_per_extra_guest: f64,
    pub cleaning_fee: f64,
    pub minimum_nights: i64,
    pub base_guest_count: i64,
    /// Percentage in [-100, +100]; negative values are discounts.
    pub payment_method_surcharge_pct: BTreeMap<PaymentMethod, f64>,
}

/// Percentage modifiers keyed by calendar condition, plus per-date absolute
/// overrides. A custom price for a date replaces every percentage modifier
/// for that date; percentage modifiers combine additively with each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonalModifierSet {
    pub weekend_surcharge_pct: f64,
    pub holiday_surcharge_pct: f64,
    pub december_surcharge_pct: f64,
    pub high_season_surcharge_pct: f64,
    pub high_season_months: BTreeSet<u32>,
    pub custom_price_by_date: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilitySet {
    pub blocked_dates: BTreeSet<NaiveDate>,
}

impl AvailabilitySet {
    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.blocked_dates.contains(&date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_count: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Weekend,
    Holiday,
    December,
    HighSeason,
    CustomPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub kind: ModifierKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute: Option<f64>,
}

impl AppliedModifier {
    fn pct(kind: ModifierKind, pct: f64) -> Self {
        Self {
            kind,
            pct: Some(pct),
            absolute: None,
        }
    }

    fn absolute(amount: f64) -> Self {
        Self {
            kind: ModifierKind::CustomPrice,
            pct: None,
            absolute: Some(amount),
        }
    }
}

/// One line of the per-night audit trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightCharge {
    pub date: NaiveDate,
    pub base_price_used: f64,
    pub modifiers_applied: Vec<AppliedModifier>,
    pub price: f64,
}

/// Itemized output of a quote computation. Created fresh per request and
/// never mutated afterward; reservations store it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteBreakdown {
    pub nightly: Vec<NightCharge>,
    pub nights: i64,
    pub subtotal_nights: f64,
    pub extra_guest_fee_total: f64,
    pub cleaning_fee: f64,
    pub payment_surcharge_pct: f64,
    pub payment_surcharge_amount: f64,
    pub total: f64,
    pub total_clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("Check-out must be strictly after check-in.")]
    InvalidDateRange,
    #[error("The night of {0} is not available.")]
    DateUnavailable(NaiveDate),
    #[error("Stay of {actual} night(s) is below the minimum of {required}.")]
    MinimumStayNotMet { required: i64, actual: i64 },
    #[error("No surcharge is configured for payment method '{}'.", .0.as_str())]
    UnknownPaymentMethod(PaymentMethod),
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Compute a price breakdown for a stay, or reject it with a specific reason.
///
/// Pure and deterministic: reads only the configuration snapshots passed in,
/// performs no I/O, and always yields the same output for the same inputs.
/// Percentage modifiers that apply to the same night are summed before a
/// single multiplication against the base price; a custom per-date price
/// overrides them all. The payment surcharge applies to the pre-cleaning-fee
/// subtotal only.
pub fn compute_quote(
    rate_table: &RateTable,
    seasonal: &SeasonalModifierSet,
    availability: &AvailabilitySet,
    holidays: &HolidayCalendar,
    request: &QuoteRequest,
) -> Result<QuoteBreakdown, QuoteError> {
    if request.check_out <= request.check_in {
        return Err(QuoteError::InvalidDateRange);
    }
    let nights = (request.check_out - request.check_in).num_days();

    let extra_guests = (request.guest_count - rate_table.base_guest_count).max(0);
    let extra_guest_fee_per_night = extra_guests as f64 * rate_table.price_per_extra_guest;

    let mut nightly = Vec::with_capacity(nights as usize);
    let mut subtotal_nights = 0.0_f64;
    let mut extra_guest_fee_total = 0.0_f64;

    let mut date = request.check_in;
    while date < request.check_out {
        if availability.is_blocked(date) {
            return Err(QuoteError::DateUnavailable(date));
        }

        let (base_price_used, modifiers_applied, price) =
            match seasonal.custom_price_by_date.get(&date) {
                Some(custom) => {
                    let price = round_cents(*custom);
                    (price, vec![AppliedModifier::absolute(price)], price)
                }
                None => {
                    let mut modifiers = Vec::new();
                    if is_weekend(date) {
                        modifiers.push(AppliedModifier::pct(
                            ModifierKind::Weekend,
                            seasonal.weekend_surcharge_pct,
                        ));
                    }
                    if holidays.is_holiday(date) {
                        modifiers.push(AppliedModifier::pct(
                            ModifierKind::Holiday,
                            seasonal.holiday_surcharge_pct,
                        ));
                    }
                    if date.month() == 12 {
                        modifiers.push(AppliedModifier::pct(
                            ModifierKind::December,
                            seasonal.december_surcharge_pct,
                        ));
                    }
                    if seasonal.high_season_months.contains(&date.month()) {
                        modifiers.push(AppliedModifier::pct(
                            ModifierKind::HighSeason,
                            seasonal.high_season_surcharge_pct,
                        ));
                    }

                    let combined_pct: f64 = modifiers.iter().filter_map(|m| m.pct).sum();
                    let price = round_cents(
                        rate_table.base_price_per_night * (1.0 + combined_pct / 100.0),
                    );
                    (rate_table.base_price_per_night, modifiers, price)
                }
            };

        subtotal_nights += price;
        extra_guest_fee_total += extra_guest_fee_per_night;
        nightly.push(NightCharge {
            date,
            base_price_used,
            modifiers_applied,
            price,
        });

        date = date.succ_opt().ok_or(QuoteError::InvalidDateRange)?;
    }

    if nights < rate_table.minimum_nights {
        return Err(QuoteError::MinimumStayNotMet {
            required: rate_table.minimum_nights,
            actual: nights,
        });
    }

    let payment_surcharge_pct = rate_table
        .payment_method_surcharge_pct
        .get(&request.payment_method)
        .copied()
        .ok_or(QuoteError::UnknownPaymentMethod(request.payment_method))?;

    let subtotal_nights = round_cents(subtotal_nights);
    let extra_guest_fee_total = round_cents(extra_guest_fee_total);
    let payment_surcharge_amount = round_cents(
        (subtotal_nights + extra_guest_fee_total) * payment_surcharge_pct / 100.0,
    );

    let raw_total = subtotal_nights
        + extra_guest_fee_total
        + rate_table.cleaning_fee
        + payment_surcharge_amount;
    let total_clamped = raw_total < 0.0;
    let total = if total_clamped {
        0.0
    } else {
        round_cents(raw_total)
    };

    Ok(QuoteBreakdown {
        nightly,
        nights,
        subtotal_nights,
        extra_guest_fee_total,
        cleaning_fee: round_cents(rate_table.cleaning_fee),
        payment_surcharge_pct,
        payment_surcharge_amount,
        total,
        total_clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn flat_surcharges() -> BTreeMap<PaymentMethod, f64> {
        [
            (PaymentMethod::Pix, 0.0),
            (PaymentMethod::CreditCard, 6.0),
            (PaymentMethod::DebitCard, 3.0),
            (PaymentMethod::BankTransfer, 0.0),
            (PaymentMethod::Cash, -10.0),
            (PaymentMethod::Stripe, 8.0),
        ]
        .into_iter()
        .collect()
    }

    fn base_rate_table() -> RateTable {
        RateTable {
            base_price_per_night: 200.0,
            price_per_extra_guest: 30.0,
            cleaning_fee: 100.0,
            minimum_nights: 1,
            base_guest_count: 2,
            payment_method_surcharge_pct: flat_surcharges(),
        }
    }

    fn request(
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_count: i64,
        payment_method: PaymentMethod,
    ) -> QuoteRequest {
        QuoteRequest {
            check_in,
            check_out,
            guest_count,
            payment_method,
        }
    }

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        let table = base_rate_table();
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        // Mon 2026-03-02, weekday midweek range
        for (check_in, check_out) in [
            (date(2026, 3, 4), date(2026, 3, 2)),
            (date(2026, 3, 2), date(2026, 3, 2)),
        ] {
            let result = compute_quote(
                &table,
                &seasonal,
                &availability,
                &holidays,
                &request(check_in, check_out, 2, PaymentMethod::Pix),
            );
            assert_eq!(result, Err(QuoteError::InvalidDateRange));
        }
    }

    #[test]
    fn minimum_stay_boundary() {
        let mut table = base_rate_table();
        table.minimum_nights = 2;
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        let one_night = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 3), 2, PaymentMethod::Pix),
        );
        assert_eq!(
            one_night,
            Err(QuoteError::MinimumStayNotMet {
                required: 2,
                actual: 1
            })
        );

        let two_nights = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 4), 2, PaymentMethod::Pix),
        );
        assert!(two_nights.is_ok());
    }

    #[test]
    fn blocked_date_rejected_with_exact_date() {
        let table = base_rate_table();
        let seasonal = SeasonalModifierSet::default();
        let holidays = HolidayCalendar::empty();
        let blocked = date(2026, 3, 4);
        let availability = AvailabilitySet {
            blocked_dates: [blocked].into_iter().collect(),
        };

        // Blocked date sits in the middle of the range, not at an edge.
        let result = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 6), 2, PaymentMethod::Pix),
        );
        assert_eq!(result, Err(QuoteError::DateUnavailable(blocked)));

        // Check-out day itself is exclusive; blocking it does not reject.
        let availability = AvailabilitySet {
            blocked_dates: [date(2026, 3, 6)].into_iter().collect(),
        };
        let result = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 6), 2, PaymentMethod::Pix),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn custom_price_overrides_percentage_modifiers() {
        let mut table = base_rate_table();
        table.base_price_per_night = 100.0;
        table.cleaning_fee = 0.0;
        let saturday = date(2026, 3, 7);
        let seasonal = SeasonalModifierSet {
            weekend_surcharge_pct: 25.0,
            custom_price_by_date: [(saturday, 80.0)].into_iter().collect(),
            ..SeasonalModifierSet::default()
        };
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        let breakdown = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(saturday, date(2026, 3, 8), 2, PaymentMethod::Pix),
        )
        .unwrap();

        let night = &breakdown.nightly[0];
        assert_eq!(night.price, 80.0);
        assert_eq!(night.base_price_used, 80.0);
        assert_eq!(night.modifiers_applied.len(), 1);
        assert_eq!(night.modifiers_applied[0].kind, ModifierKind::CustomPrice);
        assert_eq!(night.modifiers_applied[0].absolute, Some(80.0));
        assert_eq!(breakdown.subtotal_nights, 80.0);
    }

    #[test]
    fn seasonal_modifiers_are_additive_not_compounded() {
        let mut table = base_rate_table();
        table.base_price_per_night = 100.0;
        table.cleaning_fee = 0.0;
        let seasonal = SeasonalModifierSet {
            weekend_surcharge_pct: 5.0,
            december_surcharge_pct: 10.0,
            high_season_surcharge_pct: 20.0,
            high_season_months: [12].into_iter().collect(),
            ..SeasonalModifierSet::default()
        };
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        // 2026-12-05 is a Saturday in December, in a high-season month.
        let breakdown = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 12, 5), date(2026, 12, 6), 2, PaymentMethod::Pix),
        )
        .unwrap();

        let night = &breakdown.nightly[0];
        assert_eq!(night.price, 135.0);
        assert_eq!(night.modifiers_applied.len(), 3);
        let kinds: Vec<ModifierKind> = night.modifiers_applied.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ModifierKind::Weekend,
                ModifierKind::December,
                ModifierKind::HighSeason
            ]
        );
    }

    #[test]
    fn holiday_surcharge_applies_on_calendar_holidays() {
        let mut table = base_rate_table();
        table.base_price_per_night = 100.0;
        table.cleaning_fee = 0.0;
        let seasonal = SeasonalModifierSet {
            holiday_surcharge_pct: 15.0,
            ..SeasonalModifierSet::default()
        };
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::brazil();

        // Tiradentes 2026 falls on a Tuesday.
        let breakdown = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 4, 21), date(2026, 4, 22), 2, PaymentMethod::Pix),
        )
        .unwrap();
        assert_eq!(breakdown.nightly[0].price, 115.0);
        assert_eq!(
            breakdown.nightly[0].modifiers_applied[0].kind,
            ModifierKind::Holiday
        );
    }

    #[test]
    fn payment_discount_reduces_total_by_exact_share() {
        let table = base_rate_table();
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        // 3 midweek nights, 3 guests: subtotal 600, extra-guest fee 90.
        let check_in = date(2026, 3, 2);
        let check_out = date(2026, 3, 5);
        let neutral = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(check_in, check_out, 3, PaymentMethod::Pix),
        )
        .unwrap();
        let discounted = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(check_in, check_out, 3, PaymentMethod::Cash),
        )
        .unwrap();

        assert_eq!(discounted.payment_surcharge_amount, -69.0);
        assert_eq!(neutral.total - discounted.total, 69.0);
        // The discount never touches the cleaning fee.
        assert_eq!(discounted.cleaning_fee, neutral.cleaning_fee);
    }

    #[test]
    fn end_to_end_three_night_stay() {
        let table = base_rate_table();
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        let breakdown = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 5), 3, PaymentMethod::Pix),
        )
        .unwrap();

        assert_eq!(breakdown.nights, 3);
        assert_eq!(breakdown.subtotal_nights, 600.0);
        assert_eq!(breakdown.extra_guest_fee_total, 90.0);
        assert_eq!(breakdown.cleaning_fee, 100.0);
        assert_eq!(breakdown.payment_surcharge_amount, 0.0);
        assert_eq!(breakdown.total, 790.0);
        assert!(!breakdown.total_clamped);
        assert_eq!(breakdown.nightly.len(), 3);
    }

    #[test]
    fn total_never_goes_negative() {
        let mut table = base_rate_table();
        table.cleaning_fee = 0.0;
        table.price_per_extra_guest = 0.0;
        table
            .payment_method_surcharge_pct
            .insert(PaymentMethod::Cash, -100.0);
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();
        let req = request(date(2026, 3, 2), date(2026, 3, 4), 2, PaymentMethod::Cash);

        let breakdown =
            compute_quote(&table, &seasonal, &availability, &holidays, &req).unwrap();
        assert_eq!(breakdown.total, 0.0);
        assert!(!breakdown.total_clamped);

        // A stored surcharge below -100% would drive the raw total negative;
        // the calculator clamps and flags instead of returning a negative sum.
        table
            .payment_method_surcharge_pct
            .insert(PaymentMethod::Cash, -150.0);
        let breakdown =
            compute_quote(&table, &seasonal, &availability, &holidays, &req).unwrap();
        assert_eq!(breakdown.total, 0.0);
        assert!(breakdown.total_clamped);
    }

    #[test]
    fn unknown_payment_method_surcharge_lookup() {
        let mut table = base_rate_table();
        table.payment_method_surcharge_pct.clear();
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        let result = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 4), 2, PaymentMethod::Stripe),
        );
        assert_eq!(
            result,
            Err(QuoteError::UnknownPaymentMethod(PaymentMethod::Stripe))
        );
    }

    #[test]
    fn identical_inputs_yield_bit_identical_output() {
        let table = base_rate_table();
        let seasonal = SeasonalModifierSet {
            weekend_surcharge_pct: 12.5,
            holiday_surcharge_pct: 7.0,
            high_season_surcharge_pct: 18.0,
            high_season_months: [1, 2, 12].into_iter().collect(),
            custom_price_by_date: [(date(2026, 12, 31), 950.0)].into_iter().collect(),
            ..SeasonalModifierSet::default()
        };
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::brazil();
        let req = request(
            date(2026, 12, 28),
            date(2027, 1, 2),
            4,
            PaymentMethod::CreditCard,
        );

        let first = compute_quote(&table, &seasonal, &availability, &holidays, &req).unwrap();
        let second = compute_quote(&table, &seasonal, &availability, &holidays, &req).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn extra_guest_fee_only_above_base_count() {
        let table = base_rate_table();
        let seasonal = SeasonalModifierSet::default();
        let availability = AvailabilitySet::default();
        let holidays = HolidayCalendar::empty();

        let solo = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 4), 1, PaymentMethod::Pix),
        )
        .unwrap();
        assert_eq!(solo.extra_guest_fee_total, 0.0);

        let crowd = compute_quote(
            &table,
            &seasonal,
            &availability,
            &holidays,
            &request(date(2026, 3, 2), date(2026, 3, 4), 5, PaymentMethod::Pix),
        )
        .unwrap();
        // 3 extra guests x 30 x 2 nights
        assert_eq!(crowd.extra_guest_fee_total, 180.0);
    }

    #[test]
    fn payment_method_round_trips_snake_case() {
        for method in [
            PaymentMethod::Pix,
            PaymentMethod::CreditCard,
            PaymentMethod::DebitCard,
            PaymentMethod::BankTransfer,
            PaymentMethod::Cash,
            PaymentMethod::Stripe,
        ] {
            assert_eq!(PaymentMethod::parse(method.as_str()), Some(method));
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
        }
        assert_eq!(PaymentMethod::parse("boleto"), None);
    }
}
