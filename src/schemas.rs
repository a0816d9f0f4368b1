use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::services::quote::PaymentMethod;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn parse_iso_date(raw: &str, label: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid {label} date.")))
}

pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 500)
}

pub fn serialize_to_map<T>(value: &T) -> serde_json::Map<String, serde_json::Value>
where
    T: serde::Serialize,
{
    let json = serde_json::to_value(value)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));
    json.as_object().cloned().unwrap_or_default()
}

pub fn remove_nulls(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    map.retain(|_, value| !value.is_null());
    map
}

fn default_limit_100() -> i64 {
    100
}
fn default_limit_200() -> i64 {
    200
}
fn default_property_status() -> String {
    "active".to_string()
}
fn default_city_sao_paulo() -> String {
    "Sao Paulo".to_string()
}
fn default_country_br() -> String {
    "BR".to_string()
}
fn default_minimum_nights() -> i64 {
    1
}
fn default_base_guest_count() -> i64 {
    2
}
fn default_guest_count() -> i64 {
    2
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct PropertyPath {
    pub property_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct PropertiesQuery {
    pub org_id: String,
    pub status: Option<String>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreatePropertyInput {
    pub organization_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub code: Option<String>,
    #[serde(default = "default_property_status")]
    pub status: String,
    pub address_line1: Option<String>,
    #[serde(default = "default_city_sao_paulo")]
    pub city: String,
    #[serde(default = "default_country_br")]
    pub country_code: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct UpdatePropertyInput {
    pub name: Option<String>,
    pub status: Option<String>,
    pub address_line1: Option<String>,
    pub city: Option<String>,
}

// ---------------------------------------------------------------------------
// Pricing configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UpsertRateTableInput {
    #[validate(range(min = 0.0))]
    pub base_price_per_night: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub price_per_extra_guest: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub cleaning_fee: f64,
    #[serde(default = "default_minimum_nights")]
    #[validate(range(min = 1))]
    pub minimum_nights: i64,
    #[serde(default = "default_base_guest_count")]
    #[validate(range(min = 1))]
    pub base_guest_count: i64,
    #[serde(default)]
    #[validate(custom(function = "validate_surcharge_map"))]
    pub payment_method_surcharge_pct: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UpsertSeasonalModifiersInput {
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub weekend_surcharge_pct: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub holiday_surcharge_pct: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub december_surcharge_pct: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub high_season_surcharge_pct: f64,
    #[serde(default)]
    #[validate(custom(function = "validate_month_list"))]
    pub high_season_months: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct SetCustomPricesInput {
    /// ISO date (YYYY-MM-DD) -> absolute nightly price.
    #[validate(custom(function = "validate_custom_price_map"))]
    pub prices: BTreeMap<String, f64>,
}

fn validation_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn validate_surcharge_map(map: &BTreeMap<String, f64>) -> Result<(), ValidationError> {
    for (method, pct) in map {
        if PaymentMethod::parse(method).is_none() {
            return Err(validation_error(
                "unknown_payment_method",
                format!("unknown payment method '{method}'"),
            ));
        }
        if !(-100.0..=100.0).contains(pct) {
            return Err(validation_error(
                "surcharge_out_of_range",
                format!("surcharge for '{method}' must be in [-100, 100]"),
            ));
        }
    }
    Ok(())
}

fn validate_month_list(months: &Vec<u32>) -> Result<(), ValidationError> {
    if months.iter().any(|month| !(1..=12).contains(month)) {
        return Err(validation_error(
            "month_out_of_range",
            "months must be in 1..=12".to_string(),
        ));
    }
    Ok(())
}

fn validate_custom_price_map(prices: &BTreeMap<String, f64>) -> Result<(), ValidationError> {
    for (date, price) in prices {
        if NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").is_err() {
            return Err(validation_error(
                "invalid_date",
                format!("'{date}' is not a YYYY-MM-DD date"),
            ));
        }
        if *price < 0.0 {
            return Err(validation_error(
                "negative_price",
                format!("price for {date} must be >= 0"),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Calendar blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CalendarBlockPath {
    pub block_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CalendarBlocksQuery {
    pub property_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_limit_200")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CreateCalendarBlockInput {
    pub property_id: String,
    pub start_date: String,
    /// Inclusive; defaults to `start_date` for a single blocked night.
    pub end_date: Option<String>,
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Quotes and reservations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct QuoteInput {
    pub property_id: String,
    pub check_in: String,
    pub check_out: String,
    #[serde(default = "default_guest_count")]
    #[validate(range(min = 1))]
    pub guest_count: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateReservationInput {
    pub property_id: String,
    pub check_in_date: String,
    pub check_out_date: String,
    #[validate(length(min = 1, max = 255))]
    pub guest_full_name: String,
    #[validate(email)]
    pub guest_email: Option<String>,
    pub guest_phone_e164: Option<String>,
    #[serde(default = "default_guest_count")]
    #[validate(range(min = 1))]
    pub guest_count: i64,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ReservationPath {
    pub reservation_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ReservationsQuery {
    pub org_id: Option<String>,
    pub property_id: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ReservationStatusInput {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surcharge_map_rejects_unknown_methods_and_out_of_range() {
        let ok: BTreeMap<String, f64> =
            [("pix".to_string(), -5.0), ("credit_card".to_string(), 6.0)]
                .into_iter()
                .collect();
        assert!(validate_surcharge_map(&ok).is_ok());

        let unknown: BTreeMap<String, f64> = [("boleto".to_string(), 1.0)].into_iter().collect();
        assert!(validate_surcharge_map(&unknown).is_err());

        let out_of_range: BTreeMap<String, f64> =
            [("cash".to_string(), -150.0)].into_iter().collect();
        assert!(validate_surcharge_map(&out_of_range).is_err());
    }

    #[test]
    fn month_list_bounds() {
        assert!(validate_month_list(&vec![1, 6, 12]).is_ok());
        assert!(validate_month_list(&vec![0]).is_err());
        assert!(validate_month_list(&vec![13]).is_err());
    }

    #[test]
    fn custom_price_map_requires_iso_dates_and_non_negative_prices() {
        let ok: BTreeMap<String, f64> = [("2026-12-31".to_string(), 950.0)].into_iter().collect();
        assert!(validate_custom_price_map(&ok).is_ok());

        let bad_date: BTreeMap<String, f64> = [("31/12/2026".to_string(), 1.0)].into_iter().collect();
        assert!(validate_custom_price_map(&bad_date).is_err());

        let negative: BTreeMap<String, f64> =
            [("2026-12-31".to_string(), -1.0)].into_iter().collect();
        assert!(validate_custom_price_map(&negative).is_err());
    }

    #[test]
    fn quote_input_validates_guest_count() {
        let input = QuoteInput {
            property_id: "p".to_string(),
            check_in: "2026-03-02".to_string(),
            check_out: "2026-03-05".to_string(),
            guest_count: 0,
            payment_method: PaymentMethod::Pix,
        };
        assert!(validate_input(&input).is_err());
    }
}
