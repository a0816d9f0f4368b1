use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::error::AppError;
use crate::repository::table_service::{get_row, list_rows};
use crate::services::quote::{
    AvailabilitySet, PaymentMethod, RateTable, SeasonalModifierSet, DEFAULT_BASE_GUEST_COUNT,
};
use crate::state::AppState;

/// Validated pricing configuration for one property. Constructed here, at the
/// data-access boundary, so the quote calculator never receives
/// partially-shaped rows.
#[derive(Debug, Clone, Serialize)]
pub struct PricingConfig {
    pub property_id: String,
    pub organization_id: String,
    pub rate_table: RateTable,
    pub seasonal_modifiers: SeasonalModifierSet,
    pub availability: AvailabilitySet,
}

/// Load a property's pricing configuration, via the per-property TTL cache.
pub async fn load_pricing_config(
    state: &AppState,
    pool: &PgPool,
    property_id: &str,
) -> Result<Arc<PricingConfig>, AppError> {
    if let Some(hit) = state.pricing_cache.get(property_id).await {
        return Ok(hit);
    }
    let config = Arc::new(fetch_pricing_config(pool, property_id).await?);
    state
        .pricing_cache
        .insert(property_id.to_string(), config.clone())
        .await;
    Ok(config)
}

pub async fn invalidate_pricing_config(state: &AppState, property_id: &str) {
    state.pricing_cache.invalidate(property_id).await;
}

pub async fn fetch_pricing_config(
    pool: &PgPool,
    property_id: &str,
) -> Result<PricingConfig, AppError> {
    let property = get_row(pool, "properties", property_id, "id").await?;
    let organization_id = value_str(&property, "organization_id");

    let filters = property_filter(property_id);

    let rate_rows = list_rows(pool, "rate_tables", Some(&filters), 1, 0, "created_at", false).await?;
    let rate_row = rate_rows.into_iter().next().ok_or_else(|| {
        AppError::NotFound("Rate table is not configured for this property.".to_string())
    })?;
    let rate_table = parse_rate_table(&rate_row)?;

    let seasonal_rows = list_rows(
        pool,
        "seasonal_modifier_sets",
        Some(&filters),
        1,
        0,
        "created_at",
        false,
    )
    .await?;
    let mut seasonal_modifiers = match seasonal_rows.into_iter().next() {
        Some(row) => parse_seasonal_modifiers(&row)?,
        None => SeasonalModifierSet::default(),
    };

    let custom_rows = list_rows(
        pool,
        "custom_nightly_prices",
        Some(&filters),
        1000,
        0,
        "date",
        true,
    )
    .await?;
    seasonal_modifiers.custom_price_by_date = parse_custom_prices(&custom_rows);

    let block_rows = list_rows(
        pool,
        "calendar_blocks",
        Some(&filters),
        1000,
        0,
        "start_date",
        true,
    )
    .await?;
    let availability = expand_calendar_blocks(&block_rows);

    Ok(PricingConfig {
        property_id: property_id.to_string(),
        organization_id,
        rate_table,
        seasonal_modifiers,
        availability,
    })
}

fn property_filter(property_id: &str) -> Map<String, Value> {
    let mut filters = Map::new();
    filters.insert(
        "property_id".to_string(),
        Value::String(property_id.to_string()),
    );
    filters
}

#[derive(Debug, Default, Deserialize)]
struct RateTableRow {
    #[serde(default)]
    base_price_per_night: Option<f64>,
    #[serde(default)]
    price_per_extra_guest: Option<f64>,
    #[serde(default)]
    cleaning_fee: Option<f64>,
    #[serde(default)]
    minimum_nights: Option<i64>,
    #[serde(default)]
    base_guest_count: Option<i64>,
    #[serde(default)]
    payment_method_surcharge_pct: Option<BTreeMap<String, f64>>,
}

fn parse_rate_table(row: &Value) -> Result<RateTable, AppError> {
    let parsed: RateTableRow = serde_json::from_value(row.clone())
        .map_err(|error| AppError::Internal(format!("Malformed rate table row: {error}")))?;

    Ok(RateTable {
        base_price_per_night: non_negative(parsed.base_price_per_night, "base_price_per_night"),
        price_per_extra_guest: non_negative(parsed.price_per_extra_guest, "price_per_extra_guest"),
        cleaning_fee: non_negative(parsed.cleaning_fee, "cleaning_fee"),
        minimum_nights: parsed.minimum_nights.unwrap_or(1).max(1),
        base_guest_count: parsed
            .base_guest_count
            .unwrap_or(DEFAULT_BASE_GUEST_COUNT)
            .max(1),
        payment_method_surcharge_pct: parse_surcharges(
            parsed.payment_method_surcharge_pct.unwrap_or_default(),
        ),
    })
}

fn parse_surcharges(raw: BTreeMap<String, f64>) -> BTreeMap<PaymentMethod, f64> {
    let mut surcharges = BTreeMap::new();
    for (key, pct) in raw {
        match PaymentMethod::parse(&key) {
            Some(method) => {
                surcharges.insert(method, pct.clamp(-100.0, 100.0));
            }
            None => {
                tracing::warn!(payment_method = %key, "Skipping unknown payment method surcharge");
            }
        }
    }
    surcharges
}

#[derive(Debug, Default, Deserialize)]
struct SeasonalModifierRow {
    #[serde(default)]
    weekend_surcharge_pct: Option<f64>,
    #[serde(default)]
    holiday_surcharge_pct: Option<f64>,
    #[serde(default)]
    december_surcharge_pct: Option<f64>,
    #[serde(default)]
    high_season_surcharge_pct: Option<f64>,
    #[serde(default)]
    high_season_months: Option<Vec<i64>>,
}

fn parse_seasonal_modifiers(row: &Value) -> Result<SeasonalModifierSet, AppError> {
    let parsed: SeasonalModifierRow = serde_json::from_value(row.clone())
        .map_err(|error| AppError::Internal(format!("Malformed seasonal modifier row: {error}")))?;

    Ok(SeasonalModifierSet {
        weekend_surcharge_pct: non_negative(parsed.weekend_surcharge_pct, "weekend_surcharge_pct"),
        holiday_surcharge_pct: non_negative(parsed.holiday_surcharge_pct, "holiday_surcharge_pct"),
        december_surcharge_pct: non_negative(
            parsed.december_surcharge_pct,
            "december_surcharge_pct",
        ),
        high_season_surcharge_pct: non_negative(
            parsed.high_season_surcharge_pct,
            "high_season_surcharge_pct",
        ),
        high_season_months: parsed
            .high_season_months
            .unwrap_or_default()
            .into_iter()
            .filter(|month| (1..=12).contains(month))
            .map(|month| month as u32)
            .collect(),
        custom_price_by_date: BTreeMap::new(),
    })
}

fn parse_custom_prices(rows: &[Value]) -> BTreeMap<NaiveDate, f64> {
    let mut prices = BTreeMap::new();
    for row in rows {
        let Some(date) = row
            .get("date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        else {
            continue;
        };
        let Some(price) = row.get("nightly_price").and_then(Value::as_f64) else {
            continue;
        };
        if price < 0.0 {
            tracing::warn!(date = %date, price, "Skipping negative custom nightly price");
            continue;
        }
        prices.insert(date, price);
    }
    prices
}

fn expand_calendar_blocks(rows: &[Value]) -> AvailabilitySet {
    let mut availability = AvailabilitySet::default();
    for row in rows {
        let Some(start) = row
            .get("start_date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        else {
            continue;
        };
        let end = row
            .get("end_date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
            .unwrap_or(start);
        if end < start {
            tracing::warn!(start = %start, end = %end, "Skipping inverted calendar block");
            continue;
        }
        let mut date = start;
        while date <= end {
            availability.blocked_dates.insert(date);
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
    }
    availability
}

fn non_negative(value: Option<f64>, field: &str) -> f64 {
    let resolved = value.unwrap_or(0.0);
    if resolved < 0.0 {
        tracing::warn!(field = %field, value = resolved, "Clamping negative stored value to 0");
        return 0.0;
    }
    resolved
}

fn value_str(row: &Value, key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}
