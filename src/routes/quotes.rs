use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    repository::pricing_config::load_pricing_config,
    schemas::{parse_iso_date, validate_input, QuoteInput},
    services::quote::{compute_quote, QuoteError, QuoteRequest},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/quotes", axum::routing::post(create_quote))
}

/// Compute a price breakdown for a stay against the property's stored
/// pricing configuration. Nothing is persisted; confirming the stay is the
/// reservations endpoint's job.
async fn create_quote(
    State(state): State<AppState>,
    Json(payload): Json<QuoteInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let check_in = parse_iso_date(&payload.check_in, "check-in")?;
    let check_out = parse_iso_date(&payload.check_out, "check-out")?;

    let config = load_pricing_config(&state, pool, &payload.property_id).await?;
    let request = QuoteRequest {
        check_in,
        check_out,
        guest_count: payload.guest_count,
        payment_method: payload.payment_method,
    };

    let breakdown = compute_quote(
        &config.rate_table,
        &config.seasonal_modifiers,
        &config.availability,
        &state.holidays,
        &request,
    )
    .map_err(quote_error_response)?;

    Ok(Json(json!({
        "property_id": config.property_id,
        "organization_id": config.organization_id,
        "currency": state.config.default_currency,
        "quote": breakdown,
    })))
}

/// Every `QuoteError` is a validation failure with a specific message; an
/// unavailable night is a conflict with the property's calendar.
pub(crate) fn quote_error_response(error: QuoteError) -> AppError {
    match error {
        QuoteError::DateUnavailable(_) => AppError::Conflict(error.to_string()),
        QuoteError::InvalidDateRange
        | QuoteError::MinimumStayNotMet { .. }
        | QuoteError::UnknownPaymentMethod(_) => AppError::UnprocessableEntity(error.to_string()),
    }
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::services::quote::PaymentMethod;

    #[test]
    fn quote_errors_map_to_specific_responses() {
        let blocked = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        assert!(matches!(
            quote_error_response(QuoteError::DateUnavailable(blocked)),
            AppError::Conflict(message) if message.contains("2026-03-04")
        ));
        assert!(matches!(
            quote_error_response(QuoteError::InvalidDateRange),
            AppError::UnprocessableEntity(_)
        ));
        assert!(matches!(
            quote_error_response(QuoteError::MinimumStayNotMet { required: 2, actual: 1 }),
            AppError::UnprocessableEntity(message) if message.contains("minimum of 2")
        ));
        assert!(matches!(
            quote_error_response(QuoteError::UnknownPaymentMethod(PaymentMethod::Stripe)),
            AppError::UnprocessableEntity(message) if message.contains("stripe")
        ));
    }
}
