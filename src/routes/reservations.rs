use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::{
    error::{AppError, AppResult},
    repository::{
        pricing_config::load_pricing_config,
        table_service::{create_row, get_row, list_rows, update_row},
    },
    routes::quotes::quote_error_response,
    schemas::{
        clamp_limit, parse_iso_date, validate_input, CreateReservationInput, ReservationPath,
        ReservationStatusInput, ReservationsQuery,
    },
    services::quote::{compute_quote, QuoteRequest},
    state::AppState,
};

/// Statuses that keep a date range occupied.
const ACTIVE_BOOKING_STATUSES: &[&str] = &["pending", "confirmed", "checked_in"];

const STATUS_TRANSITIONS: &[(&str, &[&str])] = &[
    ("pending", &["confirmed", "cancelled"]),
    ("confirmed", &["checked_in", "cancelled"]),
    ("checked_in", &["checked_out"]),
];

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/reservations",
            axum::routing::get(list_reservations).post(create_reservation),
        )
        .route(
            "/reservations/{reservation_id}",
            axum::routing::get(get_reservation),
        )
        .route(
            "/reservations/{reservation_id}/status",
            axum::routing::post(transition_status),
        )
}

async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ReservationsQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if let Some(org_id) = non_empty_opt(query.org_id.as_deref()) {
        filters.insert("organization_id".to_string(), Value::String(org_id));
    }
    if let Some(property_id) = non_empty_opt(query.property_id.as_deref()) {
        filters.insert("property_id".to_string(), Value::String(property_id));
    }
    if let Some(status) = non_empty_opt(query.status.as_deref()) {
        filters.insert("status".to_string(), Value::String(status));
    }
    if filters.is_empty() {
        return Err(AppError::BadRequest(
            "Provide at least one of org_id, property_id or status.".to_string(),
        ));
    }

    let rows = list_rows(
        pool,
        "reservations",
        Some(&filters),
        clamp_limit(query.limit),
        0,
        "check_in_date",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

/// Create a reservation: quote the stay against the stored configuration,
/// reject overlaps with active reservations, and persist the breakdown
/// verbatim alongside the booking.
async fn create_reservation(
    State(state): State<AppState>,
    Json(payload): Json<CreateReservationInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let check_in = parse_iso_date(&payload.check_in_date, "check-in")?;
    let check_out = parse_iso_date(&payload.check_out_date, "check-out")?;

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

    if has_active_overlap(pool, &payload.property_id, check_in, check_out).await? {
        return Err(AppError::Conflict(
            "Selected dates overlap with an existing reservation.".to_string(),
        ));
    }

    let mut guest_record = Map::new();
    guest_record.insert(
        "organization_id".to_string(),
        Value::String(config.organization_id.clone()),
    );
    guest_record.insert(
        "full_name".to_string(),
        Value::String(payload.guest_full_name.clone()),
    );
    if let Some(email) = non_empty_opt(payload.guest_email.as_deref()) {
        guest_record.insert("email".to_string(), Value::String(email));
    }
    if let Some(phone) = non_empty_opt(payload.guest_phone_e164.as_deref()) {
        guest_record.insert("phone_e164".to_string(), Value::String(phone));
    }
    let guest = create_row(pool, "guests", &guest_record).await?;
    let guest_id = value_str(&guest, "id");

    let quote_value = serde_json::to_value(&breakdown)
        .map_err(|error| AppError::Internal(format!("Could not serialize quote: {error}")))?;

    let mut record = Map::new();
    record.insert(
        "organization_id".to_string(),
        Value::String(config.organization_id.clone()),
    );
    record.insert(
        "property_id".to_string(),
        Value::String(payload.property_id.clone()),
    );
    record.insert("guest_id".to_string(), Value::String(guest_id));
    record.insert(
        "check_in_date".to_string(),
        Value::String(check_in.to_string()),
    );
    record.insert(
        "check_out_date".to_string(),
        Value::String(check_out.to_string()),
    );
    record.insert("guest_count".to_string(), json!(payload.guest_count));
    record.insert(
        "payment_method".to_string(),
        Value::String(payload.payment_method.as_str().to_string()),
    );
    record.insert("status".to_string(), Value::String("pending".to_string()));
    record.insert(
        "currency".to_string(),
        Value::String(state.config.default_currency.clone()),
    );
    record.insert("total_amount".to_string(), json!(breakdown.total));
    record.insert("quote".to_string(), quote_value);
    if let Some(notes) = non_empty_opt(payload.notes.as_deref()) {
        record.insert("notes".to_string(), Value::String(notes));
    }

    let reservation = create_row(pool, "reservations", &record).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "reservation": reservation, "guest": guest })),
    ))
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(path): Path<ReservationPath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let reservation = get_row(pool, "reservations", &path.reservation_id, "id").await?;
    Ok(Json(reservation))
}

/// Move a reservation along its lifecycle. The stored quote is never
/// recomputed here; it stays exactly as persisted at creation.
async fn transition_status(
    State(state): State<AppState>,
    Path(path): Path<ReservationPath>,
    Json(payload): Json<ReservationStatusInput>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let reservation = get_row(pool, "reservations", &path.reservation_id, "id").await?;

    let current = value_str(&reservation, "status");
    let requested = payload.status.trim().to_ascii_lowercase();
    if !is_valid_transition(&current, &requested) {
        return Err(AppError::Conflict(format!(
            "Cannot move reservation from '{current}' to '{requested}'."
        )));
    }

    let mut patch = Map::new();
    patch.insert("status".to_string(), Value::String(requested));
    let updated = update_row(pool, "reservations", &path.reservation_id, &patch, "id").await?;
    Ok(Json(updated))
}

async fn has_active_overlap(
    pool: &sqlx::PgPool,
    property_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> AppResult<bool> {
    let mut filters = Map::new();
    filters.insert(
        "property_id".to_string(),
        Value::String(property_id.to_string()),
    );
    let existing = list_rows(
        pool,
        "reservations",
        Some(&filters),
        500,
        0,
        "check_in_date",
        true,
    )
    .await?;

    Ok(existing.iter().any(|row| {
        let Some(obj) = row.as_object() else {
            return false;
        };
        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !ACTIVE_BOOKING_STATUSES.contains(&status) {
            return false;
        }
        let parsed_in = obj
            .get("check_in_date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
        let parsed_out = obj
            .get("check_out_date")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
        match (parsed_in, parsed_out) {
            (Some(existing_in), Some(existing_out)) => {
                !(check_out <= existing_in || check_in >= existing_out)
            }
            _ => false,
        }
    }))
}

fn is_valid_transition(current: &str, requested: &str) -> bool {
    STATUS_TRANSITIONS
        .iter()
        .find(|(from, _)| *from == current)
        .is_some_and(|(_, allowed)| allowed.contains(&requested))
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
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
