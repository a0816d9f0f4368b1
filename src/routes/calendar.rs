use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    error::{AppError, AppResult},
    repository::{
        pricing_config::invalidate_pricing_config,
        table_service::{create_row, delete_row, get_row, list_rows},
    },
    schemas::{clamp_limit, parse_iso_date, CalendarBlockPath, CalendarBlocksQuery,
        CreateCalendarBlockInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/calendar-blocks",
            axum::routing::get(list_calendar_blocks).post(create_calendar_block),
        )
        .route(
            "/calendar-blocks/{block_id}",
            axum::routing::delete(delete_calendar_block),
        )
}

async fn list_calendar_blocks(
    State(state): State<AppState>,
    Query(query): Query<CalendarBlocksQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert(
        "property_id".to_string(),
        Value::String(query.property_id.clone()),
    );
    if let Some(from) = query.from.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        parse_iso_date(from, "from")?;
        filters.insert("start_date__gte".to_string(), Value::String(from.to_string()));
    }
    if let Some(to) = query.to.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        parse_iso_date(to, "to")?;
        filters.insert("start_date__lte".to_string(), Value::String(to.to_string()));
    }

    let rows = list_rows(
        pool,
        "calendar_blocks",
        Some(&filters),
        clamp_limit(query.limit),
        0,
        "start_date",
        true,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_calendar_block(
    State(state): State<AppState>,
    Json(payload): Json<CreateCalendarBlockInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;

    let start = parse_iso_date(&payload.start_date, "start")?;
    let end = match payload.end_date.as_deref() {
        Some(raw) => parse_iso_date(raw, "end")?,
        None => start,
    };
    if end < start {
        return Err(AppError::BadRequest(
            "End date must not be before start date.".to_string(),
        ));
    }

    let property = get_row(pool, "properties", &payload.property_id, "id").await?;
    let organization_id = value_str(&property, "organization_id");

    let mut record = Map::new();
    record.insert("organization_id".to_string(), Value::String(organization_id));
    record.insert(
        "property_id".to_string(),
        Value::String(payload.property_id.clone()),
    );
    record.insert("start_date".to_string(), Value::String(start.to_string()));
    record.insert("end_date".to_string(), Value::String(end.to_string()));
    if let Some(reason) = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        record.insert("reason".to_string(), Value::String(reason.to_string()));
    }

    let created = create_row(pool, "calendar_blocks", &record).await?;
    invalidate_pricing_config(&state, &payload.property_id).await;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn delete_calendar_block(
    State(state): State<AppState>,
    Path(path): Path<CalendarBlockPath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let deleted = delete_row(pool, "calendar_blocks", &path.block_id, "id").await?;
    let property_id = value_str(&deleted, "property_id");
    if !property_id.is_empty() {
        invalidate_pricing_config(&state, &property_id).await;
    }
    Ok(Json(deleted))
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
