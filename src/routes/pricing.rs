use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    error::{AppError, AppResult},
    repository::{
        pricing_config::{invalidate_pricing_config, load_pricing_config},
        table_service::{create_row, delete_rows_by_filter, get_row, list_rows, update_row},
    },
    schemas::{serialize_to_map, validate_input, PropertyPath, SetCustomPricesInput,
        UpsertRateTableInput, UpsertSeasonalModifiersInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/properties/{property_id}/pricing",
            axum::routing::get(get_pricing_config),
        )
        .route(
            "/properties/{property_id}/rate-table",
            axum::routing::put(upsert_rate_table),
        )
        .route(
            "/properties/{property_id}/seasonal-modifiers",
            axum::routing::put(upsert_seasonal_modifiers),
        )
        .route(
            "/properties/{property_id}/custom-prices",
            axum::routing::put(replace_custom_prices),
        )
}

/// The validated, typed pricing configuration the quote calculator sees.
async fn get_pricing_config(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let config = load_pricing_config(&state, pool, &path.property_id).await?;
    Ok(Json(serde_json::to_value(config.as_ref()).map_err(
        |error| AppError::Internal(format!("Could not serialize pricing config: {error}")),
    )?))
}

async fn upsert_rate_table(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    Json(payload): Json<UpsertRateTableInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;
    let organization_id = property_org_id(pool, &path.property_id).await?;

    let mut record = serialize_to_map(&payload);
    record.insert(
        "property_id".to_string(),
        Value::String(path.property_id.clone()),
    );
    record.insert("organization_id".to_string(), Value::String(organization_id));

    let saved = upsert_by_property(pool, "rate_tables", &path.property_id, record).await?;
    invalidate_pricing_config(&state, &path.property_id).await;
    Ok(Json(saved))
}

async fn upsert_seasonal_modifiers(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    Json(payload): Json<UpsertSeasonalModifiersInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;
    let organization_id = property_org_id(pool, &path.property_id).await?;

    let mut record = serialize_to_map(&payload);
    record.insert(
        "property_id".to_string(),
        Value::String(path.property_id.clone()),
    );
    record.insert("organization_id".to_string(), Value::String(organization_id));

    let saved =
        upsert_by_property(pool, "seasonal_modifier_sets", &path.property_id, record).await?;
    invalidate_pricing_config(&state, &path.property_id).await;
    Ok(Json(saved))
}

/// Replace the whole per-date override map: delete the property's existing
/// rows, then insert one row per date.
async fn replace_custom_prices(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    Json(payload): Json<SetCustomPricesInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let pool = db_pool(&state)?;
    let organization_id = property_org_id(pool, &path.property_id).await?;

    let filters = property_filter(&path.property_id);
    delete_rows_by_filter(pool, "custom_nightly_prices", &filters).await?;

    let mut created = Vec::with_capacity(payload.prices.len());
    for (date, price) in &payload.prices {
        let mut record = Map::new();
        record.insert(
            "organization_id".to_string(),
            Value::String(organization_id.clone()),
        );
        record.insert(
            "property_id".to_string(),
            Value::String(path.property_id.clone()),
        );
        record.insert("date".to_string(), Value::String(date.clone()));
        record.insert("nightly_price".to_string(), json!(price));
        created.push(create_row(pool, "custom_nightly_prices", &record).await?);
    }

    invalidate_pricing_config(&state, &path.property_id).await;
    Ok(Json(json!({ "data": created })))
}

async fn upsert_by_property(
    pool: &sqlx::PgPool,
    table: &str,
    property_id: &str,
    record: Map<String, Value>,
) -> AppResult<Value> {
    let filters = property_filter(property_id);
    let existing = list_rows(pool, table, Some(&filters), 1, 0, "created_at", false).await?;

    match existing.into_iter().next() {
        Some(row) => {
            let row_id = value_str(&row, "id");
            update_row(pool, table, &row_id, &record, "id").await
        }
        None => create_row(pool, table, &record).await,
    }
}

async fn property_org_id(pool: &sqlx::PgPool, property_id: &str) -> AppResult<String> {
    let property = get_row(pool, "properties", property_id, "id").await?;
    Ok(value_str(&property, "organization_id"))
}

fn property_filter(property_id: &str) -> Map<String, Value> {
    let mut filters = Map::new();
    filters.insert(
        "property_id".to_string(),
        Value::String(property_id.to_string()),
    );
    filters
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
