// src/routes/api_routes.rs
//
// Dashboard JSON API. Shares the DayReport shape with the CLI's default mode.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;

use crate::{
    db,
    error::ApiError,
    models::{AppState, DayReport},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(get_appointments))
        .route("/month", get(get_month_summary))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
}

/// GET /api/appointments?date=YYYY-MM-DD (default: today)
pub async fn get_appointments(
    State(state): State<AppState>,
    Query(q): Query<AppointmentsQuery>,
) -> Result<Json<DayReport>, ApiError> {
    let date = match q.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            ApiError::BadRequest("DATE_INVALID", "date must be YYYY-MM-DD".into())
        })?,
        None => Local::now().date_naive(),
    };

    let data = db::fetch_day_schedule(&state.db, date).await?;
    Ok(Json(DayReport::new(date, data)))
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// GET /api/month?year=&month= -> {"YYYY-MM-DD": count, ...} for days with
/// at least one scheduled appointment. Defaults to the current month.
pub async fn get_month_summary(
    State(state): State<AppState>,
    Query(q): Query<MonthQuery>,
) -> Result<Json<BTreeMap<String, i64>>, ApiError> {
    let today = Local::now().date_naive();
    let year = q.year.unwrap_or_else(|| today.year());
    let month = q.month.unwrap_or_else(|| today.month());
    if !(1..=12).contains(&month) {
        return Err(ApiError::BadRequest(
            "MONTH_INVALID",
            "month must be between 1 and 12".into(),
        ));
    }

    let counts = db::fetch_month_counts(&state.db, year, month).await?;
    Ok(Json(counts))
}
