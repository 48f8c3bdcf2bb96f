// src/routes/kiosk_routes.rs
//
// Patient-facing kiosk endpoints: search today's schedule and serve patient
// photos from the practice image store. Responses go through the safe
// projection in kiosk.rs.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::{
    db,
    error::ApiError,
    kiosk,
    models::{AppState, AppointmentRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/photo/{pat_num}", get(patient_photo))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<kiosk::SafeRecord>,
}

/// GET /kiosk/search?q=|dob=|phone= against today's schedule only.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = kiosk::parse_query(
        params.q.as_deref(),
        params.dob.as_deref(),
        params.phone.as_deref(),
    )?;

    let data = db::fetch_day_schedule(&state.db, Local::now().date_naive())
        .await
        .map_err(|e| ApiError::Internal("DB_UNAVAILABLE", e.to_string()))?;

    let matched: Vec<&AppointmentRow> = data
        .appointments
        .iter()
        .filter(|apt| kiosk::matches(&query, apt))
        .collect();

    let mut patient_ids: Vec<i64> = matched.iter().map(|a| a.pat_num).collect();
    patient_ids.sort_unstable();
    patient_ids.dedup();

    // Last-visit enrichment is secondary: a failed lookup degrades to
    // last_visit = null rather than failing the whole search.
    let last_visits = db::fetch_last_visits(&state.db, &patient_ids)
        .await
        .unwrap_or_default();

    let results = matched
        .iter()
        .map(|apt| kiosk::project_safe(apt, last_visits.get(&apt.pat_num).copied()))
        .collect();

    Ok(Json(SearchResponse { results }))
}

/// GET /kiosk/photo/{pat_num}: the most recent patient photo, or 404 when
/// there is no document record or no file on the image share. Lookup errors
/// degrade to 404 too; the kiosk simply shows no photo.
pub async fn patient_photo(
    State(state): State<AppState>,
    UrlPath(pat_num): UrlPath<i64>,
) -> Response {
    let filename = match db::fetch_patient_photo_file(&state.db, pat_num).await {
        Ok(Some(name)) => name,
        Ok(None) | Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    let Some(path) = resolve_photo_path(&state.image_root, &filename) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, mime_for(&filename))], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// The image store keys patient folders by name: "GarciaBenjamin15388.jpg"
/// lives under "G/GarciaBenjamin/". Some installs use a flat
/// "A to Z Folders" layout instead, so try both.
fn resolve_photo_path(root: &Path, filename: &str) -> Option<PathBuf> {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    let folder = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    if folder.is_empty() {
        return None;
    }
    let letter = folder.chars().next()?.to_ascii_uppercase().to_string();

    let primary = root.join(&letter).join(folder).join(filename);
    if primary.exists() {
        return Some(primary);
    }
    let fallback = root.join("A to Z Folders").join(folder).join(filename);
    fallback.exists().then_some(fallback)
}

fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
