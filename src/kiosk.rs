// src/kiosk.rs
//
// Patient-facing projection and search matching. Everything returned to the
// kiosk goes through `SafeRecord`: no phone numbers, no missed-appointment
// counts, no free-text notes. Pure functions; the HTTP handlers live in
// routes/kiosk_routes.rs.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::enrich;
use crate::error::ApiError;
use crate::models::AppointmentRow;

/// Procedure code fragment -> plain-English label. Ordered: the first
/// matching fragment wins, so longer codes sit above their prefixes
/// ("ImpCrPrep" before "ImpCr", "SRPMaxSext" before "SRP").
const PROC_LABELS: &[(&str, &str)] = &[
    ("ImpCrPrep", "Implant Crown Prep"),
    ("ImpCr", "Implant Crown"),
    ("PFMSeat", "Crown Placement"),
    ("PFMPrep", "Crown Preparation"),
    ("PFM", "Crown"),
    ("SRPMaxSext", "Deep Cleaning"),
    ("SRPMandSext", "Deep Cleaning"),
    ("SRP", "Deep Cleaning"),
    ("RCT", "Root Canal"),
    ("Perio", "Gum Treatment"),
    ("BWX", "X-Rays"),
    ("FMX", "Full X-Rays"),
    ("PA", "X-Ray"),
    ("CompF", "Filling"),
    ("CompA", "Filling"),
    ("Comp", "Filling"),
    ("Ext", "Extraction"),
    ("Pre-fab", "Post Placement"),
    ("Core", "Build-Up"),
    ("Seat", "Crown Seating"),
    ("Post", "Post Placement"),
    ("Pro", "Cleaning"),
    ("Ex", "Exam"),
    ("Bl", "Whitening"),
    ("Ven", "Veneer"),
];

/// Surname fragments that mark a provider record as an organization rather
/// than a named clinician.
const NON_PERSON_TOKENS: &[&str] = &["PC", "LLC", "INC", "GROUP", "DENTAL", "ASSOCIATES", "CARE"];

const MIN_PHONE_DIGITS: usize = 7;

/// What the kiosk is allowed to see. `last_visit` of None means first visit.
#[derive(Debug, Serialize)]
pub struct SafeRecord {
    pub pat_num: i64,
    pub first_name: String,
    pub last_name: String,
    pub time: String,
    pub provider: String,
    pub room: String,
    pub procedure: String,
    pub last_visit: Option<String>,
}

/// Comma-separated procedure codes -> deduplicated plain-English labels.
/// Tooth-number prefixes like "#12-PFMPrep" are stripped before matching.
pub fn simplify_procedure(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "Dental Visit".to_string();
    }
    let mut labels: Vec<&str> = Vec::new();
    for part in raw.split(',') {
        let part = part.trim().trim_start_matches('#');
        let code = match part.split_once('-') {
            Some((_, rest)) => rest,
            None => part,
        };
        let code_lower = code.to_lowercase();
        let label = PROC_LABELS
            .iter()
            .find(|(fragment, _)| code_lower.contains(&fragment.to_lowercase()))
            .map(|(_, label)| *label)
            .unwrap_or("Dental Visit");
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels.join(", ")
}

/// "Dr. First Last" for a named clinician; the abbreviation when it already
/// reads as a doctor; otherwise a generic team label.
pub fn provider_display(apt: &AppointmentRow) -> String {
    let fname = apt.prov_fname.as_deref().unwrap_or("").trim();
    let lname = apt.prov_lname.as_deref().unwrap_or("").trim();
    let abbr = apt.prov_abbr.as_deref().unwrap_or("").trim();

    let lname_upper = lname.to_uppercase();
    let organizational = NON_PERSON_TOKENS.iter().any(|t| lname_upper.contains(t));
    if !organizational && !fname.is_empty() && !lname.is_empty() {
        return format!("Dr. {fname} {lname}");
    }
    if abbr.to_lowercase().starts_with("dr") {
        return abbr.to_string();
    }
    "our dental team".to_string()
}

pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn project_safe(apt: &AppointmentRow, last_visit: Option<NaiveDateTime>) -> SafeRecord {
    SafeRecord {
        pat_num: apt.pat_num,
        first_name: apt.pat_fname.clone().unwrap_or_default(),
        last_name: apt.pat_lname.clone().unwrap_or_default(),
        time: apt.time_display(),
        provider: provider_display(apt),
        room: apt.operatory_name.clone().unwrap_or_default(),
        procedure: simplify_procedure(apt.proc_descript.as_deref().unwrap_or("")),
        last_visit: last_visit.map(|dt| dt.format("%B %d, %Y").to_string()),
    }
}

/* -------------------------
   Search matching
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Lowercased last-name prefix.
    LastName(String),
    Birthdate(NaiveDate),
    /// Normalized digit suffix, at least MIN_PHONE_DIGITS long.
    Phone(String),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("provide q, dob, or phone")]
    MissingQuery,
    #[error("dob must be MM/DD/YYYY")]
    DobInvalid,
    #[error("phone search needs at least 7 digits")]
    PhoneShort,
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let code = match e {
            SearchError::MissingQuery => "MISSING_QUERY",
            SearchError::DobInvalid => "DOB_INVALID",
            SearchError::PhoneShort => "PHONE_SHORT",
        };
        ApiError::BadRequest(code, e.to_string())
    }
}

/// Exactly one search mode per request; q wins over dob wins over phone.
/// Validation happens here, before any data access.
pub fn parse_query(
    q: Option<&str>,
    dob: Option<&str>,
    phone: Option<&str>,
) -> Result<SearchQuery, SearchError> {
    fn clean(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    if let Some(q) = clean(q) {
        return Ok(SearchQuery::LastName(q.to_lowercase()));
    }

    if let Some(dob) = clean(dob) {
        let mut parts = dob.split('/');
        let (m, d, y) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(d), Some(y), None) => (m, d, y),
            _ => return Err(SearchError::DobInvalid),
        };
        let month: u32 = m.parse().map_err(|_| SearchError::DobInvalid)?;
        let day: u32 = d.parse().map_err(|_| SearchError::DobInvalid)?;
        let year: i32 = y.parse().map_err(|_| SearchError::DobInvalid)?;
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(SearchError::DobInvalid)?;
        return Ok(SearchQuery::Birthdate(date));
    }

    if let Some(phone) = clean(phone) {
        let digits = digits_only(phone);
        if digits.len() < MIN_PHONE_DIGITS {
            return Err(SearchError::PhoneShort);
        }
        return Ok(SearchQuery::Phone(digits));
    }

    Err(SearchError::MissingQuery)
}

/// Membership test against one of today's appointments. Sentinel birthdates
/// (year < 1900) never match a dob search, so the "unknown date of birth"
/// placeholder cannot produce false positives.
pub fn matches(query: &SearchQuery, apt: &AppointmentRow) -> bool {
    match query {
        SearchQuery::LastName(prefix) => apt
            .pat_lname
            .as_deref()
            .is_some_and(|l| l.to_lowercase().starts_with(prefix.as_str())),
        SearchQuery::Birthdate(wanted) => apt
            .birthdate
            .is_some_and(|bd| enrich::is_valid_birthdate(bd) && bd == *wanted),
        SearchQuery::Phone(digits) => {
            let suffix_match = |p: Option<&str>| {
                p.is_some_and(|p| digits_only(p).ends_with(digits.as_str()))
            };
            suffix_match(apt.wireless_phone.as_deref()) || suffix_match(apt.hm_phone.as_deref())
        }
    }
}
