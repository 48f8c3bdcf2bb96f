use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::MySqlPool,
    pub image_root: PathBuf,
}

/* -------------------------
   DB Row Models
--------------------------*/

/// Appointment status codes as stored by the practice-management system.
/// Only `Scheduled` rows constitute the day's schedule; `Broken` rows feed
/// the missed-appointment history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[repr(i8)]
pub enum AptStatus {
    Scheduled = 1,
    Complete = 2,
    UnschedList = 3,
    Asap = 4,
    Broken = 5,
    Unscheduled = 6,
    Planned = 7,
    PtNote = 8,
    PtNoteCompleted = 9,
}

/// One scheduled visit, joined to patient, provider, and operatory.
/// Patient/provider/operatory columns come through LEFT JOINs, so they are
/// nullable even where the source tables default them.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentRow {
    pub apt_num: i64,
    pub apt_date_time: NaiveDateTime,
    pub pat_num: i64,
    pub prov_num: i64,
    pub status: AptStatus,
    pub proc_descript: Option<String>,
    pub is_new_patient: bool,
    pub note: Option<String>,
    pub clinic_num: i64,
    pub operatory_num: i64,
    pub pat_fname: Option<String>,
    pub pat_lname: Option<String>,
    pub hm_phone: Option<String>,
    pub wireless_phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub email: Option<String>,
    pub prov_fname: Option<String>,
    pub prov_lname: Option<String>,
    pub prov_abbr: Option<String>,
    pub operatory_name: Option<String>,
}

impl AppointmentRow {
    pub fn patient_name(&self) -> String {
        format!(
            "{} {}",
            self.pat_fname.as_deref().unwrap_or(""),
            self.pat_lname.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }

    /// Wireless first, then home phone.
    pub fn best_phone(&self) -> Option<&str> {
        [self.wireless_phone.as_deref(), self.hm_phone.as_deref()]
            .into_iter()
            .flatten()
            .find(|p| !p.trim().is_empty())
    }

    /// 12-hour clock without a leading zero, e.g. "9:05 AM".
    pub fn time_display(&self) -> String {
        let formatted = self.apt_date_time.format("%I:%M %p").to_string();
        formatted.trim_start_matches('0').to_string()
    }

    pub fn room_display(&self) -> String {
        match self.operatory_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("Op {}", self.operatory_num),
        }
    }
}

/// One day's raw fetch result: scheduled appointments plus the
/// broken-appointment counts for the patients appearing that day.
#[derive(Debug, Clone)]
pub struct ScheduleData {
    pub appointments: Vec<AppointmentRow>,
    pub broken_history: BTreeMap<i64, i64>,
}

/* -------------------------
   API DTOs
--------------------------*/

/// JSON shape shared by the CLI default mode and GET /api/appointments.
#[derive(Debug, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub appointment_count: usize,
    pub appointments: Vec<AppointmentRow>,
    pub broken_history: BTreeMap<i64, i64>,
}

impl DayReport {
    pub fn new(date: NaiveDate, data: ScheduleData) -> Self {
        Self {
            date,
            appointment_count: data.appointments.len(),
            appointments: data.appointments,
            broken_history: data.broken_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(hour: u32, min: u32) -> AppointmentRow {
        AppointmentRow {
            apt_num: 1,
            apt_date_time: NaiveDate::from_ymd_opt(2026, 2, 20)
                .unwrap()
                .and_hms_opt(hour, min, 0)
                .unwrap(),
            pat_num: 10,
            prov_num: 1,
            status: AptStatus::Scheduled,
            proc_descript: None,
            is_new_patient: false,
            note: None,
            clinic_num: 0,
            operatory_num: 3,
            pat_fname: Some("Ana".into()),
            pat_lname: Some("Reyes".into()),
            hm_phone: Some("555-1000".into()),
            wireless_phone: Some("".into()),
            birthdate: None,
            email: None,
            prov_fname: None,
            prov_lname: None,
            prov_abbr: None,
            operatory_name: None,
        }
    }

    #[test]
    fn time_display_strips_leading_zero() {
        assert_eq!(row(9, 5).time_display(), "9:05 AM");
        assert_eq!(row(14, 30).time_display(), "2:30 PM");
    }

    #[test]
    fn best_phone_skips_empty_wireless() {
        assert_eq!(row(9, 0).best_phone(), Some("555-1000"));
    }

    #[test]
    fn room_falls_back_to_operatory_number() {
        assert_eq!(row(9, 0).room_display(), "Op 3");
    }
}
