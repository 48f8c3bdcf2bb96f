// src/enrich.rs
//
// The appointment-enrichment pipeline: pure functions over one day's fetched
// rows. Derives per-appointment flags and schedule-level pressure signals;
// both the AI briefing and the kiosk consume its output. No I/O here.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::models::{AppointmentRow, ScheduleData};

/// The datastore stores unknown birthdates as 0001-01-01; anything before
/// this year is treated as "no birthdate on file".
pub const MIN_VALID_BIRTH_YEAR: i32 = 1900;

const TIGHT_GAP_MINUTES: i64 = 10;
const LONG_GAP_MINUTES: i64 = 30;
const HIGH_MISSED_THRESHOLD: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    NewPatient,
    Birthday,
    HighMissedCount(i64),
    TightGapBefore,
    ScheduleGapAfter(i64),
}

#[derive(Debug, Clone)]
pub struct EnrichedAppointment {
    pub row: AppointmentRow,
    pub flags: Vec<Flag>,
}

impl EnrichedAppointment {
    pub fn has(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }
}

#[derive(Debug, Clone)]
pub struct BirthdayPatient {
    pub pat_num: i64,
    pub name: String,
    pub turning: i32,
}

#[derive(Debug, Clone)]
pub struct MissedSummary {
    pub pat_num: i64,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct NewPatientSummary {
    pub name: String,
    pub time: NaiveDateTime,
}

/// A same-provider gap between consecutive appointments. `earlier`/`later`
/// are the two start times; `minutes` the distance between them.
#[derive(Debug, Clone)]
pub struct GapAlert {
    pub prov_num: i64,
    pub provider: String,
    pub earlier: NaiveDateTime,
    pub later: NaiveDateTime,
    pub minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingKind {
    Operatory,
    Provider,
}

#[derive(Debug, Clone)]
pub struct DoubleBooking {
    pub kind: BookingKind,
    pub label: String,
    pub start: NaiveDateTime,
    pub apt_nums: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PressurePoints {
    pub tight_gaps: Vec<GapAlert>,
    pub long_gaps: Vec<GapAlert>,
    pub double_bookings: Vec<DoubleBooking>,
}

impl PressurePoints {
    pub fn is_empty(&self) -> bool {
        self.tight_gaps.is_empty() && self.long_gaps.is_empty() && self.double_bookings.is_empty()
    }
}

/// The day's schedule, chronological (ties broken by operatory ascending),
/// with per-appointment flags and the summary lists the briefing renders.
#[derive(Debug, Clone)]
pub struct EnrichedSchedule {
    pub appointments: Vec<EnrichedAppointment>,
    pub birthdays: Vec<BirthdayPatient>,
    pub high_missed: Vec<MissedSummary>,
    pub new_patients: Vec<NewPatientSummary>,
    pub pressure: PressurePoints,
}

pub fn is_valid_birthdate(bd: NaiveDate) -> bool {
    bd.year() >= MIN_VALID_BIRTH_YEAR
}

/// Age on `today`, comparing (month, day) lexicographically. The leap-day
/// patient falls out of the comparison as written; no special case.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let not_yet = (today.month(), today.day()) < (birthdate.month(), birthdate.day());
    today.year() - birthdate.year() - i32::from(not_yet)
}

/// Per-appointment flags from the row itself and the patient's broken
/// history. Neighbor-dependent flags (gaps) are attached by
/// `enrich_schedule`, which sees the whole day.
pub fn derive_flags(apt: &AppointmentRow, missed_count: i64, today: NaiveDate) -> Vec<Flag> {
    let mut flags = Vec::new();
    if apt.is_new_patient {
        flags.push(Flag::NewPatient);
    }
    if missed_count >= HIGH_MISSED_THRESHOLD {
        flags.push(Flag::HighMissedCount(missed_count));
    }
    if let Some(bd) = apt.birthdate {
        if is_valid_birthdate(bd) && bd.month() == today.month() && bd.day() == today.day() {
            flags.push(Flag::Birthday);
        }
    }
    flags
}

fn provider_label(apt: &AppointmentRow) -> String {
    let full = format!(
        "{} {}",
        apt.prov_fname.as_deref().unwrap_or(""),
        apt.prov_lname.as_deref().unwrap_or("")
    )
    .trim()
    .to_string();
    match apt.prov_abbr.as_deref().filter(|a| !a.is_empty()) {
        Some(abbr) => abbr.to_string(),
        None if !full.is_empty() => full,
        None => format!("Prov {}", apt.prov_num),
    }
}

/// Gap and double-booking detection over one day's rows.
///
/// Appointment length is not reliably present in the source data, so each
/// appointment is treated as a point in time: the gap is `next.start -
/// current.start`, and "overlapping" degenerates to "identical start time".
pub fn detect_pressure_points(appointments: &[AppointmentRow]) -> PressurePoints {
    let mut pressure = PressurePoints::default();

    let mut by_provider: BTreeMap<i64, Vec<&AppointmentRow>> = BTreeMap::new();
    for apt in appointments {
        by_provider.entry(apt.prov_num).or_default().push(apt);
    }

    for (prov_num, mut apts) in by_provider {
        apts.sort_by_key(|a| a.apt_date_time);
        for pair in apts.windows(2) {
            let minutes = (pair[1].apt_date_time - pair[0].apt_date_time).num_minutes();
            let alert = GapAlert {
                prov_num,
                provider: provider_label(pair[0]),
                earlier: pair[0].apt_date_time,
                later: pair[1].apt_date_time,
                minutes,
            };
            if minutes > 0 && minutes < TIGHT_GAP_MINUTES {
                pressure.tight_gaps.push(alert);
            } else if minutes > LONG_GAP_MINUTES {
                pressure.long_gaps.push(alert);
            }
        }
    }

    let mut by_operatory: BTreeMap<(i64, NaiveDateTime), Vec<&AppointmentRow>> = BTreeMap::new();
    let mut by_prov_slot: BTreeMap<(i64, NaiveDateTime), Vec<&AppointmentRow>> = BTreeMap::new();
    for apt in appointments {
        by_operatory
            .entry((apt.operatory_num, apt.apt_date_time))
            .or_default()
            .push(apt);
        by_prov_slot
            .entry((apt.prov_num, apt.apt_date_time))
            .or_default()
            .push(apt);
    }
    for ((_, start), apts) in by_operatory {
        if apts.len() >= 2 {
            pressure.double_bookings.push(DoubleBooking {
                kind: BookingKind::Operatory,
                label: apts[0].room_display(),
                start,
                apt_nums: apts.iter().map(|a| a.apt_num).collect(),
            });
        }
    }
    for ((_, start), apts) in by_prov_slot {
        if apts.len() >= 2 {
            pressure.double_bookings.push(DoubleBooking {
                kind: BookingKind::Provider,
                label: provider_label(apts[0]),
                start,
                apt_nums: apts.iter().map(|a| a.apt_num).collect(),
            });
        }
    }

    pressure
}

pub fn enrich_schedule(data: &ScheduleData, today: NaiveDate) -> EnrichedSchedule {
    let mut rows = data.appointments.clone();
    rows.sort_by_key(|a| (a.apt_date_time, a.operatory_num));

    let pressure = detect_pressure_points(&rows);

    let mut appointments: Vec<EnrichedAppointment> = rows
        .into_iter()
        .map(|row| {
            let missed = data.broken_history.get(&row.pat_num).copied().unwrap_or(0);
            let flags = derive_flags(&row, missed, today);
            EnrichedAppointment { row, flags }
        })
        .collect();

    // Attach neighbor-derived flags now that gaps are known. A tight gap
    // marks the later appointment; a long gap marks the earlier one.
    for gap in &pressure.tight_gaps {
        for apt in appointments.iter_mut() {
            if apt.row.prov_num == gap.prov_num && apt.row.apt_date_time == gap.later {
                apt.flags.push(Flag::TightGapBefore);
            }
        }
    }
    for gap in &pressure.long_gaps {
        for apt in appointments.iter_mut() {
            if apt.row.prov_num == gap.prov_num && apt.row.apt_date_time == gap.earlier {
                apt.flags.push(Flag::ScheduleGapAfter(gap.minutes));
            }
        }
    }

    let mut birthdays = Vec::new();
    let mut new_patients = Vec::new();
    for apt in &appointments {
        if apt.has(&Flag::Birthday) {
            if let Some(bd) = apt.row.birthdate {
                birthdays.push(BirthdayPatient {
                    pat_num: apt.row.pat_num,
                    name: apt.row.patient_name(),
                    turning: age_on(bd, today),
                });
            }
        }
        if apt.has(&Flag::NewPatient) {
            new_patients.push(NewPatientSummary {
                name: apt.row.patient_name(),
                time: apt.row.apt_date_time,
            });
        }
    }

    let mut high_missed: Vec<MissedSummary> = data
        .broken_history
        .iter()
        .filter(|&(_, &count)| count >= HIGH_MISSED_THRESHOLD)
        .map(|(&pat_num, &count)| {
            let name = appointments
                .iter()
                .find(|a| a.row.pat_num == pat_num)
                .map(|a| a.row.patient_name())
                .unwrap_or_else(|| format!("Patient {pat_num}"));
            MissedSummary {
                pat_num,
                name,
                count,
            }
        })
        .collect();
    high_missed.sort_by(|a, b| b.count.cmp(&a.count).then(a.pat_num.cmp(&b.pat_num)));

    EnrichedSchedule {
        appointments,
        birthdays,
        high_missed,
        new_patients,
        pressure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AptStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn apt(apt_num: i64, pat_num: i64, prov_num: i64, op: i64, hour: u32, min: u32) -> AppointmentRow {
        AppointmentRow {
            apt_num,
            apt_date_time: date(2025, 3, 14).and_hms_opt(hour, min, 0).unwrap(),
            pat_num,
            prov_num,
            status: AptStatus::Scheduled,
            proc_descript: Some("Ex, Pro".into()),
            is_new_patient: false,
            note: None,
            clinic_num: 0,
            operatory_num: op,
            pat_fname: Some("Pat".into()),
            pat_lname: Some(format!("Lname{pat_num}")),
            hm_phone: Some("(555) 555-1234".into()),
            wireless_phone: None,
            birthdate: Some(date(1985, 6, 1)),
            email: None,
            prov_fname: Some("Sam".into()),
            prov_lname: Some("Ortiz".into()),
            prov_abbr: Some("SO".into()),
            operatory_name: Some(format!("Op {op}")),
        }
    }

    fn schedule(rows: Vec<AppointmentRow>, broken: &[(i64, i64)]) -> ScheduleData {
        ScheduleData {
            appointments: rows,
            broken_history: broken.iter().copied().collect(),
        }
    }

    #[test]
    fn sentinel_birthdate_never_flags_birthday() {
        let mut a = apt(1, 10, 1, 1, 9, 0);
        a.birthdate = Some(date(1, 1, 1));
        let flags = derive_flags(&a, 0, date(2025, 1, 1));
        assert!(!flags.contains(&Flag::Birthday));
    }

    #[test]
    fn birthday_flag_and_age() {
        let mut a = apt(1, 10, 1, 1, 9, 0);
        a.birthdate = Some(date(1985, 3, 14));
        let today = date(2025, 3, 14);
        let flags = derive_flags(&a, 0, today);
        assert!(flags.contains(&Flag::Birthday));
        assert_eq!(age_on(date(1985, 3, 14), today), 40);
    }

    #[test]
    fn age_before_and_after_birthday() {
        assert_eq!(age_on(date(1990, 6, 15), date(2025, 6, 14)), 34);
        assert_eq!(age_on(date(1990, 6, 15), date(2025, 6, 15)), 35);
    }

    #[test]
    fn leap_day_age_uses_plain_comparison() {
        // (2, 29) > (2, 28) and < (3, 1): the birthday "happens" on Mar 1
        // in non-leap years under the lexicographic rule.
        assert_eq!(age_on(date(2000, 2, 29), date(2025, 2, 28)), 24);
        assert_eq!(age_on(date(2000, 2, 29), date(2025, 3, 1)), 25);
    }

    #[test]
    fn new_patient_trusts_upstream_flag_only() {
        let a = apt(1, 10, 1, 1, 9, 0);
        assert!(!derive_flags(&a, 0, date(2025, 1, 1)).contains(&Flag::NewPatient));

        let mut b = apt(2, 11, 1, 1, 10, 0);
        b.is_new_patient = true;
        assert!(derive_flags(&b, 0, date(2025, 1, 1)).contains(&Flag::NewPatient));
    }

    #[test]
    fn high_missed_boundary_is_two() {
        let a = apt(1, 10, 1, 1, 9, 0);
        let today = date(2025, 1, 1);
        assert!(!derive_flags(&a, 1, today)
            .iter()
            .any(|f| matches!(f, Flag::HighMissedCount(_))));
        assert!(derive_flags(&a, 2, today).contains(&Flag::HighMissedCount(2)));
    }

    #[test]
    fn five_minute_gap_is_tight() {
        let rows = vec![apt(1, 10, 1, 1, 9, 0), apt(2, 11, 1, 2, 9, 5)];
        let pressure = detect_pressure_points(&rows);
        assert_eq!(pressure.tight_gaps.len(), 1);
        assert!(pressure.long_gaps.is_empty());
        assert_eq!(pressure.tight_gaps[0].minutes, 5);
    }

    #[test]
    fn forty_five_minute_gap_is_long() {
        let rows = vec![apt(1, 10, 1, 1, 9, 0), apt(2, 11, 1, 2, 9, 45)];
        let pressure = detect_pressure_points(&rows);
        assert!(pressure.tight_gaps.is_empty());
        assert_eq!(pressure.long_gaps.len(), 1);
        assert_eq!(pressure.long_gaps[0].minutes, 45);
    }

    #[test]
    fn gaps_are_per_provider() {
        let rows = vec![apt(1, 10, 1, 1, 9, 0), apt(2, 11, 2, 2, 9, 5)];
        let pressure = detect_pressure_points(&rows);
        assert!(pressure.tight_gaps.is_empty());
    }

    #[test]
    fn identical_start_same_room_is_double_booked_not_tight() {
        let mut second = apt(2, 11, 2, 1, 9, 0);
        second.prov_num = 2;
        let rows = vec![apt(1, 10, 1, 1, 9, 0), second];
        let pressure = detect_pressure_points(&rows);
        assert!(pressure.tight_gaps.is_empty());
        assert_eq!(pressure.double_bookings.len(), 1);
        assert_eq!(pressure.double_bookings[0].kind, BookingKind::Operatory);
        assert_eq!(pressure.double_bookings[0].apt_nums, vec![1, 2]);
    }

    #[test]
    fn identical_start_same_provider_is_double_booked() {
        let rows = vec![apt(1, 10, 1, 1, 9, 0), apt(2, 11, 1, 2, 9, 0)];
        let pressure = detect_pressure_points(&rows);
        assert_eq!(pressure.double_bookings.len(), 1);
        assert_eq!(pressure.double_bookings[0].kind, BookingKind::Provider);
    }

    #[test]
    fn enrich_attaches_gap_flags_to_the_right_rows() {
        let data = schedule(vec![apt(1, 10, 1, 1, 9, 0), apt(2, 11, 1, 2, 9, 5)], &[]);
        let enriched = enrich_schedule(&data, date(2025, 3, 14));
        assert!(!enriched.appointments[0].has(&Flag::TightGapBefore));
        assert!(enriched.appointments[1].has(&Flag::TightGapBefore));
    }

    #[test]
    fn enrich_sorts_and_summarizes() {
        let mut early = apt(2, 11, 1, 5, 8, 30);
        early.is_new_patient = true;
        let late = apt(1, 10, 1, 1, 10, 0);
        let data = schedule(vec![late, early], &[(10, 3), (11, 1)]);
        let enriched = enrich_schedule(&data, date(2025, 3, 14));

        assert_eq!(enriched.appointments[0].row.apt_num, 2);
        assert_eq!(enriched.new_patients.len(), 1);
        assert_eq!(enriched.high_missed.len(), 1);
        assert_eq!(enriched.high_missed[0].pat_num, 10);
        assert_eq!(enriched.high_missed[0].count, 3);
    }

    #[test]
    fn high_missed_sorted_by_count_descending() {
        let data = schedule(
            vec![apt(1, 10, 1, 1, 9, 0), apt(2, 11, 1, 2, 10, 0)],
            &[(10, 2), (11, 5)],
        );
        let enriched = enrich_schedule(&data, date(2025, 3, 14));
        assert_eq!(enriched.high_missed[0].pat_num, 11);
        assert_eq!(enriched.high_missed[1].pat_num, 10);
    }
}
