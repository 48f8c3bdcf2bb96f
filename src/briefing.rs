// src/briefing.rs
//
// Turns an enriched schedule into the deterministic plain-text block handed
// to the narration model, and persists generated briefings to dated files.
// Same input and date always produce byte-identical text.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::enrich::{EnrichedSchedule, Flag};
use crate::models::AppointmentRow;

pub const SYSTEM_PROMPT: &str = "\
You are a helpful AI morning briefing assistant for a dental practice's front desk team.
Your job is to analyse today's appointment schedule and deliver a warm, professional,
and well-organised briefing that helps staff start the day prepared and confident.

Structure your briefing in this exact order:

1. GOOD MORNING  - Warm opening with today's date, total appointment count, which
   providers are working, and any headline items worth calling out immediately.

2. SCHEDULE  - Every appointment listed chronologically.  For each one include:
   time | patient name | procedure | room | provider | best contact number.

3. NOTES & FLAGS  - Actionable intelligence for the team:
   - Patients with a birthday today: suggest a warm acknowledgement at check-in.
   - Patients with 2 or more broken/missed appointments: recommend a same-day
     confirmation call before the appointment.
   - New patients (first visit): remind staff to have intake forms ready and give
     an especially warm welcome experience.
   - Tight back-to-back gaps (< 10 min) for the same provider: flag as potential
     scheduling pressure points.
   - Schedule gaps longer than 30 min: note as potential fill-in opportunities.
   - Double-booked rooms or providers: flag immediately for resolution.

4. CLOSING  - A brief, encouraging sign-off for the team.

Tone rules:
- Address staff directly (\"you\", \"your team\") - warm but professional.
- Use clear headings and bullet points so staff can scan in under 2 minutes.
- If there are NO appointments today, deliver a brief upbeat message about the quiet day.
- Do NOT invent information that was not provided.
";

fn fmt_time(dt: NaiveDateTime) -> String {
    dt.format("%I:%M %p").to_string().trim_start_matches('0').to_string()
}

fn long_date(d: NaiveDate) -> String {
    d.format("%A, %B %d, %Y").to_string()
}

fn provider_full(apt: &AppointmentRow) -> String {
    let fname = apt.prov_fname.as_deref().unwrap_or("");
    let lname = apt.prov_lname.as_deref().unwrap_or("");
    let abbr = match apt.prov_abbr.as_deref().filter(|a| !a.is_empty()) {
        Some(a) => a.to_string(),
        None => format!("{fname} {lname}").trim().to_string(),
    };
    format!("Dr. {fname} {lname} ({abbr})")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn flag_text(flag: &Flag) -> String {
    match flag {
        Flag::NewPatient => "NEW PATIENT".to_string(),
        Flag::Birthday => "BIRTHDAY TODAY".to_string(),
        Flag::HighMissedCount(n) => format!("{n} broken appointments on record"),
        Flag::TightGapBefore => "TIGHT GAP BEFORE".to_string(),
        Flag::ScheduleGapAfter(m) => format!("{m} min open after"),
    }
}

/// The structured plain-text block the narration model reasons over: header,
/// chronological appointment list, then summary sections that are omitted
/// entirely when empty.
pub fn format_for_narration(schedule: &EnrichedSchedule, today: NaiveDate) -> String {
    let mut lines: Vec<String> = vec![
        format!("DATE: {}", long_date(today)),
        format!(
            "TOTAL SCHEDULED APPOINTMENTS: {}",
            schedule.appointments.len()
        ),
        String::new(),
    ];

    if schedule.appointments.is_empty() {
        lines.push("No appointments are scheduled for today.".to_string());
        return lines.join("\n");
    }

    lines.push("APPOINTMENTS (chronological):".to_string());
    lines.push(String::new());

    for (idx, apt) in schedule.appointments.iter().enumerate() {
        let row = &apt.row;
        let procedure = row
            .proc_descript
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("Not specified");
        let phone = row.best_phone().unwrap_or("no phone on file");

        lines.push(format!(
            "{}. {} | {} | {}",
            idx + 1,
            fmt_time(row.apt_date_time),
            provider_full(row),
            row.room_display()
        ));
        lines.push(format!("   Patient  : {}", row.patient_name()));
        lines.push(format!("   Procedure: {procedure}"));
        lines.push(format!("   Phone    : {phone}"));
        if !apt.flags.is_empty() {
            let rendered: Vec<String> = apt.flags.iter().map(flag_text).collect();
            lines.push(format!("   Flags    : {}", rendered.join(" | ")));
        }
        lines.push(String::new());
    }

    if !schedule.birthdays.is_empty() {
        lines.push("BIRTHDAY PATIENTS TODAY:".to_string());
        for b in &schedule.birthdays {
            lines.push(format!("  - {} (turning {})", b.name, b.turning));
        }
        lines.push(String::new());
    }

    if !schedule.high_missed.is_empty() {
        lines.push("PATIENTS WITH BROKEN APPOINTMENT HISTORY (2+ missed):".to_string());
        for m in &schedule.high_missed {
            lines.push(format!("  - {}: {} broken/missed appointments", m.name, m.count));
        }
        lines.push(String::new());
    }

    if !schedule.new_patients.is_empty() {
        lines.push("NEW PATIENTS TODAY (first visit):".to_string());
        for n in &schedule.new_patients {
            lines.push(format!("  - {} at {}", n.name, fmt_time(n.time)));
        }
        lines.push(String::new());
    }

    if !schedule.pressure.is_empty() {
        lines.push("SCHEDULING PRESSURE POINTS:".to_string());
        for g in &schedule.pressure.tight_gaps {
            lines.push(format!(
                "  - {}: only {} min between {} and {}",
                g.provider,
                g.minutes,
                fmt_time(g.earlier),
                fmt_time(g.later)
            ));
        }
        for g in &schedule.pressure.long_gaps {
            lines.push(format!(
                "  - {}: {} min open after {}",
                g.provider,
                g.minutes,
                fmt_time(g.earlier)
            ));
        }
        for d in &schedule.pressure.double_bookings {
            lines.push(format!(
                "  - {} double-booked at {} ({} appointments)",
                d.label,
                fmt_time(d.start),
                d.apt_nums.len()
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// One dated text file per briefing: a fixed two-line header, then the
/// narration body. Written once; an existing file for the date is replaced,
/// never appended.
pub fn save_briefing(dir: &Path, date: NaiveDate, text: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{date}.txt"));
    let header = format!(
        "Daily Dental Briefing - {} (generated {})\n{}\n\n",
        date,
        Local::now().format("%H:%M:%S"),
        "=".repeat(60)
    );
    std::fs::write(&path, format!("{header}{text}"))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich_schedule;
    use crate::models::{AptStatus, ScheduleData};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn apt(apt_num: i64, pat_num: i64, hour: u32, min: u32) -> AppointmentRow {
        AppointmentRow {
            apt_num,
            apt_date_time: date(2025, 3, 14).and_hms_opt(hour, min, 0).unwrap(),
            pat_num,
            prov_num: 1,
            status: AptStatus::Scheduled,
            proc_descript: Some("Ex, Pro".into()),
            is_new_patient: false,
            note: None,
            clinic_num: 0,
            operatory_num: 1,
            pat_fname: Some("Maria".into()),
            pat_lname: Some("Santos".into()),
            hm_phone: Some("(555) 555-1234".into()),
            wireless_phone: None,
            birthdate: Some(date(1985, 3, 14)),
            email: None,
            prov_fname: Some("Sam".into()),
            prov_lname: Some("Ortiz".into()),
            prov_abbr: Some("SO".into()),
            operatory_name: Some("Op 1".into()),
        }
    }

    fn enriched(rows: Vec<AppointmentRow>, broken: &[(i64, i64)]) -> EnrichedSchedule {
        let data = ScheduleData {
            appointments: rows,
            broken_history: broken.iter().copied().collect::<BTreeMap<_, _>>(),
        };
        enrich_schedule(&data, date(2025, 3, 14))
    }

    #[test]
    fn empty_schedule_says_so() {
        let text = format_for_narration(&enriched(vec![], &[]), date(2025, 3, 14));
        assert!(text.contains("TOTAL SCHEDULED APPOINTMENTS: 0"));
        assert!(text.contains("No appointments are scheduled for today."));
        assert!(!text.contains("APPOINTMENTS (chronological):"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let schedule = enriched(vec![apt(1, 10, 9, 0), apt(2, 11, 10, 0)], &[(10, 3)]);
        let a = format_for_narration(&schedule, date(2025, 3, 14));
        let b = format_for_narration(&schedule, date(2025, 3, 14));
        assert_eq!(a, b);
    }

    #[test]
    fn appointment_lines_carry_core_fields() {
        let text = format_for_narration(&enriched(vec![apt(1, 10, 9, 5)], &[]), date(2025, 3, 14));
        assert!(text.contains("1. 9:05 AM | Dr. Sam Ortiz (SO) | Op 1"));
        assert!(text.contains("   Patient  : Maria Santos"));
        assert!(text.contains("   Procedure: Ex, Pro"));
        assert!(text.contains("   Phone    : (555) 555-1234"));
    }

    #[test]
    fn summary_sections_appear_only_when_populated() {
        // Patient born 1985-03-14, "today" 2025-03-14: birthday, turning 40.
        let text = format_for_narration(&enriched(vec![apt(1, 10, 9, 0)], &[]), date(2025, 3, 14));
        assert!(text.contains("BIRTHDAY PATIENTS TODAY:"));
        assert!(text.contains("  - Maria Santos (turning 40)"));
        assert!(!text.contains("PATIENTS WITH BROKEN APPOINTMENT HISTORY"));
        assert!(!text.contains("NEW PATIENTS TODAY"));
        assert!(!text.contains("SCHEDULING PRESSURE POINTS:"));
    }

    #[test]
    fn missed_history_section_lists_counts() {
        let text =
            format_for_narration(&enriched(vec![apt(1, 10, 9, 0)], &[(10, 3)]), date(2025, 3, 14));
        assert!(text.contains("PATIENTS WITH BROKEN APPOINTMENT HISTORY (2+ missed):"));
        assert!(text.contains("  - Maria Santos: 3 broken/missed appointments"));
        assert!(text.contains("3 broken appointments on record"));
    }

    #[test]
    fn pressure_section_renders_tight_gap() {
        let text = format_for_narration(
            &enriched(vec![apt(1, 10, 9, 0), apt(2, 11, 9, 5)], &[]),
            date(2025, 3, 14),
        );
        assert!(text.contains("SCHEDULING PRESSURE POINTS:"));
        assert!(text.contains("  - SO: only 5 min between 9:00 AM and 9:05 AM"));
    }

    #[test]
    fn saved_briefing_has_header_then_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_briefing(dir.path(), date(2025, 3, 14), "Good morning team.").unwrap();
        assert_eq!(path.file_name().unwrap(), "2025-03-14.txt");
        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert!(lines.next().unwrap().starts_with("Daily Dental Briefing - 2025-03-14"));
        assert_eq!(lines.next().unwrap(), "=".repeat(60));
        assert!(written.ends_with("Good morning team."));
    }
}
