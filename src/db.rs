// src/db.rs
//
// MySQL access to the practice-management database. All query text uses the
// source system's schema (appointment / patient / provider / operatory /
// document). Rows decode into typed structs at this boundary; nothing
// downstream touches raw rows.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Row;

use crate::config::DbConfig;
use crate::error::DataError;
use crate::models::{AppointmentRow, ScheduleData};

const APPOINTMENTS_FOR_DATE: &str = r#"
    SELECT
        a.AptNum        AS apt_num,
        a.AptDateTime   AS apt_date_time,
        a.PatNum        AS pat_num,
        a.ProvNum       AS prov_num,
        a.AptStatus     AS status,
        a.ProcDescript  AS proc_descript,
        a.IsNewPatient  AS is_new_patient,
        a.Note          AS note,
        a.ClinicNum     AS clinic_num,
        a.Op            AS operatory_num,
        p.FName         AS pat_fname,
        p.LName         AS pat_lname,
        p.HmPhone       AS hm_phone,
        p.WirelessPhone AS wireless_phone,
        p.Birthdate     AS birthdate,
        p.Email         AS email,
        pr.FName        AS prov_fname,
        pr.LName        AS prov_lname,
        pr.Abbr         AS prov_abbr,
        o.OpName        AS operatory_name
    FROM       appointment a
    LEFT JOIN  patient    p  ON a.PatNum  = p.PatNum
    LEFT JOIN  provider   pr ON a.ProvNum = pr.ProvNum
    LEFT JOIN  operatory  o  ON a.Op      = o.OperatoryNum
    WHERE DATE(a.AptDateTime) = ?
      AND a.AptStatus = 1
    ORDER BY a.AptDateTime ASC, a.Op ASC
"#;

pub async fn connect(cfg: &DbConfig) -> Result<MySqlPool, DataError> {
    let opts = MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name);

    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(opts)
        .await
        .map_err(DataError::Connect)?;

    tracing::info!(
        "MySQL connection established: {}@{}/{}",
        cfg.user,
        cfg.host,
        cfg.name
    );
    Ok(pool)
}

/// Scheduled appointments for a date plus the broken-appointment counts for
/// that day's patients. New-patient detection uses appointment.IsNewPatient
/// directly; the flag is authoritative, so no first-visit subquery.
pub async fn fetch_day_schedule(
    pool: &MySqlPool,
    date: NaiveDate,
) -> Result<ScheduleData, DataError> {
    let appointments: Vec<AppointmentRow> = sqlx::query_as(APPOINTMENTS_FOR_DATE)
        .bind(date)
        .fetch_all(pool)
        .await?;
    tracing::info!("Fetched {} appointments for {}", appointments.len(), date);

    let patient_ids: Vec<i64> = appointments.iter().map(|a| a.pat_num).collect();
    let broken_history = fetch_broken_history(pool, &patient_ids).await?;

    Ok(ScheduleData {
        appointments,
        broken_history,
    })
}

/// PatNum -> count of Broken (status 5) rows, for the given patients only.
/// Patients with no history are simply absent from the map.
async fn fetch_broken_history(
    pool: &MySqlPool,
    patient_ids: &[i64],
) -> Result<BTreeMap<i64, i64>, DataError> {
    if patient_ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    let placeholders = vec!["?"; patient_ids.len()].join(",");
    let sql = format!(
        "SELECT PatNum, COUNT(*) AS missed_count \
         FROM appointment \
         WHERE AptStatus = 5 AND PatNum IN ({placeholders}) \
         GROUP BY PatNum"
    );
    let mut query = sqlx::query(&sql);
    for id in patient_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;
    rows.into_iter()
        .map(|r| Ok((r.try_get("PatNum")?, r.try_get("missed_count")?)))
        .collect()
}

/// PatNum -> most recent completed visit strictly before today.
pub async fn fetch_last_visits(
    pool: &MySqlPool,
    patient_ids: &[i64],
) -> Result<BTreeMap<i64, NaiveDateTime>, DataError> {
    if patient_ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    let placeholders = vec!["?"; patient_ids.len()].join(",");
    let sql = format!(
        "SELECT PatNum, MAX(AptDateTime) AS last_date \
         FROM appointment \
         WHERE PatNum IN ({placeholders}) \
           AND AptStatus = 2 \
           AND DATE(AptDateTime) < CURDATE() \
         GROUP BY PatNum"
    );
    let mut query = sqlx::query(&sql);
    for id in patient_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;
    let mut visits = BTreeMap::new();
    for row in rows {
        let pat_num: i64 = row.try_get("PatNum")?;
        let last_date: Option<NaiveDateTime> = row.try_get("last_date")?;
        if let Some(dt) = last_date {
            visits.insert(pat_num, dt);
        }
    }
    Ok(visits)
}

/// FileName of the most recent patient-photo document, if any.
/// DocCategory 182/190 are the photo categories in the source system.
pub async fn fetch_patient_photo_file(
    pool: &MySqlPool,
    pat_num: i64,
) -> Result<Option<String>, DataError> {
    let row = sqlx::query(
        "SELECT FileName \
         FROM document \
         WHERE PatNum = ? AND DocCategory IN (182, 190) \
         ORDER BY DocNum DESC \
         LIMIT 1",
    )
    .bind(pat_num)
    .fetch_optional(pool)
    .await?;
    match row {
        Some(r) => Ok(Some(r.try_get("FileName")?)),
        None => Ok(None),
    }
}

/// "YYYY-MM-DD" -> scheduled-appointment count, for every day of the month
/// that has at least one scheduled appointment.
pub async fn fetch_month_counts(
    pool: &MySqlPool,
    year: i32,
    month: u32,
) -> Result<BTreeMap<String, i64>, DataError> {
    let rows = sqlx::query(
        "SELECT DATE(AptDateTime) AS day, COUNT(*) AS cnt \
         FROM appointment \
         WHERE YEAR(AptDateTime) = ? AND MONTH(AptDateTime) = ? AND AptStatus = 1 \
         GROUP BY day",
    )
    .bind(year)
    .bind(month)
    .fetch_all(pool)
    .await?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let day: NaiveDate = row.try_get("day")?;
        let cnt: i64 = row.try_get("cnt")?;
        counts.insert(day.to_string(), cnt);
    }
    Ok(counts)
}
