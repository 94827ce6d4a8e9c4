use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection};

use crate::errors::AppError;
use crate::models::{
    Actor, AvailabilityWindow, Booking, BookingStatus, BoundaryRule, Cancellation,
    CancellationPolicy, FeeRate, FeeTier, Lifecycle, NoShowConfig, Professional, Service,
};

use super::store::StatusChange;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

const BOOKING_COLUMNS: &str = "b.id, b.client_id, b.professional_id, b.service_id, b.scheduled_at, \
     b.duration_minutes, b.price_cents, b.policy_version_id, b.status, b.cancelled_at, \
     b.cancellation_reason, b.cancelled_by, b.cancellation_fee_cents, b.no_show_fee_cents, \
     b.no_show_detected_at, b.created_at, b.updated_at";

const POLICY_COLUMNS: &str = "cp.id, cp.salon_id, cp.version, cp.tiers, cp.boundary, cp.after_start, cp.created_at";

pub fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, AppError> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::Storage(format!("malformed timestamp: {s}")))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_lifecycle(s: &str) -> Result<Lifecycle, AppError> {
    Lifecycle::parse(s).ok_or_else(|| AppError::Storage(format!("unknown lifecycle: {s}")))
}

/// Renders statuses as a quoted SQL list. Values come from the closed enum, so
/// inlining them is safe.
fn status_list(statuses: &[BookingStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn active_status_clause() -> String {
    format!("b.status IN ({})", status_list(&BookingStatus::ACTIVE))
}

// ── Professionals & Services ──

pub fn save_professional(conn: &Connection, professional: &Professional) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO professionals (id, salon_id, name, timezone, lifecycle)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           salon_id = excluded.salon_id,
           name = excluded.name,
           timezone = excluded.timezone,
           lifecycle = excluded.lifecycle",
        params![
            professional.id,
            professional.salon_id,
            professional.name,
            professional.timezone.name(),
            professional.lifecycle.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_professional(conn: &Connection, id: &str) -> Result<Option<Professional>, AppError> {
    let result = conn.query_row(
        "SELECT id, salon_id, name, timezone, lifecycle FROM professionals WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match result {
        Ok((id, salon_id, name, timezone, lifecycle)) => {
            let timezone: Tz = timezone
                .parse()
                .map_err(|_| AppError::Storage(format!("unknown timezone: {timezone}")))?;
            Ok(Some(Professional {
                id,
                salon_id,
                name,
                timezone,
                lifecycle: parse_lifecycle(&lifecycle)?,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_service(conn: &Connection, service: &Service) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO services (id, salon_id, name, duration_minutes, price_cents, lifecycle)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           salon_id = excluded.salon_id,
           name = excluded.name,
           duration_minutes = excluded.duration_minutes,
           price_cents = excluded.price_cents,
           lifecycle = excluded.lifecycle",
        params![
            service.id,
            service.salon_id,
            service.name,
            service.duration_minutes,
            service.price_cents,
            service.lifecycle.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Option<Service>, AppError> {
    let result = conn.query_row(
        "SELECT id, salon_id, name, duration_minutes, price_cents, lifecycle FROM services WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );

    match result {
        Ok((id, salon_id, name, duration_minutes, price_cents, lifecycle)) => Ok(Some(Service {
            id,
            salon_id,
            name,
            duration_minutes,
            price_cents,
            lifecycle: parse_lifecycle(&lifecycle)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Availability ──

pub fn save_window(conn: &Connection, window: &AvailabilityWindow) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO availability_windows (id, professional_id, weekday, start_time, end_time, slot_minutes, lifecycle)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           weekday = excluded.weekday,
           start_time = excluded.start_time,
           end_time = excluded.end_time,
           slot_minutes = excluded.slot_minutes,
           lifecycle = excluded.lifecycle",
        params![
            window.id,
            window.professional_id,
            window.weekday,
            window.start_time.format(TIME_FORMAT).to_string(),
            window.end_time.format(TIME_FORMAT).to_string(),
            window.slot_minutes,
            window.lifecycle.as_str(),
        ],
    )?;
    Ok(())
}

pub fn set_window_lifecycle(
    conn: &Connection,
    id: &str,
    lifecycle: Lifecycle,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE availability_windows SET lifecycle = ?1 WHERE id = ?2",
        params![lifecycle.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn get_active_windows(
    conn: &Connection,
    professional_id: &str,
    weekday: u8,
) -> Result<Vec<AvailabilityWindow>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, professional_id, weekday, start_time, end_time, slot_minutes, lifecycle
         FROM availability_windows
         WHERE professional_id = ?1 AND weekday = ?2 AND lifecycle = 'active'
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(params![professional_id, weekday], |row| {
        Ok(parse_window_row(row))
    })?;

    let mut windows = vec![];
    for row in rows {
        windows.push(row??);
    }
    Ok(windows)
}

fn parse_window_row(row: &rusqlite::Row) -> Result<AvailabilityWindow, AppError> {
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let lifecycle: String = row.get(6)?;

    let parse_time = |s: &str| {
        NaiveTime::parse_from_str(s, TIME_FORMAT)
            .map_err(|_| AppError::Storage(format!("malformed time of day: {s}")))
    };

    Ok(AvailabilityWindow {
        id: row.get(0)?,
        professional_id: row.get(1)?,
        weekday: row.get(2)?,
        start_time: parse_time(&start_str)?,
        end_time: parse_time(&end_str)?,
        slot_minutes: row.get(5)?,
        lifecycle: parse_lifecycle(&lifecycle)?,
    })
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    let cancellation = booking.cancellation.as_ref();
    conn.execute(
        "INSERT INTO bookings (id, client_id, professional_id, service_id, scheduled_at, ends_at,
            duration_minutes, price_cents, policy_version_id, status, cancelled_at,
            cancellation_reason, cancelled_by, cancellation_fee_cents, no_show_fee_cents,
            no_show_detected_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            booking.id,
            booking.client_id,
            booking.professional_id,
            booking.service_id,
            fmt_ts(&booking.scheduled_at),
            fmt_ts(&booking.ends_at()),
            booking.duration_minutes,
            booking.price_cents,
            booking.policy_version_id,
            booking.status.as_str(),
            cancellation.map(|c| fmt_ts(&c.cancelled_at)),
            cancellation.and_then(|c| c.reason.clone()),
            cancellation.map(|c| c.cancelled_by.as_str()),
            cancellation.map(|c| c.fee_cents),
            booking.no_show_fee_cents,
            booking.no_show_detected_at.as_ref().map(fmt_ts),
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Active bookings of a professional overlapping `[from, to)`, optionally
/// leaving one booking out.
pub fn get_active_bookings_overlapping(
    conn: &Connection,
    professional_id: &str,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Result<Vec<Booking>, AppError> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.professional_id = ?1 AND {}
           AND b.scheduled_at < ?3 AND b.ends_at > ?2
           AND (?4 IS NULL OR b.id != ?4)
         ORDER BY b.scheduled_at ASC",
        active_status_clause()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![professional_id, fmt_ts(from), fmt_ts(to), exclude_id],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_schedule(
    conn: &Connection,
    id: &str,
    new_start: &DateTime<Utc>,
    new_end: &DateTime<Utc>,
    from: &[BookingStatus],
    at: &DateTime<Utc>,
) -> Result<usize, AppError> {
    if from.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE bookings SET scheduled_at = ?1, ends_at = ?2, updated_at = ?3
         WHERE id = ?4 AND status IN ({})",
        status_list(from)
    );
    let count = conn.execute(
        &sql,
        params![fmt_ts(new_start), fmt_ts(new_end), fmt_ts(at), id],
    )?;
    Ok(count)
}

/// Conditional status update; returns the number of rows changed (0 or 1).
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    from: &[BookingStatus],
    to: BookingStatus,
    change: &StatusChange,
) -> Result<usize, AppError> {
    if from.is_empty() {
        return Ok(0);
    }
    let cancellation = change.cancellation.as_ref();
    let no_show_at = (to == BookingStatus::NoShow).then(|| fmt_ts(&change.at));

    let sql = format!(
        "UPDATE bookings SET
           status = ?1,
           updated_at = ?2,
           cancelled_at = COALESCE(?3, cancelled_at),
           cancellation_reason = COALESCE(?4, cancellation_reason),
           cancelled_by = COALESCE(?5, cancelled_by),
           cancellation_fee_cents = COALESCE(?6, cancellation_fee_cents),
           no_show_fee_cents = COALESCE(?7, no_show_fee_cents),
           no_show_detected_at = COALESCE(?8, no_show_detected_at)
         WHERE id = ?9 AND status IN ({})",
        status_list(from)
    );

    let count = conn.execute(
        &sql,
        params![
            to.as_str(),
            fmt_ts(&change.at),
            cancellation.map(|c| fmt_ts(&c.cancelled_at)),
            cancellation.and_then(|c| c.reason.clone()),
            cancellation.map(|c| c.cancelled_by.as_str()),
            cancellation.map(|c| c.fee_cents),
            change.no_show_fee_cents,
            no_show_at,
            id,
        ],
    )?;
    Ok(count)
}

pub fn get_no_show_candidates(
    conn: &Connection,
    config: &NoShowConfig,
    ended_by: &DateTime<Utc>,
) -> Result<Vec<Booking>, AppError> {
    let (sql, scope) = match &config.professional_id {
        Some(professional_id) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings b
                 WHERE b.professional_id = ?1 AND {} AND b.ends_at <= ?2
                 ORDER BY b.scheduled_at ASC",
                active_status_clause()
            ),
            professional_id.as_str(),
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings b
                 JOIN professionals p ON p.id = b.professional_id
                 WHERE p.salon_id = ?1 AND {} AND b.ends_at <= ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM no_show_configs c WHERE c.professional_id = b.professional_id
                   )
                 ORDER BY b.scheduled_at ASC",
                active_status_clause()
            ),
            config.salon_id.as_str(),
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![scope, fmt_ts(ended_by)], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> Result<Booking, AppError> {
    let scheduled_at: String = row.get(4)?;
    let status_str: String = row.get(8)?;
    let cancelled_at: Option<String> = row.get(9)?;
    let cancellation_reason: Option<String> = row.get(10)?;
    let cancelled_by: Option<String> = row.get(11)?;
    let cancellation_fee_cents: Option<i64> = row.get(12)?;
    let no_show_detected_at: Option<String> = row.get(14)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| AppError::Storage(format!("unknown booking status: {status_str}")))?;

    let cancellation = match (parse_opt_ts(cancelled_at)?, cancelled_by) {
        (Some(cancelled_at), Some(actor)) => Some(Cancellation {
            cancelled_at,
            reason: cancellation_reason,
            cancelled_by: Actor::parse(&actor)
                .ok_or_else(|| AppError::Storage(format!("unknown actor: {actor}")))?,
            fee_cents: cancellation_fee_cents.unwrap_or(0),
        }),
        _ => None,
    };

    Ok(Booking {
        id: row.get(0)?,
        client_id: row.get(1)?,
        professional_id: row.get(2)?,
        service_id: row.get(3)?,
        scheduled_at: parse_ts(&scheduled_at)?,
        duration_minutes: row.get(5)?,
        price_cents: row.get(6)?,
        policy_version_id: row.get(7)?,
        status,
        cancellation,
        no_show_fee_cents: row.get(13)?,
        no_show_detected_at: parse_opt_ts(no_show_detected_at)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Cancellation Policies ──

pub fn get_current_policy(
    conn: &Connection,
    salon_id: &str,
) -> Result<Option<CancellationPolicy>, AppError> {
    let result = conn.query_row(
        &format!(
            "SELECT {POLICY_COLUMNS} FROM cancellation_policies cp
             WHERE cp.salon_id = ?1 ORDER BY cp.version DESC LIMIT 1"
        ),
        params![salon_id],
        |row| Ok(parse_policy_row(row)),
    );

    match result {
        Ok(policy) => Ok(Some(policy?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_policy_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> Result<Option<CancellationPolicy>, AppError> {
    let result = conn.query_row(
        &format!(
            "SELECT {POLICY_COLUMNS} FROM bookings b
             JOIN cancellation_policies cp ON cp.id = b.policy_version_id
             WHERE b.id = ?1"
        ),
        params![booking_id],
        |row| Ok(parse_policy_row(row)),
    );

    match result {
        Ok(policy) => Ok(Some(policy?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_latest_policy_version(conn: &Connection, salon_id: &str) -> Result<u32, AppError> {
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM cancellation_policies WHERE salon_id = ?1",
        params![salon_id],
        |row| row.get(0),
    )?;
    Ok(version)
}

pub fn insert_policy(conn: &Connection, policy: &CancellationPolicy) -> Result<(), AppError> {
    let tiers = serde_json::to_string(&policy.tiers)
        .map_err(|e| AppError::Storage(format!("failed to encode tiers: {e}")))?;
    let after_start = policy
        .after_start
        .map(|rate| serde_json::to_string(&rate))
        .transpose()
        .map_err(|e| AppError::Storage(format!("failed to encode after-start fee: {e}")))?;

    conn.execute(
        "INSERT INTO cancellation_policies (id, salon_id, version, tiers, boundary, after_start, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            policy.id,
            policy.salon_id,
            policy.version,
            tiers,
            policy.boundary.as_str(),
            after_start,
            fmt_ts(&policy.created_at),
        ],
    )?;
    Ok(())
}

fn parse_policy_row(row: &rusqlite::Row) -> Result<CancellationPolicy, AppError> {
    let tiers_json: String = row.get(3)?;
    let boundary_str: String = row.get(4)?;
    let after_start_json: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;

    let tiers: Vec<FeeTier> = serde_json::from_str(&tiers_json)
        .map_err(|e| AppError::Storage(format!("malformed policy tiers: {e}")))?;
    let after_start: Option<FeeRate> = after_start_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| AppError::Storage(format!("malformed after-start fee: {e}")))?;
    let boundary = BoundaryRule::parse(&boundary_str)
        .ok_or_else(|| AppError::Storage(format!("unknown boundary rule: {boundary_str}")))?;

    Ok(CancellationPolicy {
        id: row.get(0)?,
        salon_id: row.get(1)?,
        version: row.get(2)?,
        tiers,
        boundary,
        after_start,
        created_at: parse_ts(&created_at)?,
    })
}

// ── No-Show Configs ──

pub fn save_no_show_config(conn: &Connection, config: &NoShowConfig) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO no_show_configs (id, salon_id, professional_id, grace_minutes, enabled)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           salon_id = excluded.salon_id,
           professional_id = excluded.professional_id,
           grace_minutes = excluded.grace_minutes,
           enabled = excluded.enabled",
        params![
            config.id,
            config.salon_id,
            config.professional_id,
            config.grace_minutes,
            config.enabled as i32,
        ],
    )?;
    Ok(())
}

pub fn get_enabled_no_show_configs(conn: &Connection) -> Result<Vec<NoShowConfig>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, salon_id, professional_id, grace_minutes, enabled
         FROM no_show_configs WHERE enabled = 1 ORDER BY salon_id, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(NoShowConfig {
            id: row.get(0)?,
            salon_id: row.get(1)?,
            professional_id: row.get(2)?,
            grace_minutes: row.get(3)?,
            enabled: row.get::<_, i32>(4)? != 0,
        })
    })?;

    let mut configs = vec![];
    for row in rows {
        configs.push(row?);
    }
    Ok(configs)
}
