//! SQLite storage layer for DogSquad.
//!
//! # Integrity Guarantees
//!
//! This module is the sole authority on report identity and status. The
//! schema enforces the relationships the lifecycle depends on:
//!
//! - `report_timeline.report_id` and `alerts.report_id` are foreign keys into
//!   `reports`; an entry can never point at a report that does not exist.
//! - `alerts` carries `UNIQUE(report_id, volunteer_id)`, so a volunteer is
//!   dispatched at most once per report.
//! - Timeline rows are append-only: no UPDATE or DELETE statement for
//!   `report_timeline` exists anywhere in this crate.
//!
//! Status changes are written with a conditional update gated on the current
//! persisted status, so two actors racing on the same report cannot produce a
//! lost update or an illegal transition.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::error::StoreError;
use crate::model::{
    Alert, AlertStatus, IssueType, NewReport, Report, ReportStatus, ResolutionInput, TimelineEntry,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

/// Convert a stored unix-seconds value back to UTC.
fn from_unix(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).unwrap()
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:dogsquad.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                issue_type TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                location_address TEXT,
                image_url TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                assigned_volunteer_id TEXT,
                observed_at INTEGER NOT NULL,
                resolution_notes TEXT,
                resolution_image_url TEXT,
                resolved_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS report_timeline (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id INTEGER NOT NULL REFERENCES reports(id),
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                notes TEXT,
                image_url TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Index for oldest-first timeline reads per report
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_report_timeline_report_created
            ON report_timeline(report_id, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id INTEGER NOT NULL REFERENCES reports(id),
                volunteer_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'sent',
                sent_at INTEGER NOT NULL,
                responded_at INTEGER,
                response_notes TEXT,
                UNIQUE(report_id, volunteer_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Report store
    // ------------------------------------------------------------------

    /// Create a new report.
    ///
    /// Validates that the reporter id and title are non-empty and that both
    /// coordinates are plausible decimal degrees, rejecting with a
    /// [`StoreError::Validation`] naming the first offending field. On
    /// success the row is written with status `pending` and server-assigned
    /// timestamps, and the new identifier is returned.
    ///
    /// Exactly one row is written; a validation failure writes nothing.
    pub async fn create_report(&self, new: &NewReport) -> Result<i64, StoreError> {
        if new.user_id.trim().is_empty() {
            return Err(StoreError::missing("user_id"));
        }
        if new.title.trim().is_empty() {
            return Err(StoreError::missing("title"));
        }
        if !new.latitude.is_finite() || !(-90.0..=90.0).contains(&new.latitude) {
            return Err(StoreError::missing("latitude"));
        }
        if !new.longitude.is_finite() || !(-180.0..=180.0).contains(&new.longitude) {
            return Err(StoreError::missing("longitude"));
        }

        let now = Utc::now().timestamp();
        let observed = new.observed_at.map(|t| t.timestamp()).unwrap_or(now);

        let result = sqlx::query(
            r#"
            INSERT INTO reports
                (user_id, issue_type, title, description, latitude, longitude,
                 location_address, image_url, status, observed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(&new.user_id)
        .bind(new.issue_type.as_str())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(&new.location_address)
        .bind(&new.image_url)
        .bind(observed)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch a report by id.
    pub async fn get_report(&self, id: i64) -> Result<Report, StoreError> {
        let row = sqlx::query("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => report_from_row(&row),
            None => Err(StoreError::NotFound {
                entity: "report",
                id,
            }),
        }
    }

    /// Change a report's lifecycle status.
    ///
    /// The transition is validated against the status persisted *now*, not a
    /// caller-supplied copy, and the write itself is conditional on that same
    /// status. If another actor won the race in between, the write affects
    /// zero rows and the whole attempt is repeated against the fresh value,
    /// so a lost update is impossible and a transition that is still legal
    /// from the fresh status is not misreported as invalid. The retry loop
    /// terminates because the lifecycle only moves forward: the persisted
    /// status can advance at most a few times before it reaches `closed`,
    /// from which every transition is rejected.
    ///
    /// When moving to `resolved`, the optional `resolution` details are
    /// written in the same statement along with `resolved_at`.
    ///
    /// Does not append a timeline entry; that is the caller's responsibility.
    pub async fn update_status(
        &self,
        id: i64,
        new_status: ReportStatus,
        resolution: Option<&ResolutionInput>,
    ) -> Result<(), StoreError> {
        loop {
            let current = self.get_report(id).await?.status;

            if !current.can_transition_to(new_status) {
                return Err(StoreError::InvalidTransition {
                    from: current,
                    to: new_status,
                });
            }

            let now = Utc::now().timestamp();

            let result = if new_status == ReportStatus::Resolved {
                let resolution = resolution.cloned().unwrap_or_default();
                sqlx::query(
                    r#"
                    UPDATE reports
                    SET status = ?, resolution_notes = ?, resolution_image_url = ?,
                        resolved_at = ?, updated_at = ?
                    WHERE id = ? AND status = ?
                    "#,
                )
                .bind(new_status.as_str())
                .bind(&resolution.notes)
                .bind(&resolution.image_url)
                .bind(now)
                .bind(now)
                .bind(id)
                .bind(current.as_str())
                .execute(&self.pool)
                .await?
            } else {
                sqlx::query(
                    r#"
                    UPDATE reports
                    SET status = ?, updated_at = ?
                    WHERE id = ? AND status = ?
                    "#,
                )
                .bind(new_status.as_str())
                .bind(now)
                .bind(id)
                .bind(current.as_str())
                .execute(&self.pool)
                .await?
            };

            if result.rows_affected() == 1 {
                return Ok(());
            }

            // Someone else changed the status between our read and write;
            // go around and validate against what is persisted now.
        }
    }

    // ------------------------------------------------------------------
    // Timeline recorder
    // ------------------------------------------------------------------

    /// Append an entry to a report's timeline.
    ///
    /// Fails with [`StoreError::NotFound`] if the report does not exist.
    /// Entries are immutable once written; there is no update or delete.
    pub async fn append_timeline(
        &self,
        report_id: i64,
        user_id: &str,
        action: &str,
        notes: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.ensure_report_exists(report_id).await?;

        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO report_timeline (report_id, user_id, action, notes, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report_id)
        .bind(user_id)
        .bind(action)
        .bind(notes)
        .bind(image_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// List a report's timeline, oldest entry first.
    ///
    /// Re-querying with no intervening append yields an identical sequence.
    pub async fn list_timeline(&self, report_id: i64) -> Result<Vec<TimelineEntry>, StoreError> {
        self.ensure_report_exists(report_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, report_id, user_id, action, notes, image_url, created_at
            FROM report_timeline
            WHERE report_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TimelineEntry {
                id: row.get("id"),
                report_id: row.get("report_id"),
                user_id: row.get("user_id"),
                action: row.get("action"),
                notes: row.get("notes"),
                image_url: row.get("image_url"),
                created_at: from_unix(row.get("created_at")),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Alert records
    // ------------------------------------------------------------------

    /// Record alerts dispatched to candidate volunteers for a report.
    ///
    /// Every id is validated before the first insert, so a rejected batch
    /// writes nothing. One `sent` row is written per volunteer. A volunteer
    /// who already has an alert for this report is skipped rather than
    /// dispatched twice, so there is exactly one outcome per (report,
    /// volunteer) pair. Returns the alerts actually created by this call.
    pub async fn dispatch_alerts(
        &self,
        report_id: i64,
        volunteer_ids: &[String],
    ) -> Result<Vec<Alert>, StoreError> {
        self.ensure_report_exists(report_id).await?;

        if volunteer_ids.iter().any(|v| v.trim().is_empty()) {
            return Err(StoreError::missing("volunteer_ids"));
        }

        let now = Utc::now();
        let mut created = Vec::new();

        for volunteer_id in volunteer_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO alerts (report_id, volunteer_id, status, sent_at)
                VALUES (?, ?, 'sent', ?)
                ON CONFLICT(report_id, volunteer_id) DO NOTHING
                "#,
            )
            .bind(report_id)
            .bind(volunteer_id)
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                created.push(Alert {
                    id: result.last_insert_rowid(),
                    report_id,
                    volunteer_id: volunteer_id.clone(),
                    status: AlertStatus::Sent,
                    sent_at: from_unix(now.timestamp()),
                    responded_at: None,
                    response_notes: None,
                });
            }
        }

        Ok(created)
    }

    /// Record a volunteer's response to an alert.
    ///
    /// The status may only move forward from `sent` to one of the terminal
    /// outcomes. The write is conditional on the alert still being `sent`, so
    /// a second response can never overwrite a first.
    pub async fn respond_alert(
        &self,
        alert_id: i64,
        outcome: AlertStatus,
        notes: Option<&str>,
    ) -> Result<Alert, StoreError> {
        if !outcome.is_outcome() {
            return Err(StoreError::missing("status"));
        }

        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET status = ?, responded_at = ?, response_notes = ?
            WHERE id = ? AND status = 'sent'
            "#,
        )
        .bind(outcome.as_str())
        .bind(now)
        .bind(notes)
        .bind(alert_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM alerts WHERE id = ?")
                .bind(alert_id)
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(StoreError::AlertAlreadyResolved { id: alert_id }),
                None => Err(StoreError::NotFound {
                    entity: "alert",
                    id: alert_id,
                }),
            };
        }

        self.get_alert(alert_id).await
    }

    /// Fetch one alert by id.
    pub async fn get_alert(&self, id: i64) -> Result<Alert, StoreError> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => alert_from_row(&row),
            None => Err(StoreError::NotFound { entity: "alert", id }),
        }
    }

    /// List all alerts recorded for a report, oldest dispatch first.
    pub async fn list_alerts(&self, report_id: i64) -> Result<Vec<Alert>, StoreError> {
        self.ensure_report_exists(report_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM alerts
            WHERE report_id = ?
            ORDER BY sent_at ASC, id ASC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(alert_from_row).collect()
    }

    /// Count timeline entries for a report. Used by tests and diagnostics.
    pub async fn timeline_count(&self, report_id: i64) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM report_timeline WHERE report_id = ?")
            .bind(report_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Total number of report rows. Used by tests and diagnostics.
    pub async fn report_count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn ensure_report_exists(&self, report_id: i64) -> Result<(), StoreError> {
        let row = sqlx::query("SELECT 1 FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_none() {
            return Err(StoreError::NotFound {
                entity: "report",
                id: report_id,
            });
        }
        Ok(())
    }
}

fn report_from_row(row: &SqliteRow) -> Result<Report, StoreError> {
    let issue_type: String = row.get("issue_type");
    let issue_type = IssueType::parse(&issue_type).ok_or_else(|| {
        StoreError::Persistence(sqlx::Error::Decode(
            format!("unknown issue_type '{issue_type}'").into(),
        ))
    })?;

    let status: String = row.get("status");
    let status = ReportStatus::parse(&status).ok_or_else(|| {
        StoreError::Persistence(sqlx::Error::Decode(
            format!("unknown report status '{status}'").into(),
        ))
    })?;

    let resolved_at: Option<i64> = row.get("resolved_at");

    Ok(Report {
        id: row.get("id"),
        user_id: row.get("user_id"),
        issue_type,
        title: row.get("title"),
        description: row.get("description"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        location_address: row.get("location_address"),
        image_url: row.get("image_url"),
        status,
        assigned_volunteer_id: row.get("assigned_volunteer_id"),
        observed_at: from_unix(row.get("observed_at")),
        resolution_notes: row.get("resolution_notes"),
        resolution_image_url: row.get("resolution_image_url"),
        resolved_at: resolved_at.map(from_unix),
        created_at: from_unix(row.get("created_at")),
        updated_at: from_unix(row.get("updated_at")),
    })
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert, StoreError> {
    let status: String = row.get("status");
    let status = AlertStatus::parse(&status).ok_or_else(|| {
        StoreError::Persistence(sqlx::Error::Decode(
            format!("unknown alert status '{status}'").into(),
        ))
    })?;

    let responded_at: Option<i64> = row.get("responded_at");

    Ok(Alert {
        id: row.get("id"),
        report_id: row.get("report_id"),
        volunteer_id: row.get("volunteer_id"),
        status,
        sent_at: from_unix(row.get("sent_at")),
        responded_at: responded_at.map(from_unix),
        response_notes: row.get("response_notes"),
    })
}
