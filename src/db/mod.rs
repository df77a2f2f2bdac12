use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};
use std::time::Duration;

use crate::config::{Config, VoteLimits};
use crate::error::LedgerError;
use crate::ledger::{PhotoSource, VoteLedger};
use crate::models::{Contest, LedgerSnapshot, Photo, PhotoStatus, PhotoTally, QuotaScope};

/// SQLite-backed ledger: contests, photo tallies and per-user vote quotas.
pub struct Database {
    pool: SqlitePool,
    limits: VoteLimits,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self, LedgerError> {
        Self::connect(&config.database_url, config.vote_limits).await
    }

    pub async fn connect(db_url: &str, limits: VoteLimits) -> Result<Self, LedgerError> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        // Each connection to an in-memory database sees its own empty database,
        // so keep exactly one and never recycle it.
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool, limits })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contests (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS photos (
                id TEXT PRIMARY KEY,
                contest_id TEXT NOT NULL,
                photographer_name TEXT NOT NULL,
                photographer_avatar_url TEXT,
                image_url TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                vote_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (contest_id) REFERENCES contests(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vote_quotas (
                user_id TEXT NOT NULL,
                contest_id TEXT NOT NULL,
                total_used INTEGER NOT NULL,
                daily_used INTEGER NOT NULL,
                day TEXT NOT NULL,
                PRIMARY KEY (user_id, contest_id),
                FOREIGN KEY (contest_id) REFERENCES contests(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn create_contest(&self, contest: &Contest) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO contests (id, name, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&contest.id)
        .bind(&contest.name)
        .bind(contest.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_contest(&self, contest_id: &str) -> Result<Contest, LedgerError> {
        let row = sqlx::query("SELECT id, name, created_at FROM contests WHERE id = ?")
            .bind(contest_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::UnknownContest(contest_id.to_string()))?;

        let created_at_str: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| LedgerError::Malformed(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Contest {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at,
        })
    }

    async fn ensure_contest(&self, contest_id: &str) -> Result<(), LedgerError> {
        let exists = sqlx::query("SELECT 1 FROM contests WHERE id = ?")
            .bind(contest_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if !exists {
            return Err(LedgerError::UnknownContest(contest_id.to_string()));
        }
        Ok(())
    }

    pub async fn add_photo(&self, contest_id: &str, photo: &Photo, status: PhotoStatus) -> Result<(), LedgerError> {
        self.ensure_contest(contest_id).await?;

        sqlx::query(
            r#"
            INSERT INTO photos (id, contest_id, photographer_name, photographer_avatar_url, image_url, description, status, vote_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&photo.id)
        .bind(contest_id)
        .bind(&photo.photographer_name)
        .bind(&photo.photographer_avatar_url)
        .bind(&photo.image_url)
        .bind(&photo.description)
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_photo_status(&self, photo_id: &str, status: PhotoStatus) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE photos SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(photo_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::UnknownPhoto(photo_id.to_string()));
        }
        Ok(())
    }

    // Approved photos with their vote counts, in submission order
    pub async fn get_photo_tallies(&self, contest_id: &str) -> Result<Vec<PhotoTally>, LedgerError> {
        self.ensure_contest(contest_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, photographer_name, photographer_avatar_url, image_url, description, vote_count
            FROM photos
            WHERE contest_id = ? AND status = 'approved'
            ORDER BY rowid
            "#,
        )
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PhotoTally, LedgerError> {
                Ok(PhotoTally {
                    photo: photo_from_row(row)?,
                    vote_count: row.try_get("vote_count")?,
                })
            })
            .collect()
    }

    /// Quota snapshot as of `day`. A row last touched on another day has no daily usage.
    pub async fn vote_status_on(
        &self,
        user_id: &str,
        contest_id: &str,
        day: NaiveDate,
    ) -> Result<LedgerSnapshot, LedgerError> {
        self.ensure_contest(contest_id).await?;

        let row = sqlx::query(
            r#"
            SELECT total_used, daily_used, day
            FROM vote_quotas
            WHERE user_id = ? AND contest_id = ?
            "#,
        )
        .bind(user_id)
        .bind(contest_id)
        .fetch_optional(&self.pool)
        .await?;

        let (total_used, daily_used) = match row {
            Some(row) => {
                let total_used: i64 = row.try_get("total_used")?;
                let daily_used: i64 = row.try_get("daily_used")?;
                let row_day: String = row.try_get("day")?;
                if row_day == day.to_string() {
                    (total_used, daily_used)
                } else {
                    (total_used, 0)
                }
            }
            None => (0, 0),
        };

        Ok(self.snapshot(total_used, daily_used))
    }

    /// Spends one vote on `day`, or refuses with the budget that ran out.
    ///
    /// The limit check and the increment are a single conditional upsert, so
    /// concurrent consumers cannot overdraw a quota.
    pub async fn consume_vote_on(
        &self,
        user_id: &str,
        contest_id: &str,
        day: NaiveDate,
    ) -> Result<LedgerSnapshot, LedgerError> {
        if self.limits.total == 0 {
            return Err(LedgerError::QuotaExhausted(QuotaScope::Lifetime));
        }
        if self.limits.daily == 0 {
            return Err(LedgerError::QuotaExhausted(QuotaScope::Daily));
        }
        self.ensure_contest(contest_id).await?;

        let day = day.to_string();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO vote_quotas (user_id, contest_id, total_used, daily_used, day)
            VALUES (?, ?, 1, 1, ?)
            ON CONFLICT(user_id, contest_id) DO UPDATE SET
                total_used = vote_quotas.total_used + 1,
                daily_used = CASE WHEN vote_quotas.day = excluded.day THEN vote_quotas.daily_used + 1 ELSE 1 END,
                day = excluded.day
            WHERE vote_quotas.total_used < ?
              AND (vote_quotas.day <> excluded.day OR vote_quotas.daily_used < ?)
            "#,
        )
        .bind(user_id)
        .bind(contest_id)
        .bind(&day)
        .bind(i64::from(self.limits.total))
        .bind(i64::from(self.limits.daily))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT total_used, daily_used
            FROM vote_quotas
            WHERE user_id = ? AND contest_id = ?
            "#,
        )
        .bind(user_id)
        .bind(contest_id)
        .fetch_one(&mut *tx)
        .await?;
        let total_used: i64 = row.try_get("total_used")?;
        let daily_used: i64 = row.try_get("daily_used")?;

        if result.rows_affected() == 0 {
            let scope = if total_used >= i64::from(self.limits.total) {
                QuotaScope::Lifetime
            } else {
                QuotaScope::Daily
            };
            return Err(LedgerError::QuotaExhausted(scope));
        }

        tx.commit().await?;
        Ok(self.snapshot(total_used, daily_used))
    }

    fn snapshot(&self, total_used: i64, daily_used: i64) -> LedgerSnapshot {
        let total_remaining = (i64::from(self.limits.total) - total_used).max(0);
        let daily_remaining = (i64::from(self.limits.daily) - daily_used).max(0);
        LedgerSnapshot::new(
            total_remaining,
            daily_remaining,
            total_remaining > 0 && daily_remaining > 0,
        )
    }
}

fn photo_from_row(row: &SqliteRow) -> Result<Photo, sqlx::Error> {
    Ok(Photo {
        id: row.try_get("id")?,
        photographer_name: row.try_get("photographer_name")?,
        photographer_avatar_url: row.try_get("photographer_avatar_url")?,
        image_url: row.try_get("image_url")?,
        description: row.try_get("description")?,
    })
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[async_trait]
impl VoteLedger for Database {
    async fn get_vote_status(&self, user_id: &str, contest_id: &str) -> Result<LedgerSnapshot, LedgerError> {
        self.vote_status_on(user_id, contest_id, today()).await
    }

    async fn consume_vote(&self, user_id: &str, contest_id: &str) -> Result<LedgerSnapshot, LedgerError> {
        self.consume_vote_on(user_id, contest_id, today()).await
    }

    async fn increment_photo_tally(&self, photo_id: &str) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE photos SET vote_count = vote_count + 1 WHERE id = ?")
            .bind(photo_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::UnknownPhoto(photo_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PhotoSource for Database {
    async fn get_approved_photos(&self, contest_id: &str) -> Result<Vec<Photo>, LedgerError> {
        self.ensure_contest(contest_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, photographer_name, photographer_avatar_url, image_url, description
            FROM photos
            WHERE contest_id = ? AND status = 'approved'
            ORDER BY rowid
            "#,
        )
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        let photos = rows.iter().map(photo_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(photos)
    }
}
