//! PostgreSQL-backed hike store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    CompletedHike, Participation, ParticipationState, PlannedSession, SessionCompletion, Trail,
};
use crate::store::HikeStore;

/// Hike store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresHikeStore {
    pool: PgPool,
}

impl PostgresHikeStore {
    /// Create a new PostgreSQL hike store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn session_from_row(row: &sqlx::postgres::PgRow) -> PlannedSession {
        PlannedSession {
            id: row.get("id"),
            trail_id: row.get("trail_id"),
            creator_id: row.get("creator_id"),
            scheduled_at: row.get("scheduled_at"),
            started: row.get("started"),
            started_at: row.get("started_at"),
            started_by: row.get("started_by"),
        }
    }

    fn completed_from_row(row: &sqlx::postgres::PgRow) -> CompletedHike {
        CompletedHike {
            id: row.get("id"),
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            trail_id: row.get("trail_id"),
            completed_at: row.get("completed_at"),
            elapsed_ms: row.get("elapsed_ms"),
        }
    }
}

#[async_trait]
impl HikeStore for PostgresHikeStore {
    async fn create_session(
        &self,
        trail_id: Uuid,
        scheduled_at: DateTime<Utc>,
        creator_id: Uuid,
        invited_user_ids: &[Uuid],
    ) -> DatabaseResult<Uuid> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::Transaction)?;

        let session_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO planned_hikes (id, trail_id, creator_id, scheduled_at, started)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trail_id)
        .bind(creator_id)
        .bind(scheduled_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        sqlx::query(
            r#"
            INSERT INTO participations (session_id, user_id, state)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session_id)
        .bind(creator_id)
        .bind(ParticipationState::Confirmed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        for invited in invited_user_ids {
            // The creator is already confirmed; skip a duplicate invite
            if *invited == creator_id {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO participations (session_id, user_id, state)
                VALUES ($1, $2, $3)
                ON CONFLICT (session_id, user_id) DO NOTHING
                "#,
            )
            .bind(session_id)
            .bind(invited)
            .bind(ParticipationState::Invited.as_str())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;
        }

        tx.commit().await.map_err(DatabaseError::Transaction)?;

        Ok(session_id)
    }

    async fn find_session(&self, session_id: Uuid) -> DatabaseResult<Option<PlannedSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, trail_id, creator_id, scheduled_at, started, started_at, started_by
            FROM planned_hikes
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| Self::session_from_row(&row)))
    }

    async fn find_trail(&self, trail_id: Uuid) -> DatabaseResult<Option<Trail>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, expected_duration_ms
            FROM trails
            WHERE id = $1
            "#,
        )
        .bind(trail_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| Trail {
            id: row.get("id"),
            name: row.get("name"),
            expected_duration_ms: row.get("expected_duration_ms"),
        }))
    }

    async fn mark_started(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        // The WHERE clause is the compare-and-set: only one caller can flip
        // the flag for a given session
        let result = sqlx::query(
            r#"
            UPDATE planned_hikes
            SET started = TRUE, started_at = $2, started_by = $3
            WHERE id = $1 AND started = FALSE
            "#,
        )
        .bind(session_id)
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn participation_exists(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present
            FROM participations
            WHERE session_id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.is_some())
    }

    async fn participations_for_session(
        &self,
        session_id: Uuid,
    ) -> DatabaseResult<Vec<Participation>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, user_id, state
            FROM participations
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.into_iter()
            .map(|row| {
                let raw: String = row.get("state");
                let state = ParticipationState::parse(&raw).ok_or_else(|| {
                    DatabaseError::Query(sqlx::Error::Decode(
                        format!("unrecognized participation state: {}", raw).into(),
                    ))
                })?;
                Ok(Participation {
                    session_id: row.get("session_id"),
                    user_id: row.get("user_id"),
                    state,
                })
            })
            .collect()
    }

    async fn confirm_participation(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE participations
            SET state = $3
            WHERE session_id = $1 AND user_id = $2 AND state = $4
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .bind(ParticipationState::Confirmed.as_str())
        .bind(ParticipationState::Invited.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_participation(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::Transaction)?;

        let result = sqlx::query(
            r#"
            DELETE FROM participations
            WHERE session_id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::Transaction)?;
            return Ok(false);
        }

        let remaining: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM participations WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        if remaining == 0 {
            sqlx::query("DELETE FROM planned_hikes WHERE id = $1")
                .bind(session_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::Query)?;
        }

        tx.commit().await.map_err(DatabaseError::Transaction)?;

        Ok(true)
    }

    async fn complete_session(
        &self,
        completion: &SessionCompletion,
    ) -> DatabaseResult<Option<Uuid>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::Transaction)?;

        // Deleting the subject's participation first makes the unit
        // idempotent per user: a second attempt deletes nothing and backs out
        let result = sqlx::query(
            r#"
            DELETE FROM participations
            WHERE session_id = $1 AND user_id = $2
            "#,
        )
        .bind(completion.session_id)
        .bind(completion.user_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::Transaction)?;
            return Ok(None);
        }

        let record_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO completed_hikes (id, session_id, user_id, trail_id, completed_at, elapsed_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(completion.session_id)
        .bind(completion.user_id)
        .bind(completion.trail_id)
        .bind(completion.completed_at)
        .bind(completion.elapsed_ms)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let remaining: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM participations WHERE session_id = $1
            "#,
        )
        .bind(completion.session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        if remaining == 0 {
            sqlx::query("DELETE FROM planned_hikes WHERE id = $1")
                .bind(completion.session_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::Query)?;
        }

        tx.commit().await.map_err(DatabaseError::Transaction)?;

        Ok(Some(record_id))
    }

    async fn find_completion(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<CompletedHike>> {
        let row = sqlx::query(
            r#"
            SELECT id, session_id, user_id, trail_id, completed_at, elapsed_ms
            FROM completed_hikes
            WHERE session_id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| Self::completed_from_row(&row)))
    }

    async fn completed_hikes_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<CompletedHike>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, user_id, trail_id, completed_at, elapsed_ms
            FROM completed_hikes
            WHERE user_id = $1
            ORDER BY completed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(rows.iter().map(Self::completed_from_row).collect())
    }
}
