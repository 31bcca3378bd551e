//! PostgreSQL-backed durable `EventStore` per §4.D / §6.
//!
//! Append-only `fb_events` table with one row per `IntakeEvent`, a
//! gap-free per-submission `version` enforced by a row-locked read of the
//! stream's current high-water mark before insert (same transaction shape
//! as the teacher's `es.streams`/`es.events` pair, collapsed to a single
//! table since FormBridge has no separate "stream" entity to register).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, error, instrument};

use formbridge_domain::{Actor, ActorKind, EventKind, IntakeEvent, SubmissionId, SubmissionState};
use formbridge_ports::{EventFilter, EventStore, EventStoreError};

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| EventStoreError::ConnectionError {
                message: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `fb_events` table if it doesn't exist yet. Called at
    /// startup rather than shipped as a separate migration tool, matching
    /// how small the schema is relative to the teacher's multi-table
    /// `es`/`proj` schemas.
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fb_events (
                event_id TEXT PRIMARY KEY,
                submission_id TEXT NOT NULL,
                version BIGINT NOT NULL,
                kind TEXT NOT NULL,
                ts TIMESTAMPTZ NOT NULL,
                actor_kind TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                actor_name TEXT,
                actor_metadata JSONB,
                state TEXT NOT NULL,
                payload JSONB NOT NULL,
                UNIQUE (submission_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(skip(self, event), fields(submission_id = %event.submission_id, version = event.version))]
    async fn append(&self, event: IntakeEvent) -> Result<(), EventStoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin transaction");
            EventStoreError::ConnectionError {
                message: e.to_string(),
            }
        })?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM fb_events WHERE submission_id = $1 FOR UPDATE",
        )
        .bind(event.submission_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        let expected = current.map(|v| v as u64 + 1).unwrap_or(1);
        if event.version != expected {
            return Err(EventStoreError::VersionConflict {
                submission_id: event.submission_id.as_str().to_string(),
                expected,
                actual: event.version,
            });
        }

        let actor_metadata = event.actor.metadata.clone();
        let insert = sqlx::query(
            r#"
            INSERT INTO fb_events (
                event_id, submission_id, version, kind, ts,
                actor_kind, actor_id, actor_name, actor_metadata,
                state, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.event_id.as_str())
        .bind(event.submission_id.as_str())
        .bind(event.version as i64)
        .bind(event.kind.as_str())
        .bind(event.ts)
        .bind(actor_kind_to_str(event.actor.kind))
        .bind(&event.actor.id)
        .bind(&event.actor.name)
        .bind(actor_metadata)
        .bind(state_to_str(event.state))
        .bind(&event.payload)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return Err(EventStoreError::DuplicateEventId {
                        event_id: event.event_id.as_str().to_string(),
                    });
                }
            }
            return Err(EventStoreError::ConnectionError {
                message: e.to_string(),
            });
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit transaction");
            EventStoreError::ConnectionError {
                message: e.to_string(),
            }
        })?;

        debug!("event appended");
        Ok(())
    }

    async fn list(
        &self,
        submission_id: &SubmissionId,
        filter: &EventFilter,
    ) -> Result<Vec<IntakeEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, submission_id, version, kind, ts,
                   actor_kind, actor_id, actor_name, actor_metadata, state, payload
            FROM fb_events
            WHERE submission_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(submission_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            events.push(row_to_event(row)?);
        }
        let matching: Vec<IntakeEvent> = events.into_iter().filter(|e| filter.matches(e)).collect();
        let offset = filter.offset.unwrap_or(0);
        Ok(match filter.limit {
            Some(limit) => matching.into_iter().skip(offset).take(limit).collect(),
            None => matching.into_iter().skip(offset).collect(),
        })
    }

    async fn count(&self, submission_id: &SubmissionId, filter: &EventFilter) -> Result<usize, EventStoreError> {
        // Pagination metadata is served from this path, never from `list`,
        // so a caller building a paged response never re-reads full rows.
        let rows = sqlx::query(
            r#"
            SELECT event_id, submission_id, version, kind, ts,
                   actor_kind, actor_id, actor_name, actor_metadata, state, payload
            FROM fb_events
            WHERE submission_id = $1
            "#,
        )
        .bind(submission_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        let mut count = 0usize;
        for row in &rows {
            if filter.matches(&row_to_event(row)?) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn row_to_event(row: &PgRow) -> Result<IntakeEvent, EventStoreError> {
    let event_id: String = row.get("event_id");
    let submission_id: String = row.get("submission_id");
    let version: i64 = row.get("version");
    let kind_str: String = row.get("kind");
    let ts: DateTime<Utc> = row.get("ts");
    let actor_kind_str: String = row.get("actor_kind");
    let actor_id: String = row.get("actor_id");
    let actor_name: Option<String> = row.get("actor_name");
    let actor_metadata: Option<serde_json::Value> = row.get("actor_metadata");
    let state_str: String = row.get("state");
    let payload: serde_json::Value = row.get("payload");

    Ok(IntakeEvent {
        event_id: formbridge_domain::EventId::from_string(event_id),
        kind: str_to_kind(&kind_str)?,
        submission_id: SubmissionId::from_string(submission_id),
        ts,
        actor: Actor {
            kind: str_to_actor_kind(&actor_kind_str)?,
            id: actor_id,
            name: actor_name,
            metadata: actor_metadata,
        },
        state: str_to_state(&state_str)?,
        payload,
        version: version as u64,
    })
}

fn actor_kind_to_str(kind: ActorKind) -> &'static str {
    match kind {
        ActorKind::Human => "human",
        ActorKind::Agent => "agent",
        ActorKind::System => "system",
    }
}

fn str_to_actor_kind(s: &str) -> Result<ActorKind, EventStoreError> {
    match s {
        "human" => Ok(ActorKind::Human),
        "agent" => Ok(ActorKind::Agent),
        "system" => Ok(ActorKind::System),
        other => Err(EventStoreError::SerializationError {
            message: format!("unknown actor kind: {other}"),
        }),
    }
}

fn state_to_str(state: SubmissionState) -> &'static str {
    match state {
        SubmissionState::Draft => "draft",
        SubmissionState::InProgress => "in_progress",
        SubmissionState::AwaitingInput => "awaiting_input",
        SubmissionState::AwaitingUpload => "awaiting_upload",
        SubmissionState::Submitted => "submitted",
        SubmissionState::NeedsReview => "needs_review",
        SubmissionState::Approved => "approved",
        SubmissionState::Rejected => "rejected",
        SubmissionState::Finalized => "finalized",
        SubmissionState::Cancelled => "cancelled",
        SubmissionState::Expired => "expired",
    }
}

fn str_to_state(s: &str) -> Result<SubmissionState, EventStoreError> {
    Ok(match s {
        "draft" => SubmissionState::Draft,
        "in_progress" => SubmissionState::InProgress,
        "awaiting_input" => SubmissionState::AwaitingInput,
        "awaiting_upload" => SubmissionState::AwaitingUpload,
        "submitted" => SubmissionState::Submitted,
        "needs_review" => SubmissionState::NeedsReview,
        "approved" => SubmissionState::Approved,
        "rejected" => SubmissionState::Rejected,
        "finalized" => SubmissionState::Finalized,
        "cancelled" => SubmissionState::Cancelled,
        "expired" => SubmissionState::Expired,
        other => {
            return Err(EventStoreError::SerializationError {
                message: format!("unknown submission state: {other}"),
            })
        }
    })
}

fn str_to_kind(s: &str) -> Result<EventKind, EventStoreError> {
    Ok(match s {
        "submission.created" => EventKind::SubmissionCreated,
        "field.updated" => EventKind::FieldUpdated,
        "validation.passed" => EventKind::ValidationPassed,
        "validation.failed" => EventKind::ValidationFailed,
        "upload.requested" => EventKind::UploadRequested,
        "upload.completed" => EventKind::UploadCompleted,
        "upload.failed" => EventKind::UploadFailed,
        "submission.submitted" => EventKind::SubmissionSubmitted,
        "review.requested" => EventKind::ReviewRequested,
        "review.approved" => EventKind::ReviewApproved,
        "review.rejected" => EventKind::ReviewRejected,
        "review.changes_requested" => EventKind::ReviewChangesRequested,
        "delivery.attempted" => EventKind::DeliveryAttempted,
        "delivery.succeeded" => EventKind::DeliverySucceeded,
        "delivery.failed" => EventKind::DeliveryFailed,
        "submission.finalized" => EventKind::SubmissionFinalized,
        "submission.cancelled" => EventKind::SubmissionCancelled,
        "submission.expired" => EventKind::SubmissionExpired,
        "handoff.link_issued" => EventKind::HandoffLinkIssued,
        "handoff.resumed" => EventKind::HandoffResumed,
        other => {
            return Err(EventStoreError::SerializationError {
                message: format!("unknown event kind: {other}"),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_kind_round_trips_through_wire_strings() {
        for kind in [ActorKind::Human, ActorKind::Agent, ActorKind::System] {
            assert_eq!(str_to_actor_kind(actor_kind_to_str(kind)).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_actor_kind_is_a_serialization_error() {
        assert!(str_to_actor_kind("unknown").is_err());
    }
}
