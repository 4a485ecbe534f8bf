use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::sqlite::{open_database, open_memory_database};
use super::StoreError;
use crate::models::{
    AssessmentPayload, GenerationContext, GenerationMetadata, GenerationSource, PillarScores,
    ProfileSignals, Role,
};

/// A narrative as persisted, with the provenance recorded at save time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNarrative {
    pub payload: AssessmentPayload,
    pub source: GenerationSource,
    pub template_used: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Persistence for assessment contexts and their current narrative.
///
/// Only sanitized payloads are ever handed to `save_narrative`.
pub trait AssessmentStore: Send + Sync {
    fn load_context(&self, assessment_id: &str) -> Result<Option<GenerationContext>, StoreError>;

    fn upsert_context(&self, context: &GenerationContext) -> Result<(), StoreError>;

    fn load_narrative(&self, assessment_id: &str) -> Result<Option<StoredNarrative>, StoreError>;

    /// Replace the current narrative for an assessment.
    fn save_narrative(
        &self,
        assessment_id: &str,
        payload: &AssessmentPayload,
        metadata: &GenerationMetadata,
    ) -> Result<(), StoreError>;
}

/// SQLite-backed store. One connection, serialized behind a mutex.
pub struct SqliteAssessmentStore {
    conn: Mutex<Connection>,
}

impl SqliteAssessmentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

type ContextRow = (u8, u8, u8, u8, Option<String>, Option<u8>);

impl AssessmentStore for SqliteAssessmentStore {
    fn load_context(&self, assessment_id: &str) -> Result<Option<GenerationContext>, StoreError> {
        let conn = self.conn()?;
        let row: Option<ContextRow> = conn
            .query_row(
                "SELECT vision, execution, people, resilience, role, tenure_years
                 FROM assessments WHERE id = ?1",
                params![assessment_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((vision, execution, people, resilience, role, tenure_years)) = row else {
            return Ok(None);
        };

        Ok(Some(GenerationContext {
            assessment_id: assessment_id.to_string(),
            scores: PillarScores {
                vision,
                execution,
                people,
                resilience,
            },
            profile: ProfileSignals {
                role: role.as_deref().map(Role::from_str).transpose()?,
                tenure_years,
            },
        }))
    }

    fn upsert_context(&self, context: &GenerationContext) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO assessments
                 (id, vision, execution, people, resilience, role, tenure_years, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(id) DO UPDATE SET
                 vision = excluded.vision,
                 execution = excluded.execution,
                 people = excluded.people,
                 resilience = excluded.resilience,
                 role = excluded.role,
                 tenure_years = excluded.tenure_years,
                 updated_at = excluded.updated_at",
            params![
                context.assessment_id,
                context.scores.vision,
                context.scores.execution,
                context.scores.people,
                context.scores.resilience,
                context.profile.role.map(|r| r.as_str()),
                context.profile.tenure_years,
                now,
            ],
        )?;
        tracing::debug!(assessment_id = %context.assessment_id, "Assessment context saved");
        Ok(())
    }

    fn load_narrative(&self, assessment_id: &str) -> Result<Option<StoredNarrative>, StoreError> {
        let conn = self.conn()?;
        let row: Option<(String, String, Option<String>, DateTime<Utc>)> = conn
            .query_row(
                "SELECT payload_json, source, template_used, generated_at
                 FROM situation_narratives WHERE assessment_id = ?1",
                params![assessment_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((payload_json, source, template_used, generated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredNarrative {
            payload: serde_json::from_str(&payload_json)?,
            source: GenerationSource::from_str(&source)?,
            template_used,
            generated_at,
        }))
    }

    fn save_narrative(
        &self,
        assessment_id: &str,
        payload: &AssessmentPayload,
        metadata: &GenerationMetadata,
    ) -> Result<(), StoreError> {
        let payload_json = serde_json::to_string(payload)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO situation_narratives
                 (assessment_id, schema, payload_json, source, template_used, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                assessment_id,
                payload.schema(),
                payload_json,
                metadata.final_source.as_str(),
                metadata.template_used,
                metadata.generated_at,
            ],
        )?;
        tracing::debug!(
            assessment_id,
            source = %metadata.final_source,
            "Situation narrative saved"
        );
        Ok(())
    }
}
