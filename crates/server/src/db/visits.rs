use deadpool_postgres::Pool;
use diacare_core::{NewVisit, Visit};
use serde_json::Value as JsonValue;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::AppError;

const COLUMNS: &str =
    "id, patient_id, doctor_id, visit_date, metrics, notes, recommendations, prediction, created_at";

/// Repository for visits. Ownership of the patient is checked by the caller.
#[derive(Clone)]
pub struct VisitRepository {
    pool: Pool,
}

impl VisitRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Record a visit for `patient_id`
    pub async fn create(
        &self,
        doctor_id: &str,
        patient_id: Uuid,
        visit: NewVisit,
    ) -> Result<Visit, AppError> {
        let metrics = to_json(&visit.metrics)?;
        let prediction = visit.prediction.as_ref().map(to_json).transpose()?;

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO visits (id, patient_id, doctor_id, visit_date, metrics, notes, \
                     recommendations, prediction) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     RETURNING {COLUMNS}"
                ),
                &[
                    &Uuid::new_v4(),
                    &patient_id,
                    &doctor_id,
                    &visit.visit_date,
                    &metrics,
                    &visit.notes,
                    &visit.recommendations,
                    &prediction,
                ],
            )
            .await?;

        visit_from_row(&row)
    }

    /// Visits a doctor recorded for a patient, most recent visit first
    pub async fn list_for_patient(&self, doctor_id: &str, patient_id: Uuid) -> Result<Vec<Visit>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM visits WHERE patient_id = $1 AND doctor_id = $2 \
                     ORDER BY visit_date DESC"
                ),
                &[&patient_id, &doctor_id],
            )
            .await?;

        rows.iter().map(visit_from_row).collect()
    }

    /// Every visit of a patient, most recent visit first
    pub async fn list_for_patient_self(&self, patient_id: Uuid) -> Result<Vec<Visit>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {COLUMNS} FROM visits WHERE patient_id = $1 ORDER BY visit_date DESC"),
                &[&patient_id],
            )
            .await?;

        rows.iter().map(visit_from_row).collect()
    }

    /// Most recently recorded visit carrying a scored prediction
    pub async fn latest_with_prediction(&self, patient_id: Uuid) -> Result<Option<Visit>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {COLUMNS} FROM visits \
                     WHERE patient_id = $1 AND jsonb_typeof(prediction -> 'riskScore') = 'number' \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                &[&patient_id],
            )
            .await?;

        row.as_ref().map(visit_from_row).transpose()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))
}

fn visit_from_row(row: &Row) -> Result<Visit, AppError> {
    let metrics: JsonValue = row.get("metrics");
    let prediction: Option<JsonValue> = row.get("prediction");

    Ok(Visit {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        doctor_id: row.get("doctor_id"),
        visit_date: row.get("visit_date"),
        metrics: serde_json::from_value(metrics)
            .map_err(|e| AppError::Internal(format!("Corrupt visit metrics: {}", e)))?,
        notes: row.get("notes"),
        recommendations: row.get("recommendations"),
        prediction: prediction
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Corrupt visit prediction: {}", e)))?,
        created_at: row.get("created_at"),
    })
}
