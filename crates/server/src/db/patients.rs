use chrono::Utc;
use deadpool_postgres::Pool;
use diacare_core::patient::generate_patient_code;
use diacare_core::{NewPatient, Patient, PatientUpdate};
use tokio_postgres::{Row, error::SqlState};
use uuid::Uuid;

use crate::error::AppError;

const COLUMNS: &str = "id, patient_code, name, dob, gender, hypertension, heart_disease, \
     smoking_history, bmi, hba1c_level, blood_glucose_level, created_by_doctor_id, \
     created_at, updated_at";

/// Fresh codes tried before giving up on a unique-code collision
const CODE_ATTEMPTS: usize = 5;

/// Most patients returned by one list call
const LIST_LIMIT: i64 = 200;

/// Repository for patient CRUD, scoped to the owning doctor
#[derive(Clone)]
pub struct PatientRepository {
    pool: Pool,
}

impl PatientRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a patient owned by `doctor_id`
    pub async fn create(&self, doctor_id: &str, patient: NewPatient) -> Result<Patient, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO patients (id, patient_code, name, dob, gender, hypertension, heart_disease, \
             smoking_history, bmi, hba1c_level, blood_glucose_level, created_by_doctor_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {COLUMNS}"
        );

        for attempt in 1..=CODE_ATTEMPTS {
            let code = generate_patient_code(Utc::now());
            let result = client
                .query_one(
                    &sql,
                    &[
                        &Uuid::new_v4(),
                        &code,
                        &patient.name,
                        &patient.dob,
                        &patient.gender.as_str(),
                        &patient.hypertension,
                        &patient.heart_disease,
                        &patient.smoking_history.as_str(),
                        &patient.bmi,
                        &patient.hba1c_level,
                        &patient.blood_glucose_level,
                        &doctor_id,
                    ],
                )
                .await;

            match result {
                Ok(row) => return patient_from_row(&row),
                Err(err) if err.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                    tracing::warn!(attempt, code = %code, "Patient code collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::Internal(
            "Could not allocate a unique patient code".to_string(),
        ))
    }

    /// List a doctor's patients, newest first, optionally filtered by name or code
    pub async fn list(&self, doctor_id: &str, query: Option<&str>) -> Result<Vec<Patient>, AppError> {
        let client = self.pool.get().await?;
        let pattern = query.map(like_pattern);
        let rows = client
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM patients \
                     WHERE created_by_doctor_id = $1 \
                       AND ($2::text IS NULL OR name ILIKE $2 OR patient_code ILIKE $2) \
                     ORDER BY created_at DESC LIMIT $3"
                ),
                &[&doctor_id, &pattern, &LIST_LIMIT],
            )
            .await?;

        rows.iter().map(patient_from_row).collect()
    }

    /// Get a patient, only if `doctor_id` owns it
    pub async fn get(&self, doctor_id: &str, id: Uuid) -> Result<Option<Patient>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {COLUMNS} FROM patients WHERE id = $1 AND created_by_doctor_id = $2"),
                &[&id, &doctor_id],
            )
            .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    /// Get a patient regardless of owner (patient self-service)
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Patient>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&format!("SELECT {COLUMNS} FROM patients WHERE id = $1"), &[&id])
            .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    /// Apply `update` to a doctor's patient, returning the new state.
    ///
    /// The row is locked for the read-modify-write, so concurrent updates to
    /// different fields both survive.
    pub async fn update(
        &self,
        doctor_id: &str,
        id: Uuid,
        update: PatientUpdate,
    ) -> Result<Option<Patient>, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let current = tx
            .query_opt(
                &format!(
                    "SELECT {COLUMNS} FROM patients \
                     WHERE id = $1 AND created_by_doctor_id = $2 FOR UPDATE"
                ),
                &[&id, &doctor_id],
            )
            .await?;
        let Some(row) = current else {
            return Ok(None);
        };
        let mut patient = patient_from_row(&row)?;
        update.apply(&mut patient);

        let row = tx
            .query_one(
                &format!(
                    "UPDATE patients SET name = $3, dob = $4, gender = $5, hypertension = $6, \
                     heart_disease = $7, smoking_history = $8, bmi = $9, hba1c_level = $10, \
                     blood_glucose_level = $11, updated_at = now() \
                     WHERE id = $1 AND created_by_doctor_id = $2 RETURNING {COLUMNS}"
                ),
                &[
                    &id,
                    &doctor_id,
                    &patient.name,
                    &patient.dob,
                    &patient.gender.as_str(),
                    &patient.hypertension,
                    &patient.heart_disease,
                    &patient.smoking_history.as_str(),
                    &patient.bmi,
                    &patient.hba1c_level,
                    &patient.blood_glucose_level,
                ],
            )
            .await?;
        tx.commit().await?;

        patient_from_row(&row).map(Some)
    }

    /// Delete a doctor's patient; its visits go with it
    pub async fn delete(&self, doctor_id: &str, id: Uuid) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                "DELETE FROM patients WHERE id = $1 AND created_by_doctor_id = $2",
                &[&id, &doctor_id],
            )
            .await?;
        Ok(deleted > 0)
    }
}

fn patient_from_row(row: &Row) -> Result<Patient, AppError> {
    let gender: String = row.get("gender");
    let smoking_history: String = row.get("smoking_history");

    Ok(Patient {
        id: row.get("id"),
        patient_code: row.get("patient_code"),
        name: row.get("name"),
        dob: row.get("dob"),
        gender: gender.parse().map_err(AppError::Internal)?,
        hypertension: row.get("hypertension"),
        heart_disease: row.get("heart_disease"),
        smoking_history: smoking_history.parse().map_err(AppError::Internal)?,
        bmi: row.get("bmi"),
        hba1c_level: row.get("hba1c_level"),
        blood_glucose_level: row.get("blood_glucose_level"),
        created_by_doctor_id: row.get("created_by_doctor_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Case-insensitive substring pattern with LIKE wildcards escaped
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("smith"), "%smith%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
