mod patients;
mod visits;

pub use patients::PatientRepository;
pub use visits::VisitRepository;

use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::error::AppError;

/// Tables for patients and their visits. Every statement is idempotent.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id                   UUID PRIMARY KEY,
    patient_code         TEXT NOT NULL UNIQUE,
    name                 TEXT NOT NULL,
    dob                  DATE NOT NULL,
    gender               TEXT NOT NULL,
    hypertension         BOOLEAN NOT NULL DEFAULT FALSE,
    heart_disease        BOOLEAN NOT NULL DEFAULT FALSE,
    smoking_history      TEXT NOT NULL DEFAULT 'no info',
    bmi                  DOUBLE PRECISION,
    hba1c_level          DOUBLE PRECISION,
    blood_glucose_level  DOUBLE PRECISION,
    created_by_doctor_id TEXT NOT NULL,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at           TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS patients_doctor_created_idx
    ON patients (created_by_doctor_id, created_at DESC);

CREATE TABLE IF NOT EXISTS visits (
    id              UUID PRIMARY KEY,
    patient_id      UUID NOT NULL REFERENCES patients (id) ON DELETE CASCADE,
    doctor_id       TEXT NOT NULL,
    visit_date      TIMESTAMPTZ NOT NULL,
    metrics         JSONB NOT NULL DEFAULT '{}'::jsonb,
    notes           TEXT NOT NULL DEFAULT '',
    recommendations TEXT NOT NULL DEFAULT '',
    prediction      JSONB,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS visits_patient_date_idx
    ON visits (patient_id, visit_date DESC);
"#;

/// Create a connection pool from a database URL
pub async fn create_pool(database_url: &str) -> Result<Pool, deadpool_postgres::CreatePoolError> {
    let mut cfg = Config::new();
    cfg.url = Some(database_url.to_string());
    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
}

/// Create missing tables and indexes
pub async fn migrate(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}
