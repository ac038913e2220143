//! diacare-core: domain types for the DiaCare diabetes care service
//!
//! Holds the prediction result types and the normalizer for ML service
//! responses, the prediction error taxonomy, the request principal, and the
//! patient and visit models with their input validation. Nothing here
//! performs I/O.

pub mod envelope;
pub mod error;
pub mod normalize;
pub mod patient;
pub mod prediction;
pub mod principal;
pub mod validation;
pub mod visit;

pub use envelope::{ApiResponse, FieldError};
pub use error::PredictionError;
pub use normalize::normalize;
pub use patient::{Gender, NewPatient, Patient, PatientInput, PatientUpdate, SmokingHistory};
pub use prediction::{PredictionResult, RiskAssessment, is_high_risk_label};
pub use principal::{Principal, UserType};
pub use validation::ValidationErrors;
pub use visit::{NewVisit, PredictionContext, Visit, VisitInput, VisitMetrics, VisitPrediction};
