use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Kind of account behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Doctor,
    Patient,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Doctor => "doctor",
            UserType::Patient => "patient",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(UserType::Doctor),
            "patient" => Ok(UserType::Patient),
            other => Err(format!("unknown user type '{other}'")),
        }
    }
}

/// Authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub user_type: UserType,
    pub linked_patient_id: Option<Uuid>,
}

impl Principal {
    pub fn doctor(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_type: UserType::Doctor,
            linked_patient_id: None,
        }
    }

    pub fn patient(id: impl Into<String>, linked_patient_id: Uuid) -> Self {
        Self {
            id: id.into(),
            user_type: UserType::Patient,
            linked_patient_id: Some(linked_patient_id),
        }
    }

    pub fn has_any_role(&self, roles: &[UserType]) -> bool {
        roles.contains(&self.user_type)
    }
}
