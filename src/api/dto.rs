//! REST API request/response data transfer objects

use serde::Serialize;

use crate::verify::types::IdentityProfile;

/// Successful verification response.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: String,
    pub identity_id: String,
    /// Presentation confidence in [0, 100], two decimal places.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileDto>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ProfileDto {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past_surgery: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_conditions: Option<String>,
}

impl From<IdentityProfile> for ProfileDto {
    fn from(profile: IdentityProfile) -> Self {
        Self {
            name: profile.name,
            emergency_contact: profile.emergency_contact,
            blood_group: profile.blood_group,
            allergies: profile.allergies,
            past_surgery: profile.past_surgery,
            other_conditions: profile.other_conditions,
        }
    }
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error response with a machine-checkable code.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}

/// Round a confidence score to two decimal places for presentation.
pub fn round_confidence(confidence: f64) -> f64 {
    (confidence * 100.0).round() / 100.0
}
