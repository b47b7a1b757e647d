use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceType {
    Image,
    Video,
    Document,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::Image => "IMAGE",
            EvidenceType::Video => "VIDEO",
            EvidenceType::Document => "DOCUMENT",
        }
    }
}

impl FromStr for EvidenceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMAGE" => Ok(EvidenceType::Image),
            "VIDEO" => Ok(EvidenceType::Video),
            "DOCUMENT" => Ok(EvidenceType::Document),
            other => Err(anyhow::anyhow!("unknown evidence type '{}'", other)),
        }
    }
}

/// Reference returned by the external evidence storage. Only this is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: EvidenceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub verified_by: Uuid,
    pub location: GeoPoint,
    pub distance_meters: f64,
    pub geo_mismatch: bool,
    pub remarks: Option<String>,
    pub evidence: Vec<EvidenceRef>,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct VerificationRow {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub verified_by: Uuid,
    pub lat: f64,
    pub lon: f64,
    pub distance: f64,
    pub geo_mismatch: bool,
    pub remarks: Option<String>,
    pub verified_at: DateTime<Utc>,
}
