use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Alarm-raised event as published by the field sensors gateway.
#[derive(Debug, Deserialize)]
pub struct AlarmMessage {
    pub data: AlarmData,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct AlarmData {
    #[serde(rename = "ALARM_TYPE")]
    pub alarm_type: Option<String>,
    #[serde(rename = "CRITICALITY")]
    pub criticality: Option<String>,
    #[serde(rename = "INCIDENT_DATETIME")]
    pub incident_datetime: Option<String>,
    #[serde(rename = "LATITUD", default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "LONGITUD", default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    #[serde(rename = "CHAINAGE", default, deserialize_with = "parse_f64_option")]
    pub chainage: Option<f64>,
    #[serde(rename = "CREATED_BY")]
    pub created_by: Option<String>,
}

impl AlarmMessage {
    pub fn alarm_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.uuid).ok()
    }

    pub fn created_by(&self) -> Option<Uuid> {
        self.data
            .created_by
            .as_deref()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    /// Incident time in either `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`, UTC.
    pub fn incident_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.data.incident_datetime.as_deref()?.trim();
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            .ok()
            .map(|t| t.and_utc())
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parsing_gateway_payload() {
        let payload = r#"
        {
            "data": {
                "ALARM_TYPE": "INTRUSION",
                "CRITICALITY": "high",
                "INCIDENT_DATETIME": "2025-11-29 06:15:15",
                "LATITUD": "+20.652494",
                "LONGITUD": "-100.391404",
                "CHAINAGE": "14.250",
                "CREATED_BY": "6f1c2a8e-9a55-4c1b-8a8e-1d3f0f4b8c21",
                "SENSOR_ID": "0848086072"
            },
            "metadata": {
                "BYTES": 188,
                "RECEIVED_EPOCH": 1764398681920
            },
            "uuid": "d52b1454-d43d-50fa-99ca-79515c904162"
        }
        "#;

        let msg: AlarmMessage = serde_json::from_str(payload).unwrap();
        assert_eq!(msg.data.latitude, Some(20.652494));
        assert_eq!(msg.data.longitude, Some(-100.391404));
        assert_eq!(msg.data.chainage, Some(14.25));
        assert_eq!(msg.data.alarm_type.as_deref(), Some("INTRUSION"));
        assert!(msg.alarm_id().is_some());
        assert!(msg.created_by().is_some());

        let incident = msg.incident_time().unwrap();
        assert_eq!((incident.year(), incident.month(), incident.day()), (2025, 11, 29));
        assert_eq!(incident.hour(), 6);
    }

    #[test]
    fn test_blank_numbers_and_iso_datetime() {
        let payload = r#"
        {
            "data": {
                "LATITUD": "",
                "LONGITUD": 71.5,
                "INCIDENT_DATETIME": "2025-11-29T06:15:15"
            },
            "uuid": "not-a-uuid"
        }
        "#;

        let msg: AlarmMessage = serde_json::from_str(payload).unwrap();
        assert_eq!(msg.data.latitude, None);
        assert_eq!(msg.data.longitude, Some(71.5));
        assert_eq!(msg.data.chainage, None);
        assert!(msg.alarm_id().is_none());
        assert!(msg.incident_time().is_some());
    }
}
