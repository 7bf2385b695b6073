use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Pending => "Pending",
            EventStatus::Approved => "Approved",
            EventStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(EventStatus::Pending),
            "Approved" => Ok(EventStatus::Approved),
            "Rejected" => Ok(EventStatus::Rejected),
            other => Err(ParseEnumError::new("event status", other)),
        }
    }
}

/// What the venue is booked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPurpose {
    Class,
    Meeting,
    Event,
    Workshop,
}

impl EventPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            EventPurpose::Class => "class",
            EventPurpose::Meeting => "meeting",
            EventPurpose::Event => "event",
            EventPurpose::Workshop => "workshop",
        }
    }
}

impl fmt::Display for EventPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventPurpose {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(EventPurpose::Class),
            "meeting" => Ok(EventPurpose::Meeting),
            "event" => Ok(EventPurpose::Event),
            "workshop" => Ok(EventPurpose::Workshop),
            other => Err(ParseEnumError::new("event purpose", other)),
        }
    }
}

/// A venue booking request submitted by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub expected_participants: u32,
    pub purpose: EventPurpose,
    pub student_id: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a student fills in when requesting a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub expected_participants: u32,
    pub purpose: EventPurpose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rejects_unknown_and_lowercase_values() {
        assert_eq!("Approved".parse::<EventStatus>().unwrap(), EventStatus::Approved);
        assert!("approved".parse::<EventStatus>().is_err());
        assert!("Success".parse::<EventStatus>().is_err());
    }

    #[test]
    fn new_event_deserializes_from_form_payload() {
        let payload = r#"{
            "title": "Robotics demo",
            "date": "2031-03-04",
            "startTime": "10:00:00",
            "endTime": "12:30:00",
            "expectedParticipants": 40,
            "purpose": "workshop"
        }"#;
        let event: NewEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.purpose, EventPurpose::Workshop);
        assert_eq!(event.description, "");
        assert!(event.start_time < event.end_time);
    }

    #[test]
    fn unknown_purpose_is_rejected_by_serde() {
        let payload = r#"{
            "title": "x",
            "date": "2031-03-04",
            "startTime": "10:00:00",
            "endTime": "12:00:00",
            "expectedParticipants": 1,
            "purpose": "party"
        }"#;
        assert!(serde_json::from_str::<NewEvent>(payload).is_err());
    }
}
