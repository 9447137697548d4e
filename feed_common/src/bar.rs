//! Bar data model and the wire message envelope.
//!
//! A `Bar` is one OHLCV observation for the single simulated symbol. Bars travel
//! from server to client wrapped in a `FeedMessage`, serialized as one JSON text
//! frame per line:
//!
//! ```text
//! { "type": "initial" | "update", "data": Bar }
//! Bar = { "date": string, "open": number, "high": number, "low": number,
//!         "close": number, "volume": integer, "Name": string }
//! ```
//!
//! Field names (including the capitalized `Name`) match the CSV header used by
//! the dashboard's static historical view, so both data paths share one shape.

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// One OHLCV price observation for a fixed time interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// RFC 3339 UTC timestamp of the observation.
    pub date: String,
    /// Opening price, rounded to cents.
    pub open: f64,
    /// Highest price, rounded to cents.
    pub high: f64,
    /// Lowest price, rounded to cents.
    pub low: f64,
    /// Closing price, rounded to cents.
    pub close: f64,
    /// Synthetic trade volume for this bar.
    pub volume: u64,
    /// Symbol identifier for the single modeled instrument.
    #[serde(rename = "Name")]
    pub name: String,
}

/// Message pushed by the feed server to its clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum FeedMessage {
    /// First bar sent synchronously on connect, before any timer fires.
    Initial(Bar),
    /// Periodic bar sent on every update tick.
    Update(Bar),
}

impl FeedMessage {
    /// The bar carried by this message, regardless of kind.
    pub fn bar(&self) -> &Bar {
        match self {
            FeedMessage::Initial(bar) | FeedMessage::Update(bar) => bar,
        }
    }

    /// Consume the message and return the carried bar.
    pub fn into_bar(self) -> Bar {
        match self {
            FeedMessage::Initial(bar) | FeedMessage::Update(bar) => bar,
        }
    }

    /// Encode the message to a JSON string (one wire frame, without the newline).
    pub fn to_json(&self) -> Result<String, FeedError> {
        let json = serde_json::to_string(self)?;
        Ok(json)
    }

    /// Decode a single wire frame.
    pub fn from_json(frame: &str) -> Result<Self, FeedError> {
        let msg = serde_json::from_str(frame)?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            date: "2024-01-02T03:04:05.678Z".to_string(),
            open: 180.0,
            high: 181.25,
            low: 179.5,
            close: 180.75,
            volume: 734_211,
            name: "BA".to_string(),
        }
    }

    #[test]
    fn update_frame_uses_wire_field_names() {
        let json = FeedMessage::Update(sample_bar()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "update");
        assert_eq!(value["data"]["Name"], "BA");
        assert_eq!(value["data"]["date"], "2024-01-02T03:04:05.678Z");
        assert_eq!(value["data"]["volume"], 734_211);
    }

    #[test]
    fn initial_frame_round_trips() {
        let msg = FeedMessage::Initial(sample_bar());
        let decoded = FeedMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_message_kind_is_rejected() {
        let frame = r#"{"type":"snapshot","data":{}}"#;
        assert!(FeedMessage::from_json(frame).is_err());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert!(FeedMessage::from_json(r#"{"type":"update","data":{"date":"#).is_err());
    }
}
