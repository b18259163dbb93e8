//! Wire frames shared by the stream and Socket.IO transports.
//!
//! A frame is a named event with a JSON payload. Over a byte stream it is
//! written as one JSON object per line (`{"event": .., "data": ..}`); over
//! Socket.IO it becomes the `[event, data]` array of an EVENT packet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChannelEvent, GradeUpdate, OutboundEvent};

/// Inbound event carrying a new noise reading.
pub const EVENT_LEVEL_UPDATE: &str = "actualizar_nivel";

/// Outbound event carrying a grade change.
pub const EVENT_GRADE_UPDATE: &str = "actualizar_nota";

/// A named event and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decode into a channel event.
    ///
    /// Returns `None` for events the monitor does not listen to.
    pub fn into_channel_event(self) -> Option<ChannelEvent> {
        match self.event.as_str() {
            EVENT_LEVEL_UPDATE => {
                let raw = self.data.get("valor").or_else(|| self.data.get("value"));
                Some(ChannelEvent::NoiseLevel(coerce_reading(raw)))
            }
            _ => None,
        }
    }

    /// Encode an outbound event.
    pub fn from_outbound(event: &OutboundEvent) -> Result<Self, serde_json::Error> {
        match event {
            OutboundEvent::GradeUpdate(update) => Ok(Self::new(
                EVENT_GRADE_UPDATE,
                serde_json::to_value(update)?,
            )),
        }
    }

    /// Decode an outbound grade notification, used by peers and tests.
    pub fn to_grade_update(&self) -> Option<GradeUpdate> {
        if self.event != EVENT_GRADE_UPDATE {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Coerce a loosely typed payload value into a reading.
///
/// Numbers pass through, numeric strings are parsed, booleans become 1/0.
/// Anything else, including a missing value, becomes 0. Non-finite results
/// are also mapped to 0.
pub fn coerce_reading(raw: Option<&Value>) -> f64 {
    let value = match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_reading() {
        assert_eq!(coerce_reading(None), 0.0);
        assert_eq!(coerce_reading(Some(&Value::Null)), 0.0);
        assert_eq!(coerce_reading(Some(&json!(42.5))), 42.5);
        assert_eq!(coerce_reading(Some(&json!(" 12 "))), 12.0);
        assert_eq!(coerce_reading(Some(&json!(""))), 0.0);
        assert_eq!(coerce_reading(Some(&json!("loud"))), 0.0);
        assert_eq!(coerce_reading(Some(&json!(true))), 1.0);
        assert_eq!(coerce_reading(Some(&json!([1, 2]))), 0.0);
        assert_eq!(coerce_reading(Some(&json!("inf"))), 0.0);
    }

    #[test]
    fn test_level_frame_decodes() {
        let frame: Frame =
            serde_json::from_str(r#"{"event":"actualizar_nivel","data":{"valor":33}}"#).unwrap();
        assert_eq!(frame.into_channel_event(), Some(ChannelEvent::NoiseLevel(33.0)));
    }

    #[test]
    fn test_level_frame_accepts_value_alias() {
        let frame = Frame::new(EVENT_LEVEL_UPDATE, json!({"value": 61}));
        assert_eq!(frame.into_channel_event(), Some(ChannelEvent::NoiseLevel(61.0)));
    }

    #[test]
    fn test_level_frame_without_payload() {
        let frame: Frame = serde_json::from_str(r#"{"event":"actualizar_nivel"}"#).unwrap();
        assert_eq!(frame.into_channel_event(), Some(ChannelEvent::NoiseLevel(0.0)));

        let frame = Frame::new(EVENT_LEVEL_UPDATE, json!({}));
        assert_eq!(frame.into_channel_event(), Some(ChannelEvent::NoiseLevel(0.0)));
    }

    #[test]
    fn test_unknown_event_ignored() {
        let frame = Frame::new("something_else", json!({"valor": 10}));
        assert_eq!(frame.into_channel_event(), None);
    }

    #[test]
    fn test_grade_frame_wire_format() {
        let event = OutboundEvent::GradeUpdate(GradeUpdate {
            session_id: "s-1".to_string(),
            grade: 3.9,
        });
        let frame = Frame::from_outbound(&event).unwrap();
        assert_eq!(frame.event, EVENT_GRADE_UPDATE);
        assert_eq!(frame.data, json!({"sesionId": "s-1", "nota": 3.9}));

        let update = frame.to_grade_update().unwrap();
        assert_eq!(update.session_id, "s-1");
        assert_eq!(update.grade, 3.9);
    }
}
