use serde::Serialize;

#[derive(Clone, Debug)]
/// Payload carried by one SSE event.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Serialise `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_event_carries_name_and_payload() {
        let event = ServerEvent::json("snapshot".to_string(), &serde_json::json!({"sequence": 3}))
            .unwrap();
        assert_eq!(event.event.as_deref(), Some("snapshot"));
        assert_eq!(event.data, r#"{"sequence":3}"#);
    }
}
