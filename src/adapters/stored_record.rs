//! Column encoding shared by the SQL session stores.

use crate::domain::error::StratlabError;
use crate::domain::record::{StepPayload, StepRecord};
use crate::domain::session::StoreKey;
use chrono::{DateTime, SecondsFormat, Utc};

/// RFC 3339 with full sub-second precision so a read returns the exact
/// timestamp that was written.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn decode_record(
    key: &StoreKey,
    payload_json: &str,
    recorded_at: &str,
) -> Result<StepRecord, StratlabError> {
    let corrupted = |reason: String| StratlabError::Deserialization {
        key: key.to_string(),
        reason,
    };
    let payload: StepPayload =
        serde_json::from_str(payload_json).map_err(|e| corrupted(e.to_string()))?;
    let timestamp = DateTime::parse_from_rfc3339(recorded_at)
        .map_err(|e| corrupted(format!("bad timestamp {recorded_at:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(StepRecord { payload, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::ModuleKind;
    use crate::domain::session::SessionId;

    fn key() -> StoreKey {
        StoreKey::new("ns", SessionId::new("s1").unwrap())
    }

    #[test]
    fn timestamp_round_trips_exactly() {
        let now = Utc::now();
        let decoded = decode_record(
            &key(),
            r#"{"module":"other","data":null}"#,
            &encode_timestamp(now),
        )
        .unwrap();
        assert_eq!(decoded.timestamp, now);
        assert_eq!(decoded.payload.module, ModuleKind::Other);
    }

    #[test]
    fn bad_timestamp_is_corruption() {
        let err = decode_record(&key(), r#"{"module":"other","data":null}"#, "yesterday")
            .unwrap_err();
        assert!(matches!(err, StratlabError::Deserialization { .. }));
    }
}
