use crate::object::{Certificate, Domain, Node, Pool, Rule, Source, SourceKind, VirtualService};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// On-disk form. `is_handle` is the historical name of the online flag.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
    index: i64,
    update_time: String,
    operation: String,
    #[serde(rename = "is_handle")]
    is_online: bool,
}

/// StoredSource is an entity as persisted, with its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSource {
    pub source: Source,
    pub index: i64,
    /// RFC3339 time of the last write.
    pub update_time: String,
    /// Name of the instance that made the last write.
    pub operation: String,
    /// Whether the entity is currently applied to its backend.
    pub is_online: bool,
}

impl StoredSource {
    pub(crate) fn new(source: Source, operation: &str, is_online: bool) -> Self {
        StoredSource {
            index: source.index(),
            source,
            update_time: chrono::Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            is_online,
        }
    }

    pub(crate) fn encode(&self) -> Result<Bytes, serde_json::Error> {
        match &self.source {
            Source::Pool(o) => self.encode_with(o),
            Source::Node(o) => self.encode_with(o),
            Source::Rule(o) => self.encode_with(o),
            Source::VirtualService(o) => self.encode_with(o),
            Source::Domain(o) => self.encode_with(o),
            Source::Certificate(o) => self.encode_with(o),
        }
    }

    fn encode_with<T: Serialize>(&self, data: &T) -> Result<Bytes, serde_json::Error> {
        let envelope = Envelope {
            data,
            index: self.index,
            update_time: self.update_time.clone(),
            operation: self.operation.clone(),
            is_online: self.is_online,
        };

        serde_json::to_vec(&envelope).map(Bytes::from)
    }

    pub(crate) fn decode(kind: SourceKind, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match kind {
            SourceKind::Pool => decode_as::<Pool>(bytes),
            SourceKind::Node => decode_as::<Node>(bytes),
            SourceKind::Rule => decode_as::<Rule>(bytes),
            SourceKind::VirtualService => decode_as::<VirtualService>(bytes),
            SourceKind::Domain => decode_as::<Domain>(bytes),
            SourceKind::Certificate => decode_as::<Certificate>(bytes),
        }
    }
}

fn decode_as<T: DeserializeOwned + Into<Source>>(bytes: &[u8]) -> Result<StoredSource, serde_json::Error> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;

    Ok(StoredSource {
        source: envelope.data.into(),
        index: envelope.index,
        update_time: envelope.update_time,
        operation: envelope.operation,
        is_online: envelope.is_online,
    })
}

/// Decodes just the payload of an envelope whose kind the caller already knows.
pub(crate) fn decode_data<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;
    Ok(envelope.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn envelope_layout() {
        let pool = Pool {
            name: "t1@svcA_80.Pool".to_string(),
            index: 3,
            ..Pool::default()
        };
        let stored = StoredSource::new(Source::Pool(pool.clone()), "entrance-1", true);

        let bytes = stored.encode().unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["data"]["name"], "t1@svcA_80.Pool");
        assert_eq!(json["index"], 3);
        assert_eq!(json["operation"], "entrance-1");
        assert_eq!(json["is_handle"], true);
        assert!(chrono::DateTime::parse_from_rfc3339(json["update_time"].as_str().unwrap()).is_ok());

        let decoded = StoredSource::decode(SourceKind::Pool, &bytes).unwrap();
        assert_eq!(decoded, stored);
        assert_eq!(decode_data::<Pool>(&bytes).unwrap(), pool);
    }
}
