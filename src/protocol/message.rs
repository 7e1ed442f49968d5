use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One message delivered to a channel handle.
///
/// A handle receives zero or more `Batch` messages followed by exactly one
/// terminal message (`FinalBatch` or `Aborted`). The event payload is opaque
/// to the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchMessage<E> {
    Batch(Vec<E>),
    FinalBatch(Vec<E>),
    Aborted(String),
}

impl<E> BatchMessage<E> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchMessage::Batch(_))
    }

    pub fn is_last(&self) -> bool {
        matches!(self, BatchMessage::FinalBatch(_))
    }

    pub fn events(&self) -> &[E] {
        match self {
            BatchMessage::Batch(events) | BatchMessage::FinalBatch(events) => events,
            BatchMessage::Aborted(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BatchMessage::Batch(_) => "batch",
            BatchMessage::FinalBatch(_) => "final_batch",
            BatchMessage::Aborted(_) => "aborted",
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize)]
struct EnvelopeRef<'a, E> {
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<&'a [E]>,
    #[serde(rename = "isLast", skip_serializing_if = "is_false")]
    is_last: bool,
    #[serde(rename = "abortingException", skip_serializing_if = "Option::is_none")]
    aborting_exception: Option<&'a str>,
}

#[derive(Deserialize)]
struct Envelope<E> {
    batch: Option<Vec<E>>,
    #[serde(rename = "isLast", default)]
    is_last: bool,
    #[serde(rename = "abortingException")]
    aborting_exception: Option<String>,
}

/// Encodes as `{"batch":[..]}`, `{"batch":[..],"isLast":true}` or
/// `{"abortingException":".."}`.
impl<E: Serialize> Serialize for BatchMessage<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = match self {
            BatchMessage::Batch(events) => EnvelopeRef {
                batch: Some(events.as_slice()),
                is_last: false,
                aborting_exception: None,
            },
            BatchMessage::FinalBatch(events) => EnvelopeRef {
                batch: Some(events.as_slice()),
                is_last: true,
                aborting_exception: None,
            },
            BatchMessage::Aborted(description) => EnvelopeRef {
                batch: None,
                is_last: false,
                aborting_exception: Some(description.as_str()),
            },
        };
        envelope.serialize(serializer)
    }
}

impl<'de, E: Deserialize<'de>> Deserialize<'de> for BatchMessage<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::<E>::deserialize(deserializer)?;
        match (envelope.aborting_exception, envelope.batch, envelope.is_last) {
            (Some(_), Some(_), _) | (Some(_), None, true) => Err(D::Error::custom(
                "abortingException cannot be combined with batch or isLast",
            )),
            (Some(description), None, false) => Ok(BatchMessage::Aborted(description)),
            (None, batch, true) => Ok(BatchMessage::FinalBatch(batch.unwrap_or_default())),
            (None, Some(batch), false) => Ok(BatchMessage::Batch(batch)),
            (None, None, false) => Err(D::Error::custom(
                "message carries neither batch nor abortingException",
            )),
        }
    }
}
