use crate::validation::is_flight_id;
use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw document as held by a destination.
///
/// Documents are JSON objects. Records are translated into documents before
/// they are handed to a [`crate::DocumentStore`], and documents read from
/// external input are translated back into records with
/// [`Record::try_from`].
pub type Document = Value;

/// Document field holding the flight identifier.
pub const FLIGHT_ID_FIELD: &str = "flightid";

/// Document field holding the message discriminator.
pub const KIND_FIELD: &str = "posmsgtype";

/// Identity of a tracked flight.
///
/// FlightId values are exactly six characters of `[A-Z0-9]`. Identities are
/// expected to be unique within a generated record set but nothing enforces
/// it: the `flights` destination upserts by identity, so collisions simply
/// overwrite each other.
#[nutype(
    sanitize(trim),
    validate(predicate = is_flight_id),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct FlightId(String);

/// Discriminator deciding which append-only destination a record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Airborne position report.
    Position,
    /// Surface (ground movement) report.
    Surface,
}

impl MessageKind {
    /// Parses the wire value of the discriminator.
    ///
    /// Only the two known values are accepted; anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "position" => Some(Self::Position),
            "surface" => Some(Self::Surface),
            _ => None,
        }
    }

    /// Returns the wire value of the discriminator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Surface => "surface",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated entity update: a flight position report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity of the flight; upsert key of the `flights` destination.
    #[serde(rename = "flightid")]
    pub flight_id: FlightId,
    /// Routing discriminator.
    #[serde(rename = "posmsgtype")]
    pub kind: MessageKind,
    /// When the report was produced.
    pub time_added: DateTime<Utc>,
    /// Latitude in degrees, [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, [-180, 180].
    pub longitude: f64,
    /// Altitude in feet.
    pub altitude: f64,
    /// Ground speed in knots.
    pub speed: f64,
}

impl Record {
    /// Translates the record into the document written to every destination.
    pub fn to_document(&self) -> Result<Document, TranslationError> {
        serde_json::to_value(self).map_err(|error| TranslationError::SerializationFailed {
            flight_id: self.flight_id.clone(),
            detail: error.to_string(),
        })
    }
}

impl TryFrom<Document> for Record {
    type Error = TranslationError;

    /// Translates a raw document into a routable record.
    ///
    /// A missing or unrecognized discriminator is rejected rather than routed
    /// to a fallback destination.
    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let object = document.as_object().ok_or(TranslationError::NotAnObject)?;

        let raw_id = object
            .get(FLIGHT_ID_FIELD)
            .and_then(Value::as_str)
            .ok_or(TranslationError::MissingField {
                field: FLIGHT_ID_FIELD,
            })?;
        let flight_id =
            FlightId::try_new(raw_id).map_err(|_| TranslationError::InvalidFlightId {
                value: raw_id.to_string(),
            })?;

        let raw_kind = object
            .get(KIND_FIELD)
            .ok_or(TranslationError::MissingField { field: KIND_FIELD })?;
        if raw_kind.as_str().and_then(MessageKind::parse).is_none() {
            return Err(TranslationError::UnrecognizedKind {
                flight_id,
                value: raw_kind.to_string(),
            });
        }

        serde_json::from_value(document).map_err(|error| TranslationError::Malformed {
            flight_id,
            detail: error.to_string(),
        })
    }
}

/// Error returned when a document and a record cannot be translated into
/// one another.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The document is not a JSON object.
    #[error("document is not a JSON object")]
    NotAnObject,

    /// A field required for routing is absent.
    #[error("document is missing required field `{field}`")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },

    /// The identity field does not hold a valid flight identifier.
    #[error("invalid flight id {value:?}")]
    InvalidFlightId {
        /// The rejected identity.
        value: String,
    },

    /// The discriminator holds a value that routes to no destination.
    #[error("unrecognized message kind {value} for flight {flight_id}")]
    UnrecognizedKind {
        /// Identity of the rejected document.
        flight_id: FlightId,
        /// The discriminator as found in the document.
        value: String,
    },

    /// The payload fields could not be decoded.
    #[error("malformed payload for flight {flight_id}: {detail}")]
    Malformed {
        /// Identity of the rejected document.
        flight_id: FlightId,
        /// Decoder message.
        detail: String,
    },

    /// The record could not be encoded as a document.
    #[error("failed to serialize record for flight {flight_id}: {detail}")]
    SerializationFailed {
        /// Identity of the record.
        flight_id: FlightId,
        /// Encoder message.
        detail: String,
    },
}
