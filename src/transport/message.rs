use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::transport::error::{invalid_argument, TransportResult};

/// Ordered string-keyed JSON map used for event properties and group/user traits.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, Value>);

pub type Traits = FieldMap;
pub type Properties = FieldMap;

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub anonymous_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    pub event: String,
    #[serde(skip_serializing_if = "FieldMap::is_empty")]
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub anonymous_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(skip_serializing_if = "FieldMap::is_empty")]
    pub traits: Traits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub anonymous_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    pub group_id: String,
    #[serde(skip_serializing_if = "FieldMap::is_empty")]
    pub traits: Traits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A single outbound analytics call, tagged on the wire by its `type`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Track(Track),
    Identify(Identify),
    Group(Group),
}

impl Message {
    pub fn message_id(&self) -> &str {
        match self {
            Message::Track(m) => &m.message_id,
            Message::Identify(m) => &m.message_id,
            Message::Group(m) => &m.message_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Track(_) => "track",
            Message::Identify(_) => "identify",
            Message::Group(_) => "group",
        }
    }

    /// Checks the fields the ingestion endpoint requires for each message type.
    pub fn validate(&self) -> TransportResult<()> {
        let (anonymous_id, user_id) = match self {
            Message::Track(m) => {
                if m.event.is_empty() {
                    return Err(invalid_argument("track message is missing an event name"));
                }
                (&m.anonymous_id, &m.user_id)
            }
            Message::Identify(m) => (&m.anonymous_id, &m.user_id),
            Message::Group(m) => {
                if m.group_id.is_empty() {
                    return Err(invalid_argument("group message is missing a group id"));
                }
                (&m.anonymous_id, &m.user_id)
            }
        };
        if anonymous_id.is_empty() && user_id.is_empty() {
            return Err(invalid_argument(format!(
                "{} message requires a user id or an anonymous id",
                self.kind()
            )));
        }
        Ok(())
    }

    /// Fills in the message id and timestamp when the caller left them unset.
    pub(crate) fn fill_defaults(&mut self, message_id: impl FnOnce() -> String, now: DateTime<Utc>) {
        let (id, timestamp) = match self {
            Message::Track(m) => (&mut m.message_id, &mut m.timestamp),
            Message::Identify(m) => (&mut m.message_id, &mut m.timestamp),
            Message::Group(m) => (&mut m.message_id, &mut m.timestamp),
        };
        if id.is_empty() {
            *id = message_id();
        }
        timestamp.get_or_insert(now);
    }
}

impl From<Track> for Message {
    fn from(value: Track) -> Self {
        Message::Track(value)
    }
}

impl From<Identify> for Message {
    fn from(value: Identify) -> Self {
        Message::Identify(value)
    }
}

impl From<Group> for Message {
    fn from(value: Group) -> Self {
        Message::Group(value)
    }
}
