// # Inbound Settings Codec
//
// Wraps the JSON document stored in `inbounds.settings`.
//
// Only the `clients` array is ever decoded into values and rewritten.
// Every sibling key keeps its raw text, in its original order, so a rewrite
// leaves protocol configuration the panel owns byte-for-byte intact
// (number spelling and string escapes included).

use std::fmt;

use serde::de::{Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::Value;
use serde_json::value::RawValue;
use thiserror::Error;

use super::client::ClientRecord;

const CLIENTS: &str = "clients";

/// Why a settings document was not usable
///
/// These never leave the directory reader: an inbound that fails to decode
/// simply contributes no clients.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("settings is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("settings is not a JSON object")]
    NotAnObject,

    #[error("settings.clients is not an array")]
    ClientsNotArray,
}

/// Top-level members of a settings object, values left unparsed
struct RawMembers(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for RawMembers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = RawMembers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawMembers, A::Error> {
                let mut members = Vec::new();
                while let Some(member) = map.next_entry::<String, Box<RawValue>>()? {
                    members.push(member);
                }
                Ok(RawMembers(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}

/// Parsed `inbounds.settings` document
#[derive(Debug, Clone)]
pub struct InboundSettings {
    members: Vec<(String, Box<RawValue>)>,
    /// Position of the `clients` member, if present
    clients_at: Option<usize>,
    clients: Vec<Value>,
    /// Set once `clients` may have changed
    dirty: bool,
}

impl InboundSettings {
    /// Parse a settings document
    ///
    /// A missing or `null` `clients` field is treated as an empty list.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let RawMembers(members) = match serde_json::from_str::<RawMembers>(raw) {
            Ok(members) => members,
            Err(e) => {
                // Well-formed JSON of another shape
                serde_json::from_str::<IgnoredAny>(raw)?;
                return Err(if e.is_data() { DecodeError::NotAnObject } else { e.into() });
            }
        };

        // Last duplicate wins, as with a plain object decode
        let clients_at = members.iter().rposition(|(key, _)| key == CLIENTS);
        let clients = match clients_at {
            None => Vec::new(),
            Some(at) => match serde_json::from_str::<Value>(members[at].1.get())? {
                Value::Null => Vec::new(),
                Value::Array(clients) => clients,
                _ => return Err(DecodeError::ClientsNotArray),
            },
        };

        Ok(Self {
            members,
            clients_at,
            clients,
            dirty: false,
        })
    }

    /// Embedded client entries
    pub fn clients(&self) -> &[Value] {
        &self.clients
    }

    /// Mutable access to the client entries, if the document has any
    pub fn clients_mut(&mut self) -> Option<&mut Vec<Value>> {
        let at = self.clients_at?;
        if self.members[at].1.get() == "null" {
            return None;
        }
        self.dirty = true;
        Some(&mut self.clients)
    }

    /// Keep only the clients for which `keep` returns `true`
    ///
    /// Returns the number of entries removed.
    pub fn retain_clients(&mut self, mut keep: impl FnMut(&Value) -> bool) -> usize {
        let Some(clients) = self.clients_mut() else {
            return 0;
        };
        let before = clients.len();
        clients.retain(|client| keep(client));
        before - clients.len()
    }

    /// Flatten the clients into directory records
    pub fn records(&self, inbound_id: i64, port: i64) -> impl Iterator<Item = ClientRecord> + '_ {
        self.clients()
            .iter()
            .map(move |client| ClientRecord::from_value(inbound_id, port, client))
    }

    /// Serialize back to the column format
    ///
    /// Siblings are written from their raw text; `clients` is re-encoded
    /// only after mutable access.
    pub fn to_json(&self) -> Result<String, crate::Error> {
        let mut out = String::from("{");
        for (at, (key, raw)) in self.members.iter().enumerate() {
            if at > 0 {
                out.push(',');
            }
            out.push_str(&serde_json::to_string(key)?);
            out.push(':');
            if self.dirty && Some(at) == self.clients_at {
                out.push_str(&serde_json::to_string(&self.clients)?);
            } else {
                out.push_str(raw.get());
            }
        }
        out.push('}');
        Ok(out)
    }
}
