use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use camlink_frame::{MessageKind, RawMessage};
use tracing::{trace, warn};

use crate::envelope::ParsedEnvelope;
use crate::value::Value;

/// Which identifier namespace an asynchronous value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Setting,
    Status,
}

type Decoder = Arc<dyn Fn(&[u8]) -> Option<Value> + Send + Sync>;

/// Builder for [`IdRegistry`]. Register decoders, then `build()`; the
/// resulting registry is immutable.
#[derive(Default)]
pub struct RegistryBuilder {
    settings: HashMap<u8, Decoder>,
    statuses: HashMap<u8, Decoder>,
    commands: HashMap<(u8, u8), Decoder>,
    list_valued: HashSet<(Domain, u8)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for a setting identifier.
    pub fn setting(
        mut self,
        id: u8,
        decoder: impl Fn(&[u8]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.settings.insert(id, Arc::new(decoder));
        self
    }

    /// Register a decoder for a status identifier.
    pub fn status(
        mut self,
        id: u8,
        decoder: impl Fn(&[u8]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.statuses.insert(id, Arc::new(decoder));
        self
    }

    /// Register a decoder for one sub-parameter of a command response.
    pub fn command(
        mut self,
        command_id: u8,
        param_id: u8,
        decoder: impl Fn(&[u8]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.commands.insert((command_id, param_id), Arc::new(decoder));
        self
    }

    /// Mark an identifier as list-valued: it may legally repeat within one
    /// message, accumulating values.
    pub fn list_valued(mut self, domain: Domain, id: u8) -> Self {
        self.list_valued.insert((domain, id));
        self
    }

    pub fn build(self) -> IdRegistry {
        IdRegistry {
            settings: self.settings,
            statuses: self.statuses,
            commands: self.commands,
            list_valued: self.list_valued,
        }
    }
}

/// Immutable mapping from numeric identifiers to decode functions.
///
/// Supplied to the communicator at construction. Lookups that miss decode to
/// opaque bytes; decoders that reject their input degrade the same way.
pub struct IdRegistry {
    settings: HashMap<u8, Decoder>,
    statuses: HashMap<u8, Decoder>,
    commands: HashMap<(u8, u8), Decoder>,
    list_valued: HashSet<(Domain, u8)>,
}

impl IdRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// An empty registry: everything decodes opaque.
    pub fn empty() -> Self {
        RegistryBuilder::new().build()
    }

    pub fn is_list_valued(&self, domain: Domain, id: u8) -> bool {
        self.list_valued.contains(&(domain, id))
    }

    /// Decode a structurally parsed message into a typed envelope.
    ///
    /// Never fails: unknown identifiers and rejected inputs yield
    /// `Value::Bytes` so protocol extensions pass through unharmed.
    pub fn decode(&self, raw: &RawMessage) -> ParsedEnvelope {
        let domain = value_domain(raw.kind);
        let mut seen: HashSet<u8> = HashSet::new();
        let mut values = Vec::with_capacity(raw.params.len());

        for param in &raw.params {
            if !seen.insert(param.id) {
                let repeat_allowed =
                    domain.is_some_and(|domain| self.is_list_valued(domain, param.id));
                if !repeat_allowed {
                    warn!(
                        identifier = raw.identifier,
                        param_id = param.id,
                        "repeated parameter not marked list-valued"
                    );
                }
            }

            let decoder = match domain {
                Some(Domain::Setting) => self.settings.get(&param.id),
                Some(Domain::Status) => self.statuses.get(&param.id),
                None => self.commands.get(&(raw.identifier, param.id)),
            };

            let value = match decoder {
                Some(decoder) => decoder(&param.value).unwrap_or_else(|| {
                    warn!(
                        identifier = raw.identifier,
                        param_id = param.id,
                        len = param.value.len(),
                        "registered decoder rejected value, keeping raw bytes"
                    );
                    Value::Bytes(param.value.clone())
                }),
                None => {
                    trace!(
                        identifier = raw.identifier,
                        param_id = param.id,
                        "no decoder registered, keeping raw bytes"
                    );
                    Value::Bytes(param.value.clone())
                }
            };

            values.push((param.id, value));
        }

        ParsedEnvelope {
            kind: raw.kind,
            identifier: raw.identifier,
            status: raw.status,
            values,
        }
    }
}

/// Which namespace a message kind's parameters are identified in. Command
/// responses use per-command sub-parameter IDs instead.
fn value_domain(kind: MessageKind) -> Option<Domain> {
    match kind {
        MessageKind::SettingPush | MessageKind::SettingResponse => Some(Domain::Setting),
        MessageKind::StatusPush | MessageKind::StatusResponse => Some(Domain::Status),
        MessageKind::QueryResponse => None,
    }
}

impl fmt::Debug for IdRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdRegistry")
            .field("settings", &self.settings.len())
            .field("statuses", &self.statuses.len())
            .field("commands", &self.commands.len())
            .field("list_valued", &self.list_valued.len())
            .finish()
    }
}
