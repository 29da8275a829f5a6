//! The bundled module: an ordered handler table in the runtime's paste format
//!
//! ```json
//! {
//!   "slots": { "0": { "name": "slot1", "type": { "events": [], "methods": [] } }, ... },
//!   "handlers": [
//!     { "code": "...", "filter": { "args": [], "signature": "start", "slotKey": "-1" }, "key": "0" }
//!   ],
//!   "methods": [],
//!   "events": []
//! }
//! ```

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::types::FxIndexMap;

/// One of the ten numbered sub-units linked to a programmable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Slot1,
    Slot2,
    Slot3,
    Slot4,
    Slot5,
    Slot6,
    Slot7,
    Slot8,
    Slot9,
    Slot10,
}

impl Slot {
    pub const ALL: [Self; 10] = [
        Self::Slot1,
        Self::Slot2,
        Self::Slot3,
        Self::Slot4,
        Self::Slot5,
        Self::Slot6,
        Self::Slot7,
        Self::Slot8,
        Self::Slot9,
        Self::Slot10,
    ];

    /// Zero-based dispatch index, as used in `slotKey`
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Name the runtime exposes the slot under in handler code (`slot1`..`slot10`)
    pub fn name(self) -> String {
        format!("slot{}", self.index() + 1)
    }
}

/// Dispatch category a handler is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Unit,
    System,
    Library,
    Slot(Slot),
}

impl SlotKey {
    /// Every category in the order the runtime lists them
    pub fn all() -> impl Iterator<Item = Self> {
        Slot::ALL
            .into_iter()
            .map(Self::Slot)
            .chain([Self::Unit, Self::System, Self::Library])
    }

    pub fn code(self) -> i8 {
        match self {
            Self::Unit => -1,
            Self::System => -2,
            Self::Library => -3,
            Self::Slot(slot) => slot.index() as i8,
        }
    }

    fn name(self) -> String {
        match self {
            Self::Unit => "unit".to_owned(),
            Self::System => "system".to_owned(),
            Self::Library => "library".to_owned(),
            Self::Slot(slot) => slot.name(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Positional argument matcher of a handler filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgMatcher {
    /// Matches any value (`{"variable": "*"}`)
    Wildcard,
    /// Matches exactly this value (`{"value": "..."}`)
    Literal(String),
}

impl Serialize for ArgMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Wildcard => map.serialize_entry("variable", "*")?,
            Self::Literal(value) => map.serialize_entry("value", value)?,
        }
        map.end()
    }
}

/// When a handler fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerFilter {
    pub args: Vec<ArgMatcher>,
    pub signature: String,
    pub slot_key: SlotKey,
}

/// A code body bound to a dispatch filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputHandler {
    pub code: String,
    pub filter: HandlerFilter,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
struct SlotType {
    events: Vec<String>,
    methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SlotDescriptor {
    name: String,
    #[serde(rename = "type")]
    kind: SlotType,
}

/// Ordered handler table plus the fixed slot metadata the runtime expects
#[derive(Debug, Clone, Serialize)]
pub struct OutputModule {
    slots: FxIndexMap<String, SlotDescriptor>,
    handlers: Vec<OutputHandler>,
    methods: Vec<String>,
    events: Vec<String>,
}

impl Default for OutputModule {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputModule {
    pub fn new() -> Self {
        let slots = SlotKey::all()
            .map(|slot_key| {
                (
                    slot_key.to_string(),
                    SlotDescriptor {
                        name: slot_key.name(),
                        kind: SlotType {
                            events: Vec::new(),
                            methods: Vec::new(),
                        },
                    },
                )
            })
            .collect();

        Self {
            slots,
            handlers: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Append a handler keyed by its position and return that key
    pub fn push_handler(
        &mut self,
        slot_key: SlotKey,
        signature: impl Into<String>,
        args: Vec<ArgMatcher>,
        code: String,
    ) -> usize {
        let key = self.handlers.len();
        self.handlers.push(OutputHandler {
            code,
            filter: HandlerFilter {
                args,
                signature: signature.into(),
                slot_key,
            },
            key: key.to_string(),
        });
        key
    }

    pub fn handlers(&self) -> &[OutputHandler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Pretty-printed JSON artifact
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
