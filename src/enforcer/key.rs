//! Keys and the records they contribute to a zone.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Seconds since the start of the simulated (or real) clock.
pub type Timestamp = u64;

//------------ RecordKind ----------------------------------------------------

/// The kinds of record a key can contribute to the zone or its parent.
///
/// The order of the variants is the order in which the scheduler visits
/// the records of a key.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum RecordKind {
    /// The DS record at the parent.
    #[serde(rename = "DS")]
    Ds,

    /// The DNSKEY record in the apex DNSKEY RRset.
    #[serde(rename = "DNSKEY")]
    Dnskey,

    /// The signature over the DNSKEY RRset.
    #[serde(rename = "RRSIG-DNSKEY")]
    RrsigDnskey,

    /// The signatures over the zone data.
    #[serde(rename = "RRSIG")]
    RrsigData,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Ds,
        RecordKind::Dnskey,
        RecordKind::RrsigDnskey,
        RecordKind::RrsigData,
    ];

    pub fn is_signature(self) -> bool {
        matches!(self, RecordKind::RrsigDnskey | RecordKind::RrsigData)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Ds => "DS",
            RecordKind::Dnskey => "DNSKEY",
            RecordKind::RrsigDnskey => "RRSIG-DNSKEY",
            RecordKind::RrsigData => "RRSIG",
        })
    }
}

//------------ RecordState ---------------------------------------------------

/// How far a record has propagated through the caches of the world.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Not published and not in any cache.
    Hidden,

    /// Published, but caches may still hold the old situation.
    Rumoured,

    /// Published and present in every cache that matters.
    Omnipresent,

    /// Withdrawn, but caches may still hold it.
    Unretentive,
}

impl RecordState {
    /// Single letter abbreviation used in compact listings.
    pub fn letter(self) -> char {
        match self {
            RecordState::Hidden => 'H',
            RecordState::Rumoured => 'R',
            RecordState::Omnipresent => 'O',
            RecordState::Unretentive => 'U',
        }
    }

    /// Symbol used when drawing a timeline of a record.
    pub fn timeline_symbol(self) -> char {
        match self {
            RecordState::Hidden => ' ',
            RecordState::Rumoured => '+',
            RecordState::Omnipresent => '|',
            RecordState::Unretentive => '-',
        }
    }

    /// Whether the record is published or still in caches.
    pub fn is_visible(self) -> bool {
        matches!(self, RecordState::Rumoured | RecordState::Omnipresent)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordState::Hidden => "hidden",
            RecordState::Rumoured => "rumoured",
            RecordState::Omnipresent => "omnipresent",
            RecordState::Unretentive => "unretentive",
        })
    }
}

impl FromStr for RecordState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hidden" | "h" => Ok(RecordState::Hidden),
            "rumoured" | "r" => Ok(RecordState::Rumoured),
            "omnipresent" | "o" => Ok(RecordState::Omnipresent),
            "unretentive" | "u" => Ok(RecordState::Unretentive),
            _ => Err(format!("unknown record state '{s}'")),
        }
    }
}

//------------ Record --------------------------------------------------------

/// One of the records a key contributes, as far as the enforcer tracks it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Record {
    /// How far the record has propagated.
    pub state: RecordState,

    /// When the state was last changed.
    pub last_change: Timestamp,
}

//------------ Roles ---------------------------------------------------------

/// The roles a key plays in the zone.
///
/// A key with both roles is a combined signing key (CSK).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Roles {
    pub ksk: bool,
    pub zsk: bool,
}

impl Roles {
    pub const KSK: Roles = Roles {
        ksk: true,
        zsk: false,
    };
    pub const ZSK: Roles = Roles {
        ksk: false,
        zsk: true,
    };
    pub const CSK: Roles = Roles {
        ksk: true,
        zsk: true,
    };

    pub fn is_empty(self) -> bool {
        !self.ksk && !self.zsk
    }

    /// Whether a key with these roles has a record of the given kind.
    pub fn has(self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::Dnskey => !self.is_empty(),
            RecordKind::Ds | RecordKind::RrsigDnskey => self.ksk,
            RecordKind::RrsigData => self.zsk,
        }
    }

    /// The record kinds owned by a key with these roles, in visiting order.
    pub fn kinds(self) -> impl Iterator<Item = RecordKind> {
        RecordKind::ALL.into_iter().filter(move |kind| self.has(*kind))
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match (self.ksk, self.zsk) {
            (true, true) => "CSK",
            (true, false) => "KSK",
            (false, true) => "ZSK",
            (false, false) => "none",
        })
    }
}

impl FromStr for Roles {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "KSK" => Ok(Roles::KSK),
            "ZSK" => Ok(Roles::ZSK),
            "CSK" => Ok(Roles::CSK),
            _ => Err(format!("unknown key role '{s}', expected KSK, ZSK or CSK")),
        }
    }
}

impl Serialize for Roles {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Roles {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//------------ Goal ----------------------------------------------------------

/// What the operator wants to happen with a key.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    /// Introduce the key into the zone.
    Omnipresent,

    /// Remove the key from the zone.
    Hidden,
}

impl Goal {
    /// The record state that satisfies this goal.
    pub fn target(self) -> RecordState {
        match self {
            Goal::Omnipresent => RecordState::Omnipresent,
            Goal::Hidden => RecordState::Hidden,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.target(), f)
    }
}

//------------ KeyId ---------------------------------------------------------

/// Handle of a key in a [`KeyCollection`](super::KeyCollection).
///
/// Handles are handed out in creation order and never reused.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct KeyId(pub(crate) u32);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//------------ Key -----------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Key {
    id: KeyId,
    name: String,
    algorithm: u8,
    roles: Roles,
    goal: Goal,
    records: BTreeMap<RecordKind, Record>,
}

impl Key {
    pub(crate) fn new(
        id: KeyId,
        name: String,
        algorithm: u8,
        roles: Roles,
        goal: Goal,
        initial: RecordState,
    ) -> Self {
        let record = Record {
            state: initial,
            last_change: 0,
        };
        Key {
            id,
            name,
            algorithm,
            roles,
            goal,
            records: roles.kinds().map(|kind| (kind, record)).collect(),
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    pub fn roles(&self) -> Roles {
        self.roles
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    pub(crate) fn set_goal(&mut self, goal: Goal) {
        self.goal = goal;
    }

    pub fn is_ksk(&self) -> bool {
        self.roles.ksk
    }

    pub fn is_zsk(&self) -> bool {
        self.roles.zsk
    }

    pub fn record(&self, kind: RecordKind) -> Option<&Record> {
        self.records.get(&kind)
    }

    pub fn records(&self) -> impl Iterator<Item = (RecordKind, &Record)> + '_ {
        self.records.iter().map(|(kind, record)| (*kind, record))
    }

    pub fn state(&self, kind: RecordKind) -> Option<RecordState> {
        self.records.get(&kind).map(|record| record.state)
    }

    /// Whether the key owns a record of this kind in the given state.
    pub fn is(&self, kind: RecordKind, state: RecordState) -> bool {
        self.state(kind) == Some(state)
    }

    pub(crate) fn set_state(&mut self, kind: RecordKind, state: RecordState, now: Timestamp) {
        if let Some(record) = self.records.get_mut(&kind) {
            record.state = state;
            record.last_change = now;
        }
    }

    /// Whether every record of the key has reached the key's goal.
    pub fn at_goal(&self) -> bool {
        let target = self.goal.target();
        self.records.values().all(|record| record.state == target)
    }

    /// The latest change of any record of the key.
    pub fn last_change(&self) -> Timestamp {
        self.records
            .values()
            .map(|record| record.last_change)
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.roles, self.id)
    }
}
