use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{bail, ensure, Result};

use super::key::{Goal, Key, KeyId, RecordKind, RecordState, Roles};

//------------ KeyCollection -------------------------------------------------

/// The keys of a single zone.
///
/// Keys are listed in the order in which they were created. The scheduler
/// visits them by name instead, so that the outcome of a step does not
/// depend on that order.
#[derive(Clone, Debug, Default)]
pub struct KeyCollection {
    keys: BTreeMap<KeyId, Key>,
    next_id: u32,
}

impl KeyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key with every record in the `initial` state.
    ///
    /// The records are treated as having been in that state since the
    /// beginning of time.
    pub fn create_key(
        &mut self,
        name: impl Into<String>,
        algorithm: u8,
        roles: Roles,
        goal: Goal,
        initial: RecordState,
    ) -> Result<KeyId> {
        let name = name.into();
        ensure!(!name.is_empty(), "a key needs a name");
        ensure!(
            !roles.is_empty(),
            "key {} needs at least one of the KSK and ZSK roles",
            name
        );
        if self.find(&name).is_some() {
            bail!("a key named {} already exists", name);
        }

        let id = KeyId(self.next_id);
        self.next_id += 1;
        self.keys
            .insert(id, Key::new(id, name, algorithm, roles, goal, initial));
        Ok(id)
    }

    /// Change what the operator wants to happen with a key.
    pub fn set_goal(&mut self, id: KeyId, goal: Goal) -> Result<()> {
        let Some(key) = self.keys.get_mut(&id) else {
            bail!("no key with handle {}", id);
        };
        key.set_goal(goal);
        Ok(())
    }

    pub fn get(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(&id)
    }

    pub fn find(&self, name: &str) -> Option<&Key> {
        self.keys.values().find(|key| key.name() == name)
    }

    /// Iterate over the keys in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Key> + '_ {
        self.keys.values()
    }

    pub fn ids(&self) -> Vec<KeyId> {
        self.keys.keys().copied().collect()
    }

    /// The handles of all keys, ordered by key name.
    pub fn ids_by_name(&self) -> Vec<KeyId> {
        let mut keys: Vec<&Key> = self.iter().collect();
        keys.sort_by(|a, b| a.name().cmp(b.name()));
        keys.into_iter().map(Key::id).collect()
    }

    /// The keys that share an algorithm with `key`, `key` itself included.
    pub fn siblings<'a>(&'a self, key: &'a Key) -> impl Iterator<Item = &'a Key> + 'a {
        self.iter()
            .filter(move |other| other.algorithm() == key.algorithm())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The total number of records of all keys.
    pub fn record_count(&self) -> usize {
        self.iter().map(|key| key.roles().kinds().count()).sum()
    }

    pub(crate) fn set_state(
        &mut self,
        id: KeyId,
        kind: RecordKind,
        state: RecordState,
        now: u64,
    ) {
        if let Some(key) = self.keys.get_mut(&id) {
            key.set_state(kind, state, now);
        }
    }

    pub(crate) fn remove(&mut self, id: KeyId) -> Option<Key> {
        self.keys.remove(&id)
    }

    /// A copy of the externally visible state of every key.
    pub fn snapshot(&self) -> Vec<KeySnapshot> {
        self.iter().map(KeySnapshot::from).collect()
    }
}

//------------ KeySnapshot ---------------------------------------------------

/// The state of a key at one point in time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct KeySnapshot {
    pub id: KeyId,
    pub name: String,
    pub algorithm: u8,
    pub roles: Roles,
    pub goal: Goal,
    pub records: BTreeMap<RecordKind, RecordState>,
    pub signer: SignerFlags,
}

impl KeySnapshot {
    pub fn state(&self, kind: RecordKind) -> Option<RecordState> {
        self.records.get(&kind).copied()
    }

    /// The states of the records as letters, in visiting order.
    ///
    /// Records the key does not have are shown as `_`.
    pub fn letters(&self) -> String {
        RecordKind::ALL
            .iter()
            .map(|kind| self.state(*kind).map_or('_', RecordState::letter))
            .collect()
    }
}

impl From<&Key> for KeySnapshot {
    fn from(key: &Key) -> Self {
        KeySnapshot {
            id: key.id(),
            name: key.name().into(),
            algorithm: key.algorithm(),
            roles: key.roles(),
            goal: key.goal(),
            records: key.records().map(|(kind, r)| (kind, r.state)).collect(),
            signer: SignerFlags::from(key),
        }
    }
}

//------------ SignerFlags ---------------------------------------------------

/// What a signer has to do with a key.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SignerFlags {
    /// The DNSKEY has to be included in the DNSKEY RRset.
    pub publish: bool,

    /// The key has to sign the DNSKEY RRset.
    pub sign_dnskey: bool,

    /// The key has to sign the zone data.
    pub sign_data: bool,
}

impl From<&Key> for SignerFlags {
    fn from(key: &Key) -> Self {
        let visible =
            |kind| key.state(kind).is_some_and(RecordState::is_visible);
        SignerFlags {
            publish: visible(RecordKind::Dnskey),
            sign_dnskey: visible(RecordKind::RrsigDnskey),
            sign_data: visible(RecordKind::RrsigData),
        }
    }
}
