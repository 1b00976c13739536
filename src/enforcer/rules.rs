//! The transition rules.
//!
//! For every record of a key the rules decide which state it may move to
//! next, given the states of all other records in the zone. The rules only
//! look. Applying their outcome is up to the scheduler.
//!
//! A record is only withdrawn once another key of the same algorithm has
//! taken over whatever depends on it, or once nothing depends on it
//! anymore. When a whole algorithm leaves, another algorithm must have a
//! complete chain of its own.
use serde::{Deserialize, Serialize};

use super::collection::KeyCollection;
use super::key::{Goal, Key, RecordKind, RecordState, Timestamp};
use super::timing::Policy;

use RecordKind::{Dnskey, Ds, RrsigData, RrsigDnskey};
use RecordState::{Hidden, Omnipresent, Rumoured, Unretentive};

//------------ RuleOptions ---------------------------------------------------

/// Switches that make the rules more conservative.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RuleOptions {
    /// Only introduce a DS once the key's own DNSKEY and signature over
    /// the DNSKEY RRset are omnipresent.
    ///
    /// This keeps the number of records in flux at the parent down at the
    /// cost of a slower rollover.
    pub min_flux: bool,

    /// Only introduce signatures once the key's DNSKEY is omnipresent.
    ///
    /// This avoids having signatures for two keys in the zone at the same
    /// time. A new algorithm still has to start with its signatures.
    pub min_sig: bool,

    /// When a DNSKEY may be withdrawn.
    pub dnskey_retraction: DnskeyRetraction,
}

/// When a DNSKEY may be withdrawn.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DnskeyRetraction {
    /// As soon as another key of the algorithm takes over all its roles,
    /// or nothing depends on it anymore.
    #[default]
    Covered,

    /// Only after the key's data signatures are gone, unless another key
    /// of the algorithm cannot take over.
    SignaturesFirst,
}

//------------ Rules ---------------------------------------------------------

/// The rules as they apply at one moment in time.
#[derive(Clone, Copy, Debug)]
pub struct Rules<'a> {
    pub policy: &'a Policy,
    pub options: &'a RuleOptions,
    pub now: Timestamp,
}

impl Rules<'_> {
    /// The state the record of `kind` of `key` may move to.
    ///
    /// Returns the current state if the record has to stay put.
    ///
    /// # Panics
    ///
    /// If the key has no record of that kind.
    pub fn next_state(&self, keys: &KeyCollection, key: &Key, kind: RecordKind) -> RecordState {
        match kind {
            Ds => self.proc_ds(keys, key),
            Dnskey => self.proc_dnskey(keys, key),
            RrsigDnskey | RrsigData => self.proc_rrsig(keys, key, kind),
        }
    }

    /// The rule for the DS record.
    pub fn proc_ds(&self, keys: &KeyCollection, key: &Key) -> RecordState {
        let may_introduce = || {
            (key.is(Dnskey, Omnipresent) && key.is(RrsigDnskey, Omnipresent))
                || (!self.options.min_flux && others(keys, key).any(ksk_ready))
        };
        let may_withdraw = || {
            if replaced(keys, key) {
                return true;
            }

            // Leaving an algorithm: the DS must still lead to the key's own
            // signed DNSKEY while it drains, and no other DS of the
            // algorithm may be left behind.
            key.is(Dnskey, Omnipresent)
                && key.is(RrsigDnskey, Omnipresent)
                && others(keys, key).all(|other| gone(other, Ds))
                && chain_elsewhere(keys, key)
        };
        self.advance(key, Ds, may_introduce, may_withdraw)
    }

    /// The rule for the DNSKEY record.
    pub fn proc_dnskey(&self, keys: &KeyCollection, key: &Key) -> RecordState {
        let may_introduce = || self_signed(key) || others(keys, key).any(zsk_ready);
        let may_withdraw = || {
            let stand_in = others(keys, key).any(zsk_ready);
            if self.options.dnskey_retraction == DnskeyRetraction::SignaturesFirst
                && key.is_zsk()
                && !key.is(RrsigData, Hidden)
                && stand_in
            {
                return false;
            }

            // Nothing points at the key or depends on its signatures.
            if gone(key, Ds) && gone(key, RrsigDnskey) && gone(key, RrsigData) {
                return true;
            }

            // An unretentive DNSKEY is still seen and must come with
            // signatures.
            if !self_signed(key) && !stand_in {
                return false;
            }

            if replaced(keys, key) {
                return true;
            }

            // Leaving an algorithm: the DS is gone and no other DNSKEY of
            // the algorithm relies on the key's data signatures.
            gone(key, Ds)
                && (!key.is(RrsigData, Omnipresent)
                    || others(keys, key).all(|other| gone(other, Dnskey) || self_signed(other)))
                && chain_elsewhere(keys, key)
        };
        self.advance(key, Dnskey, may_introduce, may_withdraw)
    }

    /// The rule for both kinds of signature.
    pub fn proc_rrsig(&self, keys: &KeyCollection, key: &Key, kind: RecordKind) -> RecordState {
        debug_assert!(kind.is_signature());
        let may_introduce = || {
            !self.options.min_sig
                || key.is(Dnskey, Omnipresent)
                || !keys
                    .siblings(key)
                    .any(|other| other.is(Dnskey, Omnipresent))
        };
        // Once the DNSKEY is gone the signatures are of no use. Before
        // that, the visible DNSKEY needs another key's data signatures.
        let may_withdraw = || {
            key.is(Dnskey, Hidden) || (replaced(keys, key) && others(keys, key).any(zsk_ready))
        };
        self.advance(key, kind, may_introduce, may_withdraw)
    }

    /// The part of the rules that is the same for every kind of record.
    ///
    /// `may_introduce` decides whether a hidden record may be published,
    /// `may_withdraw` whether an omnipresent one may be withdrawn. Both
    /// are only asked when the key's goal calls for it.
    fn advance(
        &self,
        key: &Key,
        kind: RecordKind,
        may_introduce: impl Fn() -> bool,
        may_withdraw: impl Fn() -> bool,
    ) -> RecordState {
        let Some(record) = key.record(kind) else {
            panic!("{key} has no {kind} record");
        };
        match (record.state, key.goal()) {
            (Hidden, Goal::Omnipresent) if may_introduce() => Rumoured,
            (Rumoured, Goal::Hidden) => Unretentive,
            (Rumoured, Goal::Omnipresent)
                if self.policy.allows(record, kind, Omnipresent, self.now) =>
            {
                Omnipresent
            }
            (Omnipresent, Goal::Hidden) if may_withdraw() => Unretentive,
            (Unretentive, Goal::Omnipresent) => Rumoured,
            (Unretentive, Goal::Hidden) if self.policy.allows(record, kind, Hidden, self.now) => {
                Hidden
            }
            (state, _) => state,
        }
    }
}

/// The other keys of the same algorithm.
fn others<'a>(keys: &'a KeyCollection, key: &'a Key) -> impl Iterator<Item = &'a Key> + 'a {
    keys.siblings(key).filter(move |other| other.id() != key.id())
}

/// The key leads from the parent all the way into the DNSKEY RRset.
fn ksk_ready(key: &Key) -> bool {
    key.is_ksk()
        && key.is(Ds, Omnipresent)
        && key.is(Dnskey, Omnipresent)
        && key.is(RrsigDnskey, Omnipresent)
}

/// The key leads from the DNSKEY RRset all the way to the data.
fn zsk_ready(key: &Key) -> bool {
    key.is_zsk() && key.is(Dnskey, Omnipresent) && key.is(RrsigData, Omnipresent)
}

/// Every signature the key owns is omnipresent.
fn self_signed(key: &Key) -> bool {
    (!key.is_ksk() || key.is(RrsigDnskey, Omnipresent))
        && (!key.is_zsk() || key.is(RrsigData, Omnipresent))
}

/// The record is hidden or the key has no record of that kind.
fn gone(key: &Key, kind: RecordKind) -> bool {
    matches!(key.state(kind), None | Some(Hidden))
}

/// Every role of `key` is played by another ready key of the algorithm.
fn replaced(keys: &KeyCollection, key: &Key) -> bool {
    (!key.is_ksk() || others(keys, key).any(ksk_ready))
        && (!key.is_zsk() || others(keys, key).any(zsk_ready))
}

/// Another algorithm has a complete chain of its own.
fn chain_elsewhere(keys: &KeyCollection, key: &Key) -> bool {
    keys.iter()
        .filter(|other| other.algorithm() != key.algorithm())
        .any(|other| ksk_ready(other) && keys.siblings(other).any(zsk_ready))
}
