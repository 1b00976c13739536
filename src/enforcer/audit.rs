//! Checking that a key collection leaves the zone validatable.
//!
//! The auditor knows nothing about the rules. It looks at the states the
//! way a resolver would see them and is used to verify the outcome of every
//! step.
use std::fmt;

use super::collection::KeyCollection;
use super::key::{Key, RecordKind, RecordState};

use RecordKind::{Dnskey, Ds, RrsigData, RrsigDnskey};
use RecordState::{Hidden, Omnipresent};

//------------ View ----------------------------------------------------------

/// What a resolver can rely on in a key collection.
#[derive(Clone, Copy)]
struct View<'a> {
    keys: &'a KeyCollection,
}

impl<'a> View<'a> {
    fn new(keys: &'a KeyCollection) -> Self {
        View { keys }
    }

    /// The key has a complete chain from the parent down to the DNSKEY RRset.
    fn ksk_chain(&self, key: &Key) -> bool {
        key.is_ksk()
            && key.is(Ds, Omnipresent)
            && key.is(Dnskey, Omnipresent)
            && key.is(RrsigDnskey, Omnipresent)
    }

    /// The key has a complete chain from the DNSKEY RRset down to the data.
    fn zsk_chain(&self, key: &Key) -> bool {
        key.is_zsk() && key.is(Dnskey, Omnipresent) && key.is(RrsigData, Omnipresent)
    }

    /// Every signature the key is supposed to make is omnipresent.
    fn signed(&self, key: &Key) -> bool {
        (!key.is_ksk() || key.is(RrsigDnskey, Omnipresent))
            && (!key.is_zsk() || key.is(RrsigData, Omnipresent))
    }

    /// Whether a DS pointing at `key` can be followed.
    ///
    /// Either the key itself is in the DNSKEY RRset and signs it, or some
    /// other key of the same algorithm provides a complete chain.
    fn ds_backed(&self, key: &Key) -> bool {
        (key.is(Dnskey, Omnipresent) && key.is(RrsigDnskey, Omnipresent))
            || self.keys.siblings(key).any(|other| self.ksk_chain(other))
    }

    /// Whether the signatures a DNSKEY promises can be found.
    fn dnskey_backed(&self, key: &Key) -> bool {
        self.signed(key) || self.keys.siblings(key).any(|other| self.zsk_chain(other))
    }

    /// Whether some algorithm has a chain from the parent down to the data.
    fn secure(&self) -> bool {
        self.keys.iter().any(|key| {
            self.ksk_chain(key) && self.keys.siblings(key).any(|other| self.zsk_chain(other))
        })
    }

    /// Check every clause and report the first one that does not hold.
    fn check(&self) -> Result<(), Violation> {
        for key in self.keys.iter() {
            if key.is_ksk() && !key.is(Ds, Hidden) && !self.ds_backed(key) {
                return Err(Violation::DanglingDs(key.to_string()));
            }
            if !key.is(Dnskey, Hidden) && !self.dnskey_backed(key) {
                return Err(Violation::UnsignedDnskey(key.to_string()));
            }
        }
        if !self.secure() {
            return Err(Violation::Insecure);
        }
        Ok(())
    }
}

//------------ Violation -----------------------------------------------------

/// The reason a key collection fails the audit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Violation {
    /// A DS is (or may be) seen that leads to no signed DNSKEY RRset.
    DanglingDs(String),

    /// A DNSKEY is (or may be) seen without the signatures it promises.
    UnsignedDnskey(String),

    /// No algorithm has an omnipresent chain from the parent to the data.
    Insecure,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DanglingDs(key) => {
                write!(f, "the DS of {key} does not lead to a signed DNSKEY RRset")
            }
            Violation::UnsignedDnskey(key) => {
                write!(f, "the DNSKEY of {key} is visible without its signatures")
            }
            Violation::Insecure => {
                f.write_str("no algorithm has a complete chain of trust")
            }
        }
    }
}

//------------ Auditor -------------------------------------------------------

/// Whether every resolver can validate the zone given the current states.
pub fn is_valid(keys: &KeyCollection) -> bool {
    audit(keys).is_ok()
}

/// Like [`is_valid`], but report what is wrong.
pub fn audit(keys: &KeyCollection) -> Result<(), Violation> {
    View::new(keys).check()
}
