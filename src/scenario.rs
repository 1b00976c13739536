//! Built-in rollover scenarios.
use domain::base::iana::SecurityAlgorithm;

use crate::config::{build_keys, KeySpec};
use crate::enforcer::{Goal, KeyCollection, RecordState, Roles};
use crate::error::Result;

/// A set of keys in the middle of a rollover.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub keys: Vec<KeySpec>,

    /// Whether all keys are expected to reach their goal.
    pub settles: bool,
}

impl Scenario {
    pub fn key_collection(&self) -> Result<KeyCollection> {
        build_keys(&self.keys)
    }
}

const OLD: SecurityAlgorithm = SecurityAlgorithm::RSASHA256;
const NEW: SecurityAlgorithm = SecurityAlgorithm::ECDSAP256SHA256;

/// A key that is to stay.
fn stays(name: &str, algorithm: SecurityAlgorithm, role: Roles) -> KeySpec {
    KeySpec::new(name, algorithm, role, Goal::Omnipresent, RecordState::Omnipresent)
}

/// A key that is to be removed.
fn leaves(name: &str, algorithm: SecurityAlgorithm, role: Roles) -> KeySpec {
    KeySpec::new(name, algorithm, role, Goal::Hidden, RecordState::Omnipresent)
}

/// A key that is to be introduced.
fn enters(name: &str, algorithm: SecurityAlgorithm, role: Roles) -> KeySpec {
    KeySpec::new(name, algorithm, role, Goal::Omnipresent, RecordState::Hidden)
}

/// All built-in scenarios.
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "zsk-rollover",
            description: "replace the zone signing key",
            keys: vec![
                stays("KSK1", OLD, Roles::KSK),
                leaves("ZSK1", OLD, Roles::ZSK),
                enters("ZSK2", OLD, Roles::ZSK),
            ],
            settles: true,
        },
        Scenario {
            name: "ksk-rollover",
            description: "replace the key signing key",
            keys: vec![
                leaves("KSK1", OLD, Roles::KSK),
                enters("KSK2", OLD, Roles::KSK),
                stays("ZSK1", OLD, Roles::ZSK),
            ],
            settles: true,
        },
        Scenario {
            name: "double-rollover",
            description: "replace both the key and the zone signing key",
            keys: vec![
                leaves("KSK1", OLD, Roles::KSK),
                enters("KSK2", OLD, Roles::KSK),
                leaves("ZSK1", OLD, Roles::ZSK),
                enters("ZSK2", OLD, Roles::ZSK),
            ],
            settles: true,
        },
        Scenario {
            name: "algorithm-rollover",
            description: "replace a KSK and ZSK by a pair using a new algorithm",
            keys: vec![
                leaves("KSK1", OLD, Roles::KSK),
                enters("KSK2", NEW, Roles::KSK),
                leaves("ZSK1", OLD, Roles::ZSK),
                enters("ZSK2", NEW, Roles::ZSK),
            ],
            settles: true,
        },
        Scenario {
            name: "csk-rollover",
            description: "replace the combined signing key",
            keys: vec![leaves("CSK1", NEW, Roles::CSK), enters("CSK2", NEW, Roles::CSK)],
            settles: true,
        },
        Scenario {
            name: "csk-algorithm-rollover",
            description: "replace the combined signing key by one using a new algorithm",
            keys: vec![leaves("CSK1", OLD, Roles::CSK), enters("CSK2", NEW, Roles::CSK)],
            settles: true,
        },
        Scenario {
            name: "csk-split",
            description: "replace the combined signing key by a KSK and ZSK",
            keys: vec![
                leaves("CSK1", OLD, Roles::CSK),
                enters("KSK2", OLD, Roles::KSK),
                enters("ZSK2", OLD, Roles::ZSK),
            ],
            settles: true,
        },
        Scenario {
            name: "csk-merge",
            description: "replace a KSK and ZSK by a combined signing key",
            keys: vec![
                leaves("KSK1", OLD, Roles::KSK),
                leaves("ZSK1", OLD, Roles::ZSK),
                enters("CSK2", OLD, Roles::CSK),
            ],
            settles: true,
        },
        Scenario {
            name: "csk-split-algorithm",
            description: "split the combined signing key while changing algorithm",
            keys: vec![
                leaves("CSK1", NEW, Roles::CSK),
                enters("KSK2", OLD, Roles::KSK),
                enters("ZSK2", OLD, Roles::ZSK),
            ],
            settles: true,
        },
        Scenario {
            name: "csk-merge-algorithm",
            description: "merge a KSK and ZSK into a combined signing key with a new algorithm",
            keys: vec![
                leaves("KSK1", OLD, Roles::KSK),
                leaves("ZSK1", OLD, Roles::ZSK),
                enters("CSK2", NEW, Roles::CSK),
            ],
            settles: true,
        },
        Scenario {
            name: "ksk-algorithm-stuck",
            description: "change the algorithm of the KSK only, which cannot complete",
            keys: vec![
                leaves("KSK1", OLD, Roles::KSK),
                enters("KSK2", NEW, Roles::KSK),
                leaves("ZSK1", OLD, Roles::ZSK),
            ],
            settles: false,
        },
    ]
}

/// Look up a built-in scenario by name.
pub fn scenario(name: &str) -> Option<Scenario> {
    scenarios().into_iter().find(|s| s.name == name)
}
