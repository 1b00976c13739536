//! Reading keys, policy and options from JSON files.
use std::fmt;
use std::fs::File;
use std::path::Path;

use domain::base::iana::SecurityAlgorithm;
use serde::{Deserialize, Serialize};

use crate::enforcer::{Goal, KeyCollection, Policy, RecordState, Roles, RuleOptions};
use crate::error::{Context, Error, Result};

//------------ Config --------------------------------------------------------

/// The timing policy and rule options, as read from a config file.
///
/// Both parts are optional. Whatever is missing takes its default.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub policy: Policy,
    pub options: RuleOptions,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path).with_context(|| format!("loading config from {}", path.display()))
    }
}

//------------ KeySpec -------------------------------------------------------

/// A key as it exists before the enforcer gets to it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeySpec {
    pub name: String,
    pub algorithm: Algorithm,
    pub role: Roles,
    pub goal: Goal,

    /// The state of all records of the key.
    pub state: RecordState,
}

impl KeySpec {
    pub fn new(
        name: &str,
        algorithm: SecurityAlgorithm,
        role: Roles,
        goal: Goal,
        state: RecordState,
    ) -> Self {
        KeySpec {
            name: name.into(),
            algorithm: Algorithm(algorithm.to_int()),
            role,
            goal,
            state,
        }
    }
}

/// The contents of a key file.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeyFile {
    pub keys: Vec<KeySpec>,
}

impl KeyFile {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path).with_context(|| format!("loading keys from {}", path.display()))
    }
}

/// Create a key collection holding the given keys, in the given order.
pub fn build_keys<'a>(specs: impl IntoIterator<Item = &'a KeySpec>) -> Result<KeyCollection> {
    let mut keys = KeyCollection::new();
    for spec in specs {
        keys.create_key(
            spec.name.as_str(),
            spec.algorithm.0,
            spec.role,
            spec.goal,
            spec.state,
        )?;
    }
    Ok(keys)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err::<Error, _>(|e| format!("unable to open file {}: {e}", path.display()).into())?;
    serde_json::from_reader(file)
        .map_err(|e| format!("error parsing {}: {e}", path.display()).into())
}

//------------ Algorithm -----------------------------------------------------

/// A DNSSEC algorithm number, written as a number or a mnemonic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Algorithm(pub u8);

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&SecurityAlgorithm::from_int(self.0), f)
    }
}

impl Serialize for Algorithm {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u8),
            Mnemonic(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(number) => Ok(Algorithm(number)),
            Repr::Mnemonic(mnemonic) => parse_algorithm(&mnemonic)
                .map(Algorithm)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Parse a DNSSEC algorithm from its number or mnemonic.
pub fn parse_algorithm(arg: &str) -> Result<u8> {
    if let Ok(num) = arg.parse() {
        Ok(num)
    } else {
        SecurityAlgorithm::from_mnemonic(arg.as_bytes())
            .map(|alg| alg.to_int())
            .ok_or_else(|| format!("unknown algorithm mnemonic '{arg}'").into())
    }
}
