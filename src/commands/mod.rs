//! The commands of _keyroll_.
pub mod scenarios;
pub mod simulate;

use crate::env::Env;

use super::error::Error;

#[derive(Clone, Debug, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Run a rollover through time
    ///
    /// The enforcer is applied to the keys over and over, each time
    /// jumping ahead to the moment the next record may change. One line
    /// is printed per step, showing the state of every record of every
    /// key as a letter: H(idden), R(umoured), O(mnipresent) or
    /// U(nretentive), in the order DS, DNSKEY, RRSIG over the DNSKEY
    /// RRset and RRSIG over the zone data. Records a key does not have
    /// are shown as '_'.
    ///
    /// The run fails as soon as a step leaves the zone in a state that a
    /// validating resolver could not validate.
    #[command(name = "simulate", verbatim_doc_comment)]
    Simulate(self::simulate::Simulate),

    /// List the built-in scenarios
    #[command(name = "scenarios")]
    Scenarios(self::scenarios::Scenarios),
}

impl Command {
    pub fn execute(self, env: impl Env) -> Result<(), Error> {
        match self {
            Self::Simulate(simulate) => simulate.execute(env),
            Self::Scenarios(scenarios) => scenarios.execute(env),
        }
    }
}
