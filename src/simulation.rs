//! Driving a key collection through time.
use serde::Serialize;
use tracing::{info, warn};

use crate::enforcer::{
    audit, enforce_step, next_wakeup_time, KeyCollection, KeySnapshot, Policy, RuleOptions,
    Timestamp,
};
use crate::error::{bail, Error, Result};

/// A zone's keys together with a clock.
///
/// Every step is audited. A step that leaves the zone in a state that a
/// resolver cannot validate ends the simulation with an error.
pub struct Simulation {
    keys: KeyCollection,
    policy: Policy,
    options: RuleOptions,
    now: Timestamp,
}

/// The state of the keys after a step.
#[derive(Clone, Debug, Serialize)]
pub struct Step {
    pub time: Timestamp,
    pub changed: bool,
    pub keys: Vec<KeySnapshot>,
}

/// How a simulation ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Every key reached its goal and all withdrawn keys were purged.
    Settled { time: Timestamp, steps: usize },

    /// Nothing is waiting for time to pass, but some keys have not reached
    /// their goal. The zone is safe but the keys are stuck.
    Stuck {
        time: Timestamp,
        steps: usize,
        keys: Vec<String>,
    },
}

impl Simulation {
    /// Start a simulation at time zero.
    ///
    /// Fails if the zone is not validatable to begin with.
    pub fn new(keys: KeyCollection, policy: Policy, options: RuleOptions) -> Result<Self> {
        if let Err(violation) = audit(&keys) {
            bail!(
                "the initial key states are not safe: {}\n{}",
                violation,
                dump(&keys)
            );
        }
        Ok(Simulation {
            keys,
            policy,
            options,
            now: 0,
        })
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn keys(&self) -> &KeyCollection {
        &self.keys
    }

    /// Run a single step at the current time and audit the result.
    pub fn step(&mut self) -> Result<Step> {
        let changed = enforce_step(&mut self.keys, &self.policy, &self.options, self.now)?;
        if let Err(violation) = audit(&self.keys) {
            return Err(Error::new(&format!(
                "unsafe key states at time {}: {}\n{}",
                self.now,
                violation,
                dump(&self.keys)
            )));
        }
        Ok(Step {
            time: self.now,
            changed,
            keys: self.keys.snapshot(),
        })
    }

    /// Move the clock to the next time something can happen.
    ///
    /// Returns `false` if nothing is waiting for time to pass.
    pub fn advance(&mut self) -> bool {
        match next_wakeup_time(&self.keys, &self.policy, self.now) {
            Some(time) => {
                self.now = time;
                true
            }
            None => false,
        }
    }

    /// Step and advance until nothing is waiting for time to pass.
    ///
    /// Every step is handed to `observer`.
    pub fn run(&mut self, max_steps: usize, mut observer: impl FnMut(&Step)) -> Result<Outcome> {
        let mut steps = 0;
        loop {
            if steps == max_steps {
                bail!(
                    "still busy after {} steps at time {}\n{}",
                    max_steps,
                    self.now,
                    dump(&self.keys)
                );
            }
            let step = self.step()?;
            steps += 1;
            observer(&step);
            if !self.advance() {
                break;
            }
        }

        let mut stuck: Vec<String> = self
            .keys
            .iter()
            .filter(|key| !key.at_goal())
            .map(|key| key.name().to_string())
            .collect();
        stuck.sort();
        if stuck.is_empty() {
            info!("settled at time {} after {steps} steps", self.now);
            Ok(Outcome::Settled {
                time: self.now,
                steps,
            })
        } else {
            warn!("keys {} cannot reach their goal", stuck.join(", "));
            Ok(Outcome::Stuck {
                time: self.now,
                steps,
                keys: stuck,
            })
        }
    }
}

/// A human readable listing of all keys and their records.
pub fn dump(keys: &KeyCollection) -> String {
    let mut res = String::new();
    for key in keys.iter() {
        res.push_str(&format!(
            "  {key}, algorithm {}, goal {}:",
            key.algorithm(),
            key.goal()
        ));
        for (kind, record) in key.records() {
            res.push_str(&format!(
                " {kind} {} since {};",
                record.state, record.last_change
            ));
        }
        res.pop();
        res.push('\n');
    }
    res
}
