use std::io;
use std::path::PathBuf;

use jiff::fmt::friendly::{Spacing, SpanPrinter};
use jiff::SignedDuration;
use serde::Serialize;

use crate::config::{build_keys, Config, KeyFile};
use crate::enforcer::{DnskeyRetraction, KeySnapshot, RecordState, RuleOptions};
use crate::env::{Env, Stream};
use crate::error::{bail, Error};
use crate::scenario::scenario;
use crate::simulation::{Outcome, Simulation, Step};

#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
pub struct Simulate {
    /// Built-in scenario to run (see the scenarios command)
    #[arg(
        short = 's',
        long = "scenario",
        value_name = "NAME",
        conflicts_with = "keys",
        required_unless_present = "keys"
    )]
    scenario: Option<String>,

    /// JSON file with the keys to start from
    #[arg(short = 'k', long = "keys", value_name = "FILE")]
    keys: Option<PathBuf>,

    /// JSON file with the timing policy and rule options
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only publish a DS once its own DNSKEY is omnipresent
    #[arg(long = "min-flux")]
    min_flux: bool,

    /// Only introduce signatures once their DNSKEY is omnipresent
    #[arg(long = "min-sig")]
    min_sig: bool,

    /// When a DNSKEY may be withdrawn
    #[arg(long = "dnskey-retraction", value_name = "WHEN", value_enum)]
    dnskey_retraction: Option<DnskeyRetraction>,

    /// Give up after this many steps
    #[arg(long = "max-steps", value_name = "N", default_value_t = 1000)]
    max_steps: usize,

    /// Also show what the signer has to do with each key
    #[arg(long = "signer")]
    signer: bool,

    /// Draw one line per record instead of one line per step
    ///
    /// Each step is a column: ' ' hidden, '+' rumoured, '|' omnipresent and
    /// '-' unretentive.
    #[arg(long = "chart", conflicts_with = "signer")]
    chart: bool,

    /// Print the steps as JSON
    #[arg(long = "json", conflicts_with_all = ["signer", "chart"])]
    json: bool,
}

/// The JSON output of a run.
#[derive(Serialize)]
struct Report<'a> {
    steps: &'a [Step],
    settled: bool,
}

impl Simulate {
    pub fn execute(self, env: impl Env) -> Result<(), Error> {
        let keys = match (&self.scenario, &self.keys) {
            (Some(name), _) => {
                let Some(scenario) = scenario(name) else {
                    bail!("unknown scenario '{}', try the scenarios command", name);
                };
                scenario.key_collection()?
            }
            (None, Some(path)) => build_keys(&KeyFile::load(&env.in_cwd(path))?.keys)?,
            (None, None) => bail!("either --scenario or --keys is needed"),
        };

        let config = match &self.config {
            Some(path) => Config::load(&env.in_cwd(path))?,
            None => Config::default(),
        };
        let options = self.options(config.options);

        let mut sim = Simulation::new(keys, config.policy, options)?;
        let mut out = env.stdout();
        let mut steps = Vec::new();
        let outcome = sim.run(self.max_steps, |step| {
            if self.json || self.chart {
                steps.push(step.clone());
            } else {
                write_step(&mut out, step, self.signer);
            }
        })?;

        if self.json {
            let report = Report {
                steps: &steps,
                settled: matches!(outcome, Outcome::Settled { .. }),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        if self.chart {
            write_chart(&mut out, &steps);
        }

        match outcome {
            Outcome::Settled { time, steps } => {
                writeln!(out, "settled at {time} after {steps} steps");
            }
            Outcome::Stuck { time, steps, keys } => {
                writeln!(
                    out,
                    "stuck at {time} after {steps} steps, {} cannot reach the goal",
                    keys.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Apply the command line switches on top of the configured options.
    fn options(&self, mut options: RuleOptions) -> RuleOptions {
        options.min_flux |= self.min_flux;
        options.min_sig |= self.min_sig;
        if let Some(retraction) = self.dnskey_retraction {
            options.dnskey_retraction = retraction;
        }
        options
    }
}

/// Print one line of the timeline.
fn write_step(out: &mut Stream<impl io::Write>, step: &Step, signer: bool) {
    let secs = i64::try_from(step.time).unwrap_or(i64::MAX);
    let elapsed = SpanPrinter::new()
        .spacing(Spacing::None)
        .duration_to_string(&SignedDuration::from_secs(secs));
    write!(out, "{:>8} {:>10} ", step.time, format!("({elapsed})"));
    for key in &step.keys {
        write!(out, " {} {}", key.name, key.letters());
        if signer {
            write!(out, " {}", signer_flags(key));
        }
    }
    writeln!(out);
}

/// Print one line per record of every key, with a column per step.
fn write_chart(out: &mut Stream<impl io::Write>, steps: &[Step]) {
    // Keys are only ever removed during a run.
    let Some(first) = steps.first() else {
        return;
    };
    let rows: Vec<_> = first
        .keys
        .iter()
        .flat_map(|key| key.records.keys().map(move |kind| (key, *kind)))
        .collect();
    let width = rows
        .iter()
        .map(|(key, kind)| key.name.len() + kind.to_string().len() + 1)
        .max()
        .unwrap_or(0);

    for (key, kind) in rows {
        let line: String = steps
            .iter()
            .map(|step| {
                step.keys
                    .iter()
                    .find(|k| k.id == key.id)
                    .and_then(|k| k.state(kind))
                    .map_or(' ', RecordState::timeline_symbol)
            })
            .collect();
        let label = format!("{} {}", key.name, kind);
        writeln!(out, "{label:<width$} {}", line.trim_end());
    }
}

/// The signer's view of a key: P(ublish), K (sign DNSKEY), Z (sign zone).
fn signer_flags(key: &KeySnapshot) -> String {
    let flag = |set: bool, c: char| if set { c } else { '-' };
    [
        flag(key.signer.publish, 'P'),
        flag(key.signer.sign_dnskey, 'K'),
        flag(key.signer.sign_data, 'Z'),
    ]
    .iter()
    .collect()
}
