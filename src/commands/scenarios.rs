use crate::env::Env;
use crate::error::Error;
use crate::scenario::scenarios;

#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
pub struct Scenarios {
    /// Also list the keys of each scenario
    #[arg(short = 'k', long = "keys")]
    show_keys: bool,
}

impl Scenarios {
    pub fn execute(self, env: impl Env) -> Result<(), Error> {
        let mut out = env.stdout();
        for scenario in scenarios() {
            writeln!(out, "{:<24}{}", scenario.name, scenario.description);
            if self.show_keys {
                for key in &scenario.keys {
                    writeln!(
                        out,
                        "    {} {} {}, {} to {}",
                        key.role, key.name, key.algorithm, key.state, key.goal
                    );
                }
            }
        }
        Ok(())
    }
}
