//! Simulating the DNSSEC key lifecycle.
//!
//! The [`enforcer`] moves the DS, DNSKEY and RRSIG records of a zone's keys
//! from one state to the next while making sure a validating resolver can
//! always build a chain of trust. The [`simulation`] drives it through time.
pub mod args;
pub mod commands;
pub mod config;
pub mod enforcer;
pub mod env;
pub mod error;
pub mod scenario;
pub mod simulation;

use clap::Parser;

pub use args::Args;
use env::Env;
use error::Error;

pub fn parse_args(env: impl Env) -> Result<Args, Error> {
    let args = Args::try_parse_from(env.args_os())?;
    Ok(args)
}

/// Run the program in the given environment and return its exit code.
pub fn run(env: impl Env) -> u8 {
    let args = match parse_args(&env) {
        Ok(args) => args,
        Err(err) => {
            err.pretty_print(&env);
            return err.exit_code();
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(env.stderr())
        .with_max_level(args.log_level())
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, || match args.execute(&env) {
        Ok(()) => 0,
        Err(err) => {
            err.pretty_print(&env);
            err.exit_code()
        }
    })
}
