use std::process::ExitCode;

fn main() -> ExitCode {
    let env = keyroll::env::RealEnv;
    ExitCode::from(keyroll::run(env))
}
