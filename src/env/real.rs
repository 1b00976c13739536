use std::borrow::Cow;
use std::ffi::OsString;
use std::io;
use std::path::Path;

use super::{Env, Stream};

/// Use real I/O
pub struct RealEnv;

impl Env for RealEnv {
    fn args_os(&self) -> impl Iterator<Item = OsString> {
        std::env::args_os()
    }

    fn stdout(&self) -> Stream<impl io::Write> {
        Stream::new(io::stdout())
    }

    fn stderr(&self) -> Stream<impl io::Write + Send + Sync + 'static> {
        Stream::new(io::stderr())
    }

    fn in_cwd<'a>(&self, path: &'a impl AsRef<Path>) -> Cow<'a, Path> {
        path.as_ref().into()
    }
}
