use std::convert::Infallible;
use std::env;
use std::ffi::OsString;
use std::io;

use anyhow::Result;

mod cli;
mod command;

pub use cli::{Args, SandboxFlag, USAGE, UsageError};
pub use command::Command;

/// Exit status for a missing command or a missing option value.
pub const EXIT_USAGE: i32 = 64;
/// Exit status when the program was found but could not be started.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
/// Exit status when the program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Environment variable that turns on tracing of the launched command line.
pub const TRACE_ENV: &str = "FAKE_SANDBOX_EXEC_TRACE";

/// Drops the sandbox options from `args` and replaces the current process with
/// the command that follows them.
///
/// `args` is a full argument vector, such as `std::env::args_os()`, whose first
/// element is the name of this binary. The sandbox options are accepted only to
/// stay command-line compatible with `sandbox-exec`; no sandbox is applied.
///
/// This function only returns on failure.
///
/// # Examples
///
/// ```no_run
/// let Err(err) = fake_sandbox_exec::run(["sandbox-exec", "-n", "no-network", "make", "test"]);
/// eprintln!("{err:#}");
/// std::process::exit(fake_sandbox_exec::exit_code(&err));
/// ```
pub fn run(args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<Infallible> {
    let args = Args::parse_from(args)?;

    let mut command = Command::new(args.program());
    command.args(args.program_args());

    if trace_enabled() {
        for (flag, value) in args.ignored() {
            eprintln!("ignoring -{} {:?}", flag.letter(), value);
        }
        eprintln!("exec {command:?}");
    }

    command.exec()
}

/// Maps an error returned by [`run`] to the process exit status.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<UsageError>().is_some() {
        return EXIT_USAGE;
    }
    if err.downcast_ref::<which::Error>().is_some() {
        return EXIT_NOT_FOUND;
    }
    match err.downcast_ref::<io::Error>() {
        Some(err) if err.kind() == io::ErrorKind::NotFound => EXIT_NOT_FOUND,
        _ => EXIT_CANNOT_EXECUTE,
    }
}

fn trace_enabled() -> bool {
    env::var_os(TRACE_ENV).is_some_and(|v| !v.is_empty() && v != "0")
}
