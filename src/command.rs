use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString, c_char};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::{env, io, iter, ptr};

use anyhow::{Context, Result};

/// Directories searched when `PATH` is unset, as `execvp` does.
const DEFAULT_PATH: &str = "/bin:/usr/bin";

/// A process builder for the command that takes over this process.
///
/// Unlike `std::process::Command`, there is no child: [`exec`] replaces the
/// current process image, and the launched program inherits the process id,
/// the environment, the working directory and the open stdio descriptors.
///
/// # Examples
///
/// ```no_run
/// use fake_sandbox_exec::Command;
///
/// let mut command = Command::new("ls");
/// command.arg("-la").arg("/tmp");
/// let Err(err) = command.exec(); // only returns on failure
/// eprintln!("{err:#}");
/// ```
///
/// [`exec`]: Command::exec
#[derive(Clone)]
pub struct Command {
    /// Program name as given, also used as argument zero
    program: OsString,
    /// Arguments following argument zero
    args: Vec<OsString>,
}

impl Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.get_program())?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

impl Command {
    /// Constructs a new `Command` for launching `program`.
    ///
    /// A `program` containing a `/` is used as a path. Any other name is looked
    /// up in the directories listed in `PATH` when the command is executed.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
        }
    }

    /// Adds an argument to pass to the program.
    ///
    /// The argument is not shell-escaped or split in any way.
    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Adds multiple arguments to pass to the program.
    pub fn args(&mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> &mut Self {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Returns the program name, exactly as given to [`Command::new`].
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Returns an iterator over the arguments, not including the program name.
    pub fn get_args(&'_ self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(|s| s.as_os_str())
    }

    /// Resolves the program to the file that would be executed.
    ///
    /// # Errors
    ///
    /// Fails if the program is a bare name and no executable file of that
    /// name exists in `PATH`, or in `/bin:/usr/bin` when `PATH` is unset. A
    /// name containing `/` is never checked here; problems with it surface
    /// from [`Command::exec`].
    pub fn resolve(&self) -> Result<PathBuf> {
        let program = Path::new(&self.program);
        if self.program.as_encoded_bytes().contains(&b'/') {
            return Ok(program.to_path_buf());
        }
        let paths = env::var_os("PATH").unwrap_or_else(|| DEFAULT_PATH.into());
        which::which_in(program, Some(paths), ".")
            .with_context(|| format!("{}: command not found", self.program.to_string_lossy()))
    }

    /// Replaces the current process with the program.
    ///
    /// The lookup itself is left to `execvp`, so an executable file without a
    /// `#!` line is run by `/bin/sh`. [`Command::resolve`] is only consulted
    /// first to report a missing command.
    ///
    /// This never returns on success. The error describes why the program
    /// could not be started and always names it.
    pub fn exec(&self) -> Result<Infallible> {
        self.resolve()?;
        let args = iter::once(self.get_program()).chain(self.get_args());
        execvp(self.get_program(), args)
            .with_context(|| format!("{}: cannot execute", self.program.to_string_lossy()))
    }
}

/// Replaces the current process with `program` using `execvp`.
///
/// `args` is the complete argument vector, argument zero included. The
/// environment of the current process is passed on unchanged.
///
/// This function never returns on success. On failure it returns the OS error
/// left by `execvp`, or `InvalidInput` if a string holds an interior NUL byte.
fn execvp(
    program: &OsStr,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> io::Result<Infallible> {
    let program = to_cstring(program)?;
    let args = args
        .into_iter()
        .map(|arg| to_cstring(arg.as_ref()))
        .collect::<io::Result<Vec<_>>>()?;
    let arg_ptrs = args
        .iter()
        .map(|arg| arg.as_ptr())
        .chain(iter::once(ptr::null::<c_char>()))
        .collect::<Vec<_>>();

    // SAFETY: every pointer refers to a NUL-terminated string owned by
    // `program` or `args`, both alive across the call, and `arg_ptrs` is
    // NULL-terminated.
    unsafe { libc::execvp(program.as_ptr(), arg_ptrs.as_ptr()) };

    Err(io::Error::last_os_error())
}

fn to_cstring(s: &OsStr) -> io::Result<CString> {
    CString::new(s.as_encoded_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{s:?} contains a NUL byte"),
        )
    })
}
