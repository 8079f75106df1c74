use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt as _;

use const_format::formatcp;

const NAME: &str = env!("CARGO_PKG_NAME");

pub const USAGE: &str = formatcp!(
    "usage: {NAME} [-f profile-file] [-n profile-name] [-p profile-string] [-D key=value ...] command [arguments ...]"
);

/// One of the sandbox options that are accepted and then dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SandboxFlag {
    /// `-f`: path to a profile file
    File,
    /// `-n`: name of a builtin profile
    Name,
    /// `-p`: inline profile string
    Profile,
    /// `-D`: profile parameter definition
    Define,
}

impl SandboxFlag {
    fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'f' => Some(Self::File),
            b'n' => Some(Self::Name),
            b'p' => Some(Self::Profile),
            b'D' => Some(Self::Define),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::File => 'f',
            Self::Name => 'n',
            Self::Profile => 'p',
            Self::Define => 'D',
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum UsageError {
    MissingValue(SandboxFlag),
    MissingCommand,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(flag) => {
                write!(f, "option requires an argument -- {}", flag.letter())
            }
            Self::MissingCommand => write!(f, "no command given"),
        }
    }
}

impl std::error::Error for UsageError {}

/// Only built by [`Args::parse_from`], which guarantees a command.
#[derive(Debug, PartialEq, Eq)]
pub struct Args {
    /// Consumed options, in the order they were given. Never interpreted.
    ignored: Vec<(SandboxFlag, OsString)>,
    /// The command to run followed by its arguments. Never empty.
    command: Vec<OsString>,
}

impl Args {
    /// Filters a full argument vector, including the binary name at index 0.
    ///
    /// Scanning stops at the first token that is not `-f`, `-n`, `-p` or `-D`.
    /// That token, and everything after it, is the command. There is no
    /// end-of-options marker: `--` is taken as the command name.
    pub fn parse_from(
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Result<Args, UsageError> {
        let mut args = args.into_iter().map(Into::<OsString>::into).skip(1).peekable();
        let mut ignored = vec![];

        while let Some((flag, attached)) = args.peek().and_then(|arg| parse_flag(arg)) {
            args.next();
            let value = match attached {
                Some(value) => value,
                None => args.next().ok_or(UsageError::MissingValue(flag))?,
            };
            ignored.push((flag, value));
        }

        let command = args.collect::<Vec<_>>();
        if command.is_empty() {
            return Err(UsageError::MissingCommand);
        }

        Ok(Args { ignored, command })
    }

    pub fn ignored(&self) -> &[(SandboxFlag, OsString)] {
        &self.ignored
    }

    /// The command followed by its arguments, in their original order.
    pub fn command(&self) -> &[OsString] {
        &self.command
    }

    pub fn program(&self) -> &OsStr {
        &self.command[0]
    }

    pub fn program_args(&self) -> &[OsString] {
        &self.command[1..]
    }
}

/// Recognizes `-X` and `-Xvalue` for the four sandbox letters.
fn parse_flag(arg: &OsStr) -> Option<(SandboxFlag, Option<OsString>)> {
    let bytes = arg.as_encoded_bytes();
    let [b'-', letter, rest @ ..] = bytes else {
        return None;
    };
    let flag = SandboxFlag::from_letter(*letter)?;
    if rest.is_empty() {
        return Some((flag, None));
    }
    Some((flag, Some(OsStr::from_bytes(rest).to_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, UsageError> {
        Args::parse_from(std::iter::once("fake-sandbox-exec").chain(args.iter().copied()))
    }

    fn ignored(flag: SandboxFlag, value: &str) -> (SandboxFlag, OsString) {
        (flag, OsString::from(value))
    }

    fn command(args: &[&str]) -> Vec<OsString> {
        parse(args).unwrap().command
    }

    #[test]
    fn strips_flags_before_command() {
        let args = parse(&["-p", "8080", "mytool", "arg1", "arg2"]).unwrap();
        assert_eq!(args.command, ["mytool", "arg1", "arg2"]);
        assert_eq!(args.ignored, [ignored(SandboxFlag::Profile, "8080")]);
        assert_eq!(args.program(), "mytool");
        assert_eq!(args.program_args(), ["arg1", "arg2"]);
    }

    #[test]
    fn accepts_flags_in_any_order_and_repeated() {
        let args = parse(&[
            "-D", "a=1", "-f", "x.sb", "-D", "b=2", "-n", "no-network", "cmd",
        ])
        .unwrap();
        assert_eq!(args.command, ["cmd"]);
        assert_eq!(
            args.ignored,
            [
                ignored(SandboxFlag::Define, "a=1"),
                ignored(SandboxFlag::File, "x.sb"),
                ignored(SandboxFlag::Define, "b=2"),
                ignored(SandboxFlag::Name, "no-network"),
            ]
        );
    }

    #[test]
    fn define_with_single_command() {
        let args = parse(&["-D", "debug.log", "realcmd"]).unwrap();
        assert_eq!(args.command, ["realcmd"]);
        assert!(args.program_args().is_empty());
    }

    #[test]
    fn attached_values() {
        let args = parse(&["-fprofile.sb", "-DHOME=/tmp", "ls"]).unwrap();
        assert_eq!(args.command, ["ls"]);
        assert_eq!(
            args.ignored,
            [
                ignored(SandboxFlag::File, "profile.sb"),
                ignored(SandboxFlag::Define, "HOME=/tmp"),
            ]
        );
    }

    #[test]
    fn program_is_the_first_command_token() {
        for args in [
            parse(&["ls"]).unwrap(),
            parse(&["-f", "x", "--"]).unwrap(),
            parse(&["-", "a"]).unwrap(),
        ] {
            assert!(!args.command().is_empty());
            assert_eq!(args.program(), args.command()[0].as_os_str());
            assert_eq!(args.program_args(), &args.command()[1..]);
        }
    }

    #[test]
    fn flag_values_may_look_like_flags() {
        assert_eq!(command(&["-p", "-n", "echo", "hi"]), ["echo", "hi"]);
    }

    #[test]
    fn double_dash_is_the_command() {
        assert_eq!(
            command(&["-f", "foo", "-n", "3", "--", "ls", "-la", "/tmp"]),
            ["--", "ls", "-la", "/tmp"]
        );
    }

    #[test]
    fn unknown_option_starts_the_command() {
        assert_eq!(command(&["-f", "x", "-x", "y"]), ["-x", "y"]);
        assert_eq!(command(&["-"]), ["-"]);
    }

    #[test]
    fn flags_after_the_command_are_forwarded() {
        assert_eq!(
            command(&["grep", "-n", "pattern", "-f", "file"]),
            ["grep", "-n", "pattern", "-f", "file"]
        );
    }

    #[test]
    fn filtering_is_idempotent() {
        let first = command(&["-n", "p", "-D", "k=v", "cat", "a", "b"]);
        let again = Args::parse_from(std::iter::once(OsString::from("x")).chain(first.clone()))
            .unwrap()
            .command;
        assert_eq!(first, again);
    }

    #[test]
    fn missing_command() {
        assert_eq!(parse(&[]), Err(UsageError::MissingCommand));
        assert_eq!(parse(&["-f", "x.sb"]), Err(UsageError::MissingCommand));
        assert_eq!(
            Args::parse_from(Vec::<OsString>::new()),
            Err(UsageError::MissingCommand)
        );
    }

    #[test]
    fn missing_value() {
        let err = parse(&["-n", "x", "-D"]).unwrap_err();
        assert_eq!(err, UsageError::MissingValue(SandboxFlag::Define));
        assert_eq!(err.to_string(), "option requires an argument -- D");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_arguments_pass_through() {
        use std::os::unix::ffi::OsStringExt as _;

        let odd = OsString::from_vec(vec![b'a', 0xff, b'b']);
        let value = OsString::from_vec(vec![b'-', b'p', 0xfe]);
        let args = Args::parse_from([
            OsString::from("x"),
            value,
            OsString::from("cat"),
            odd.clone(),
        ])
        .unwrap();
        assert_eq!(args.command, [OsString::from("cat"), odd]);
        assert_eq!(
            args.ignored,
            [(SandboxFlag::Profile, OsString::from_vec(vec![0xfe]))]
        );
    }
}
