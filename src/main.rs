use std::{env, process};

use console::style;
use fake_sandbox_exec::{USAGE, UsageError, exit_code, run};

fn main() -> ! {
    let Err(err) = run(env::args_os());

    eprintln!(
        "{}: {} {err:#}",
        env!("CARGO_PKG_NAME"),
        style("error:").for_stderr().red().bold()
    );
    if err.downcast_ref::<UsageError>().is_some() {
        eprintln!("{USAGE}");
    }

    process::exit(exit_code(&err))
}
