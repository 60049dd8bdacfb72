mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::{Session, SessionOptions};

const USAGE: &str =
    "Usage: beacon-emulator [--transcript <path>] [--dedicated-wake-line] [--light-sleep]";

struct Args {
    options: SessionOptions,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let args = parse_args().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(args.options, args.transcript.as_deref())?;
    let mut line = String::new();

    writeln!(
        writer,
        "Beacon emulator ready. Type `!help` for commands or `exit` to quit."
    )?;
    for response in session.boot()? {
        writeln!(writer, "{response}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            continue;
        }

        if should_terminate(trimmed.trim()) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_input(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_args() -> Result<Args, String> {
    let mut dedicated_wake_line = false;
    let mut light_sleep = false;
    let mut transcript = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--transcript=") {
            transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --transcript".to_string())?;
            transcript = Some(PathBuf::from(value));
        } else if arg == "--dedicated-wake-line" {
            dedicated_wake_line = true;
        } else if arg == "--light-sleep" {
            light_sleep = true;
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    Ok(Args {
        options: SessionOptions::from_flags(dedicated_wake_line, light_sleep),
        transcript,
    })
}
