use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, SessionOptions};

const TRANSCRIPT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    record(
        "command-then-button",
        SessionOptions::default(),
        record_command_then_button,
    )?;
    record(
        "rejected-and-overflow",
        SessionOptions::default(),
        record_rejected_and_overflow,
    )?;
    record(
        "dedicated-light-sleep",
        SessionOptions::from_flags(true, true),
        record_dedicated_light_sleep,
    )?;
    Ok(())
}

fn record<F>(name: &str, options: SessionOptions, script: F) -> io::Result<()>
where
    F: FnOnce(&mut Session) -> io::Result<()>,
{
    let path = Path::new(TRANSCRIPT_DIR).join(format!("{name}.log"));
    let mut session = Session::new(options, Some(&path))?;
    session.boot()?;
    script(&mut session)
}

fn record_command_then_button(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_input("!run 2")?;
    let _ = session.handle_input("LED:3:10")?;
    let _ = session.handle_input("LED:1:1")?;
    let _ = session.handle_input("!status")?;
    let _ = session.handle_input("!button")?;
    let _ = session.handle_input("!button")?;
    let _ = session.handle_input("!status")?;
    Ok(())
}

fn record_rejected_and_overflow(session: &mut Session) -> io::Result<()> {
    let mut out = Vec::new();
    session.send_serial(&mut out, b"\n")?;
    let _ = session.handle_input("LED:0:5")?;
    let _ = session.handle_input("LED:3:101")?;
    let _ = session.handle_input("led:3:10")?;
    let _ = session.handle_input("LED:3:10:LED:3:10:LED:3:10:LED:3:10")?;
    let _ = session.handle_input("!status")?;
    let _ = session.handle_input("LED:2:5")?;
    Ok(())
}

fn record_dedicated_light_sleep(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_input("!button")?;
    let _ = session.handle_input("!button")?;
    let _ = session.handle_input("!status")?;
    Ok(())
}
