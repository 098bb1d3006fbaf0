mod session;
mod sim;

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use session::{Session, SessionOptions};

const USAGE: &str = "Usage: mission-emulator [--log <file.csv>] [--script <file>] \
                     [--cycle-ms <ms>] [--start-steps <steps>] [--frames] [--no-color]";

struct Args {
    options: SessionOptions,
    log: Option<PathBuf>,
    script: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let args = parse_args().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(&args.options, args.log.as_deref())?;

    if let Some(script) = &args.script {
        let contents = fs::read_to_string(script)?;
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            writeln!(writer, "> {trimmed}")?;
            for response in session.handle_command(trimmed) {
                writeln!(writer, "{response}")?;
            }
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "AUV Mission Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed) {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_args() -> Result<Args, String> {
    let mut parsed = Args {
        options: SessionOptions::default(),
        log: None,
        script: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        match flag.as_str() {
            "--frames" => parsed.options.show_frames = true,
            "--no-color" => parsed.options.color = false,
            "--log" | "--script" | "--cycle-ms" | "--start-steps" => {
                let value = inline
                    .or_else(|| args.next())
                    .ok_or_else(|| format!("Expected value after {flag}"))?;
                match flag.as_str() {
                    "--log" => parsed.log = Some(PathBuf::from(value)),
                    "--script" => parsed.script = Some(PathBuf::from(value)),
                    "--cycle-ms" => {
                        let millis = value
                            .parse::<u64>()
                            .map_err(|_| format!("Invalid cycle period `{value}`"))?;
                        if millis == 0 {
                            return Err("Cycle period must be at least 1 ms".to_string());
                        }
                        parsed.options.cycle = Duration::from_millis(millis);
                    }
                    _ => {
                        parsed.options.start_steps = value
                            .parse::<i64>()
                            .map_err(|_| format!("Invalid start position `{value}`"))?;
                    }
                }
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(parsed)
}
