use std::io::{self, Write};

use serde::Serialize;

use crate::scheduler::{CheckSummary, MirrorAction, MirrorSummary, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

/// Machine-readable summaries; progress is suppressed so stdout stays valid
/// JSON.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_mirror(result: &MirrorSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_check(result: &CheckSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_mirror(result: &MirrorSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "OCADS mirror summary")?;
        writeln!(stdout, "  mirrored: {}", result.count(MirrorAction::Mirrored))?;
        writeln!(stdout, "  skipped:  {}", result.count(MirrorAction::Skipped))?;
        writeln!(stdout, "  failed:   {}", result.count(MirrorAction::Failed))?;
        for item in &result.items {
            if let Some(error) = &item.error {
                writeln!(stdout, "  {} failed: {error}", item.accession)?;
            }
        }
        Ok(())
    }

    pub fn print_check(result: &CheckSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "Checked {} datasets, {} problematic",
            result.checked,
            result.problems.len()
        )?;
        writeln!(stdout, "Problematic accession numbers:")?;
        for problem in &result.problems {
            writeln!(stdout, "{}\t{}", problem.accession, problem.reason)?;
        }
        Ok(())
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => println!("{}", event.message),
        }
    }
}
