use console::style;
use std::io::{self, Write};
use std::path::PathBuf;

/// Asks on the terminal which of several matching files to use.
///
/// An empty answer, end of input or anything that is not a listed number
/// declines.
pub fn pick_from_terminal(file: &str, candidates: &[PathBuf]) -> Option<usize> {
    eprintln!(
        "{} Several files match {}:",
        style("?").yellow().bold(),
        style(file).bold()
    );
    for (i, candidate) in candidates.iter().enumerate() {
        eprintln!("  {} {}", style(format!("{})", i + 1)).dim(), candidate.display());
    }
    eprint!("{} ", style("Pick a number (empty to cancel):").dim());
    io::stderr().flush().ok()?;

    let mut buffer = String::new();
    match io::stdin().read_line(&mut buffer) {
        Ok(0) | Err(_) => None,
        Ok(_) => parse_choice(&buffer, candidates.len()),
    }
}

fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    choice.checked_sub(1).filter(|&index| index < count)
}

pub fn print_error(message: &str) {
    eprintln!("{} {message}", style("error:").red().bold());
}
