//! Colored console output and progress reporting.
//!
//! Mirrors the reporting style the rest of this ecosystem uses: short,
//! leveled lines written straight to stdout/stderr, plus `indicatif`
//! progress for anything that runs long enough to need it.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Print an action header (blue, bold). Example: "==> building acme/libfoo"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a sub-action (cyan arrow). Example: "  -> configure"
pub fn sub_action(phase: &str) {
    println!("  {} {}", "->".cyan(), phase);
}

/// Print a detail line (dimmed). Example: "     nothing to be done for configure"
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Print a success message (green).
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print a warning to stderr (yellow).
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error to stderr (red), in the "<component>: <condition>" shape.
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Create a spinner for a long-running backend invocation.
pub fn step_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn progress_done(pb: ProgressBar) {
    pb.finish_and_clear();
}

/// The fixed-format extraction progress bar fridge unpack redraws in place.
///
/// Exact format: 20 columns of `#`/space, `| NNN%`, the recipe/package name
/// clipped to 15 characters, redrawn with CR + erase-to-end-of-line. This
/// shape is part of the on-disk/on-terminal contract, not a cosmetic choice,
/// so it is hand-rendered rather than built from an `indicatif` template.
pub fn render_unpack_bar(name: &str, current: u64, total: u64) -> String {
    let percent = if total == 0 { 100 } else { ((current * 100) / total).min(100) };
    let filled = (percent / 5) as usize;
    let mut bar = String::with_capacity(20);
    for i in 0..20 {
        bar.push(if i < filled { '#' } else { ' ' });
    }
    let clipped: String = name.chars().take(15).collect();
    format!("\x1b[2K\rextracting [{bar}| {percent:>3}%] {clipped:<15.15}")
}
