use anyhow::{Context, Result};
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use rpassword::read_password;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

use crate::hasher::Variant;

pub const MIN_TIME_COST: u32 = 1;
pub const MAX_TIME_COST: u32 = 512;

pub const MIN_MEMORY_COST_MIB: u32 = 1;
pub const MAX_MEMORY_COST_MIB: u32 = 4096;

pub const MIN_PARALLELISM: u32 = 1;
pub const MAX_PARALLELISM: u32 = 64;

// The argon2 crate, like the reference library, rejects digests shorter
// than 4 bytes.
pub const MIN_HASH_LENGTH: u32 = 4;
pub const MAX_HASH_LENGTH: u32 = 1024;

pub struct DisplayOptions {
    pub unicode_support: bool,
    pub color_support: bool,
    pub quiet: bool,
}

/// Parameters echoed back alongside the encoded hash.
pub struct HashSummary {
    pub variant: Variant,
    pub time_cost: u32,
    pub memory_cost_mib: u32,
    pub parallelism: u32,
    pub hash_length: u32,
}

pub fn detect_unicode_support() -> bool {
    supports_unicode::on(supports_unicode::Stream::Stdout)
}

pub fn detect_color_support() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

pub fn get_status_symbols(unicode_support: bool) -> (&'static str, &'static str) {
    if unicode_support {
        ("✓", "!")
    } else {
        ("+", "!")
    }
}

/// Clamps a parameter to its permitted range, warning when the requested
/// value was out of bounds. The invocation adapter trusts the values it
/// receives, so every parameter passes through here first.
pub fn clamp_parameter(name: &str, value: u32, min: u32, max: u32) -> u32 {
    let clamped = value.clamp(min, max);

    if clamped != value {
        let term = Term::stderr();
        term.write_line(&format!(
            "WARNING: {name} {value} is out of range [{min}, {max}], using {clamped}"
        ))
        .ok();
    }

    clamped
}

pub fn prompt_password(visible: bool) -> Result<Zeroizing<String>> {
    print!("Password: ");
    io::stdout().flush()?;

    let password = if visible {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        input.trim_end_matches(['\r', '\n']).to_string()
    } else {
        read_password().context("Failed to read password")?
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    Ok(Zeroizing::new(password))
}

pub fn prompt_encoded_hash() -> Result<String> {
    print!("Encoded hash: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Encoded hash cannot be empty");
    }

    Ok(trimmed.to_string())
}

pub fn confirm(question: &str) -> Result<bool> {
    let term = Term::stderr();
    term.write_str(&format!("{question} [y/N]: "))?;
    term.flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();

    Ok(response == "y" || response == "yes")
}

pub fn show_progress<F, T>(unicode_support: bool, message: &str, f: F) -> Result<(T, Duration)>
where
    F: FnOnce() -> Result<T>,
{
    let term = Term::stdout();
    term.hide_cursor().ok();

    let pb = ProgressBar::new_spinner();

    if unicode_support {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&[
                    "⠁", "⠂", "⠄", "⡀", "⡈", "⡐", "⡠", "⣀", "⣁", "⣂", "⣄", "⣌", "⣔", "⣤", "⣥", "⣦",
                    "⣮", "⣶", "⣷", "⣿", "⡿", "⠿", "⢟", "⠟", "⡛", "⠛", "⠫", "⢋", "⠋", "⠍", "⡉", "⠉",
                    "⠑", "⠡", "⢁", "⠁",
                ]),
        );
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("-\\|/-"),
        );
    }

    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));

    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();

    pb.finish_and_clear();
    term.show_cursor().ok();

    result.map(|r| (r, elapsed))
}

pub fn display_hash_output(
    encoded: &str,
    summary: &HashSummary,
    elapsed: Duration,
    options: &DisplayOptions,
) {
    if options.quiet {
        println!("{encoded}");
        return;
    }

    println!("Out:\n{encoded}\n");

    let style = if options.color_support {
        Style::new().green()
    } else {
        Style::new()
    };

    println!("Settings:");
    println!("  ├─ Algorithm   {}", style.apply_to(summary.variant.tag()));
    println!(
        "  ├─ Time cost   {} iteration{}",
        style.apply_to(summary.time_cost),
        if summary.time_cost == 1 { "" } else { "s" }
    );
    println!(
        "  ├─ Memory      {} MiB",
        style.apply_to(summary.memory_cost_mib)
    );
    println!(
        "  ├─ Parallelism {} thread{}",
        style.apply_to(summary.parallelism),
        if summary.parallelism == 1 { "" } else { "s" }
    );
    println!(
        "  ├─ Length      {} bytes",
        style.apply_to(summary.hash_length)
    );
    println!("  └─ Salt        16 B fresh + 16 B pooled");

    println!("\nStats:");
    println!("  └─ Time        {:.1}s", elapsed.as_secs_f64());
}

pub fn display_verification_success(options: &DisplayOptions) {
    let (check_ok, _) = get_status_symbols(options.unicode_support);
    let style = if options.color_support {
        Style::new().green()
    } else {
        Style::new()
    };

    println!(
        "{} Verification successful. The hash matches the entered password.",
        style.apply_to(format!("[{check_ok}]"))
    );
}

pub fn display_verification_failure(options: &DisplayOptions, detail: Option<&str>) {
    let (_, warn) = get_status_symbols(options.unicode_support);
    let style = if options.color_support {
        Style::new().red()
    } else {
        Style::new()
    };

    match detail {
        Some(detail) => println!(
            "{} Verification failed: {detail}",
            style.apply_to(format!("[{warn}]"))
        ),
        None => println!(
            "{} Verification failed. The hash does not match the entered password.",
            style.apply_to(format!("[{warn}]"))
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_status_symbols_unicode() {
        let (ok, warn) = get_status_symbols(true);
        assert_eq!(ok, "✓");
        assert_eq!(warn, "!");
    }

    #[test]
    fn test_get_status_symbols_ascii() {
        let (ok, warn) = get_status_symbols(false);
        assert_eq!(ok, "+");
        assert_eq!(warn, "!");
    }

    #[test]
    fn test_clamp_in_range_is_identity() {
        assert_eq!(
            clamp_parameter("Time cost", 16, MIN_TIME_COST, MAX_TIME_COST),
            16
        );
        assert_eq!(
            clamp_parameter("Parallelism", 1, MIN_PARALLELISM, MAX_PARALLELISM),
            1
        );
    }

    #[test]
    fn test_clamp_below_minimum() {
        assert_eq!(
            clamp_parameter("Time cost", 0, MIN_TIME_COST, MAX_TIME_COST),
            MIN_TIME_COST
        );
        assert_eq!(
            clamp_parameter("Hash length", 1, MIN_HASH_LENGTH, MAX_HASH_LENGTH),
            MIN_HASH_LENGTH
        );
    }

    #[test]
    fn test_clamp_above_maximum() {
        assert_eq!(
            clamp_parameter("Memory cost", 1 << 20, MIN_MEMORY_COST_MIB, MAX_MEMORY_COST_MIB),
            MAX_MEMORY_COST_MIB
        );
    }
}
