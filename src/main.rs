mod entropy;
mod hasher;
mod settings;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};

use entropy::EntropyPool;
use hasher::{ConcurrencyPolicy, HashOutcome, HashRequest, Invoker, Variant, VerifyOutcome};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "argonite",
    version,
    author,
    about = "Compute and verify Argon2 password hashes with tunable cost parameters"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print only the encoded hash or verdict, without the summary.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compute an encoded Argon2 hash of a password.
    Hash {
        /// Algorithm variant.
        #[arg(short, long, value_enum)]
        algorithm: Option<Variant>,

        /// Time cost (number of iterations).
        #[arg(short = 't', long)]
        time_cost: Option<u32>,

        /// Memory cost in MiB.
        #[arg(short = 'm', long)]
        memory_cost: Option<u32>,

        /// Number of parallel lanes.
        #[arg(short = 'p', long)]
        parallelism: Option<u32>,

        /// Digest length in bytes.
        #[arg(short = 'l', long)]
        hash_length: Option<u32>,

        /// Echo the password while typing.
        #[arg(long)]
        visible: bool,

        /// Do not persist the parameters used for this run.
        #[arg(long)]
        no_save: bool,
    },

    /// Verify a password against an encoded Argon2 hash.
    Verify {
        /// Encoded hash string; prompted for when omitted.
        encoded: Option<String>,

        /// Echo the password while typing.
        #[arg(long)]
        visible: bool,
    },

    /// Remove the stored settings and restore all defaults.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = ui::DisplayOptions {
        unicode_support: ui::detect_unicode_support(),
        color_support: ui::detect_color_support(),
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Hash {
            algorithm,
            time_cost,
            memory_cost,
            parallelism,
            hash_length,
            visible,
            no_save,
        } => run_hash(
            algorithm,
            time_cost,
            memory_cost,
            parallelism,
            hash_length,
            visible,
            no_save,
            &options,
        ),
        Command::Verify { encoded, visible } => run_verify(encoded, visible, &options),
        Command::Reset { yes } => run_reset(yes),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_hash(
    algorithm: Option<Variant>,
    time_cost: Option<u32>,
    memory_cost: Option<u32>,
    parallelism: Option<u32>,
    hash_length: Option<u32>,
    visible: bool,
    no_save: bool,
    options: &ui::DisplayOptions,
) -> Result<()> {
    let mut settings = Settings::load();
    let mut pool = EntropyPool::initialize();

    if let Some(algorithm) = algorithm {
        settings.algorithm = algorithm;
    }

    settings.time_cost = ui::clamp_parameter(
        "Time cost",
        time_cost.unwrap_or(settings.time_cost),
        ui::MIN_TIME_COST,
        ui::MAX_TIME_COST,
    );
    pool.fold(&format!(
        "Time cost ({} iteration{})",
        settings.time_cost,
        if settings.time_cost == 1 { "" } else { "s" }
    ));

    settings.memory_cost_mib = ui::clamp_parameter(
        "Memory cost",
        memory_cost.unwrap_or(settings.memory_cost_mib),
        ui::MIN_MEMORY_COST_MIB,
        ui::MAX_MEMORY_COST_MIB,
    );
    pool.fold(&format!("Memory cost ({} MiB)", settings.memory_cost_mib));

    settings.parallelism = ui::clamp_parameter(
        "Parallelism",
        parallelism.unwrap_or(settings.parallelism),
        ui::MIN_PARALLELISM,
        ui::MAX_PARALLELISM,
    );
    pool.fold(&format!(
        "Parallelism ({} thread{})",
        settings.parallelism,
        if settings.parallelism == 1 { "" } else { "s" }
    ));

    settings.hash_length = ui::clamp_parameter(
        "Hash length",
        hash_length.unwrap_or(settings.hash_length),
        ui::MIN_HASH_LENGTH,
        ui::MAX_HASH_LENGTH,
    );
    pool.fold(&format!("Hash length ({} B)", settings.hash_length));

    let password = ui::prompt_password(visible)?;

    let request = HashRequest {
        password: password.as_bytes(),
        time_cost: settings.time_cost,
        memory_cost_kib: settings.memory_cost_mib * 1024,
        parallelism: settings.parallelism,
        output_len: settings.hash_length as usize,
        salt: hasher::generate_salt(&pool),
        variant: settings.algorithm,
    };

    let invoker = Invoker::new(ConcurrencyPolicy::GuardHashOnly);

    let (outcome, elapsed) = ui::show_progress(options.unicode_support, "Hashing...", || {
        invoker.hash(&request)
    })?;

    match outcome {
        HashOutcome::Encoded(encoded) => {
            let summary = ui::HashSummary {
                variant: settings.algorithm,
                time_cost: settings.time_cost,
                memory_cost_mib: settings.memory_cost_mib,
                parallelism: settings.parallelism,
                hash_length: settings.hash_length,
            };
            ui::display_hash_output(&encoded, &summary, elapsed, options);
        }
        // A request received while busy is dropped without output.
        HashOutcome::Busy => {}
    }

    if settings.save_on_exit && !no_save {
        if let Err(e) = settings.store() {
            eprintln!("WARNING: failed to persist settings: {e:#}");
        }
    }

    Ok(())
}

fn run_verify(encoded: Option<String>, visible: bool, options: &ui::DisplayOptions) -> Result<()> {
    let encoded = match encoded {
        Some(encoded) => encoded,
        None => ui::prompt_encoded_hash()?,
    };

    let password = ui::prompt_password(visible)?;

    let invoker = Invoker::new(ConcurrencyPolicy::GuardHashOnly);

    match invoker.verify(&encoded, password.as_bytes()) {
        Ok(VerifyOutcome::Match) => {
            ui::display_verification_success(options);
            Ok(())
        }
        Ok(VerifyOutcome::Mismatch) => {
            ui::display_verification_failure(options, None);
            std::process::exit(1);
        }
        Ok(VerifyOutcome::Busy) => Ok(()),
        Err(e) => {
            ui::display_verification_failure(options, Some(&format!("{e:#}")));
            std::process::exit(2);
        }
    }
}

fn run_reset(yes: bool) -> Result<()> {
    if !yes && !ui::confirm("Restore all default settings? This cannot be undone.")? {
        eprintln!("Aborted.");
        return Ok(());
    }

    Settings::reset()?;
    println!("Settings restored to defaults.");
    Ok(())
}
