//! Command-line interface for the Feistel distinguisher.

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use feistel_core::{FeistelNetwork, KeySchedule, TableRound};
use feistel_detect::{
    to_reversible, DetectionReport, DetectorConfig, Distinguisher, Instance, InstanceGenerator,
    PermutationTable, Verdict, DEFAULT_ROUNDS,
};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use simon_sampler::{find_non_orthogonal, SimonSampler};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Feistel distinguisher CLI.
#[derive(Parser)]
#[command(
    name = "fdetect",
    version,
    author,
    about = "Distinguish 3-round Feistel networks from random permutations"
)]
struct Cli {
    /// Log every sample and solver insertion.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    /// Feistel network with a table round function.
    Feistel,
    /// Uniformly random permutation.
    Random,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a block oracle instance.
    Gen {
        /// Instance kind.
        #[arg(long, value_enum, default_value_t = Kind::Feistel)]
        kind: Kind,
        /// Half-block width in bits.
        #[arg(long, default_value_t = 8)]
        bits: u32,
        /// Feistel rounds (ignored for random permutations).
        #[arg(long, default_value_t = DEFAULT_ROUNDS)]
        rounds: usize,
        /// Output path for the serialized instance.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Optional RNG seed for reproducible generation.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the distinguisher against a serialized instance.
    Detect {
        /// Path to the serialized instance.
        #[arg(long, value_name = "FILE")]
        instance: PathBuf,
        /// Number of independent runs.
        #[arg(long, default_value_t = 1)]
        runs: usize,
        /// Optional RNG seed for reproducibility.
        #[arg(long)]
        seed: Option<u64>,
        /// Consistent samples allowed per bit of half width.
        #[arg(long, default_value_t = 2)]
        budget_factor: usize,
        /// Give up with an inconclusive verdict after this many discarded samples.
        #[arg(long)]
        max_rejections: Option<usize>,
    },
    /// Generate a Feistel network and a random permutation, then classify both.
    Demo {
        /// Half-block width in bits.
        #[arg(long, default_value_t = 8)]
        bits: u32,
        /// Runs per oracle.
        #[arg(long, default_value_t = 1)]
        runs: usize,
        /// Optional RNG seed for reproducibility.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Check Feistel encrypt/decrypt round trips on random inputs.
    FeistelCheck {
        /// Half-block width in bits.
        #[arg(long, default_value_t = 8)]
        bits: u32,
        /// Number of random samples to test.
        #[arg(long, default_value_t = 256)]
        samples: usize,
        /// Optional RNG seed for reproducibility.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Check that the sampler respects a known hidden period.
    SimonCheck {
        /// Number of samples to draw.
        #[arg(long, default_value_t = 1000)]
        samples: usize,
        /// Optional RNG seed for reproducibility.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Gen {
            kind,
            bits,
            rounds,
            out,
            seed,
        } => cmd_gen(kind, bits, rounds, &out, seed),
        Commands::Detect {
            instance,
            runs,
            seed,
            budget_factor,
            max_rejections,
        } => cmd_detect(&instance, runs, seed, budget_factor, max_rejections),
        Commands::Demo { bits, runs, seed } => cmd_demo(bits, runs, seed),
        Commands::FeistelCheck {
            bits,
            samples,
            seed,
        } => cmd_feistel_check(bits, samples, seed),
        Commands::SimonCheck { samples, seed } => cmd_simon_check(samples, seed),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_gen(kind: Kind, bits: u32, rounds: usize, out: &PathBuf, seed: Option<u64>) -> Result<()> {
    let mut gen = InstanceGenerator::new(seeded_rng(seed));
    let instance = match kind {
        Kind::Feistel => gen.feistel(bits, rounds),
        Kind::Random => gen.random_permutation(bits),
    }
    .context("generate instance")?;
    let bytes = instance.to_bytes().context("serialize instance")?;
    fs::write(out, bytes).with_context(|| format!("write {}", out.display()))?;
    info!(kind = instance.kind(), bits, path = %out.display(), "instance written");
    Ok(())
}

fn cmd_detect(
    instance_path: &PathBuf,
    runs: usize,
    seed: Option<u64>,
    budget_factor: usize,
    max_rejections: Option<usize>,
) -> Result<()> {
    if budget_factor == 0 {
        bail!("budget factor must be positive");
    }
    let instance = load_instance(instance_path)?;
    let config = DetectorConfig {
        bits: instance.bits(),
        budget_factor,
        max_rejections,
    };
    let mut rng = seeded_rng(seed);
    let reports = detect_runs(&instance, config, runs, &mut rng)?;
    print_summary(instance.kind(), &reports);
    Ok(())
}

fn cmd_demo(bits: u32, runs: usize, seed: Option<u64>) -> Result<()> {
    let mut rng = seeded_rng(seed);
    let mut gen = InstanceGenerator::new(ChaCha20Rng::from_seed(derive_seed(&mut rng)));
    let feistel = gen
        .feistel(bits, DEFAULT_ROUNDS)
        .context("generate Feistel network")?;
    let random = gen
        .random_permutation(bits)
        .context("generate random permutation")?;

    for instance in [&feistel, &random] {
        let reports = detect_runs(instance, DetectorConfig::for_bits(bits), runs, &mut rng)?;
        print_summary(instance.kind(), &reports);
    }
    Ok(())
}

fn cmd_feistel_check(bits: u32, samples: usize, seed: Option<u64>) -> Result<()> {
    let mut rng = seeded_rng(seed);
    let table = PermutationTable::random(&mut rng, bits).context("generate round table")?;
    let keys: Vec<u64> = (0..DEFAULT_ROUNDS)
        .map(|_| rng.gen_range(0..1u64 << bits))
        .collect();
    let network = FeistelNetwork::new(
        bits,
        TableRound::new(table.as_slice().to_vec()),
        KeySchedule::new(keys),
    );

    for _ in 0..samples {
        let block = rng.gen_range(0..1u64 << (2 * bits));
        let ciphertext = network.encrypt(block);
        if network.decrypt(ciphertext) != block {
            bail!("round trip failed for {}", hex_word(block, 2 * bits));
        }
    }
    println!("feistel check: {samples} round trips on {}-bit blocks ok", 2 * bits);
    Ok(())
}

fn cmd_simon_check(samples: usize, seed: Option<u64>) -> Result<()> {
    // 2-to-1 on 3 bits with period 0b110.
    const TABLE: [u64; 8] = [5, 2, 0, 6, 0, 6, 5, 2];
    const SECRET: u64 = 0b110;

    let oracle = to_reversible(|x| TABLE[x as usize], 3, 3).context("build oracle")?;
    let mut sampler = SimonSampler::new(seeded_rng(seed));
    if let Some(y) = find_non_orthogonal(&mut sampler, &oracle, SECRET, samples)? {
        bail!("sample {y:03b} is not orthogonal to {SECRET:03b}");
    }
    println!(
        "simon check: {samples} samples orthogonal to {SECRET:03b} ({} gates)",
        oracle.gates().count()
    );
    Ok(())
}

fn detect_runs(
    instance: &Instance,
    config: DetectorConfig,
    runs: usize,
    rng: &mut ChaCha20Rng,
) -> Result<Vec<DetectionReport>> {
    let oracle = instance.oracle();
    let bits = config.bits;
    let mut distinguisher = Distinguisher::with_config(
        config,
        SimonSampler::new(ChaCha20Rng::from_seed(derive_seed(rng))),
        ChaCha20Rng::from_seed(derive_seed(rng)),
    );
    let mut reports = Vec::with_capacity(runs);
    for run in 0..runs {
        let report = distinguisher
            .run(|x| oracle.evaluate(x))
            .with_context(|| format!("detection run {run}"))?;
        println!(
            "run {run}: {} ({}), alpha={} beta={} secret={} attempts={} rejected={}",
            report.verdict,
            report.resolution,
            hex_word(report.masks.alpha, bits),
            hex_word(report.masks.beta, bits),
            report
                .secret
                .map_or_else(|| "-".to_string(), |s| hex_word(s, bits + 1)),
            report.attempts,
            report.rejected,
        );
        reports.push(report);
    }
    Ok(reports)
}

fn print_summary(kind: &str, reports: &[DetectionReport]) {
    let count = |verdict| reports.iter().filter(|r| r.verdict == verdict).count();
    println!(
        "{kind}: {} feistel, {} random, {} inconclusive out of {}",
        count(Verdict::Feistel),
        count(Verdict::RandomPermutation),
        count(Verdict::Inconclusive),
        reports.len()
    );
}

fn hex_word(value: u64, bits: u32) -> String {
    let bytes = (bits as usize).div_ceil(8).max(1);
    hex::encode(&value.to_be_bytes()[8 - bytes..])
}

fn load_instance(path: &PathBuf) -> Result<Instance> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Instance::from_bytes(&bytes).context("deserialize instance")
}

fn seeded_rng(seed: Option<u64>) -> ChaCha20Rng {
    let mut seed_bytes = [0u8; 32];
    match seed {
        Some(value) => seed_bytes[..8].copy_from_slice(&value.to_le_bytes()),
        None => rand::rngs::OsRng.fill_bytes(&mut seed_bytes),
    }
    ChaCha20Rng::from_seed(seed_bytes)
}

fn derive_seed(rng: &mut impl RngCore) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    rng.fill_bytes(&mut seed_bytes);
    seed_bytes
}
