use clap::Parser;
use itertools::Itertools;
use log::{debug, info};
use num_complex::Complex64;
use qtile::gate::{cache, nocache};
use qtile::policy::copy_n;
use qtile::{gate_with_config, Amplitudes, BitInteger, EngineConfig, ParallelPolicy, PolicyKind, Qubit};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::to_writer_pretty;
use std::error::Error;
use std::fs::{self, File};
use std::time::Instant;

const QTILE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "qtile", version = QTILE_VERSION,
    about = "qtile - tiled gate application on quantum state vectors, with on-cache staging for states larger than the cache.\n\
             Use 'qtile help <command>' for more information on a specific command, e.g., 'qtile help run'.",
    long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// settings shared by every command that applies gates
#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// JSON engine configuration file. Flags below override its values.
    #[arg(long, value_name = "PATH")]
    config: Option<String>,
    /// Parallel policy: sequential, rayon or scoped.
    #[arg(long)]
    policy: Option<PolicyKind>,
    /// Worker threads for rayon/scoped (0 = all logical cores).
    #[arg(long)]
    threads: Option<usize>,
    /// Number of on-cache qubits (staging buffer holds 2^N elements).
    #[arg(long, value_name = "N")]
    on_cache: Option<BitInteger>,
    /// Disable on-cache staging and always use the no-cache engine.
    #[arg(long)]
    no_cache: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Applies a random dense gate to a random state and reports timing.
    Run {
        /// Number of qubits of the state vector.
        #[arg(long, default_value_t = 20)]
        qubits: BitInteger,
        /// Operated qubit positions, in gate order (e.g. --target 3 --target 17).
        #[arg(long = "target", required = true)]
        targets: Vec<BitInteger>,
        /// Seed for the state and the gate matrix.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Number of times the gate is applied.
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        /// Write a JSON report to this path.
        #[arg(long, value_name = "PATH")]
        json: Option<String>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Checks the staged engine against the no-cache engine for every choice of operated qubits.
    Verify {
        /// Number of qubits of the state vector.
        #[arg(long, default_value_t = 8)]
        qubits: BitInteger,
        /// Number of operated qubits per gate.
        #[arg(long, default_value_t = 2)]
        arity: usize,
        /// Seed for the states and gate matrices.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Prints the effective engine configuration as JSON.
    Config {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Serialize)]
struct RunReport {
    num_qubits: BitInteger,
    operated_qubits: Vec<BitInteger>,
    num_on_cache_qubits: BitInteger,
    cache_enabled: bool,
    policy: String,
    num_threads: usize,
    repeat: usize,
    elapsed_ms: f64,
    checksum: [f64; 2],
    norm_sqr: f64,
}

fn load_engine_config(args: &EngineArgs) -> Result<EngineConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("error reading '{}': {}", path, e))?;
            EngineConfig::from_json_str(&text)?
        }
        None => EngineConfig::default(),
    };
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(threads) = args.threads {
        config.num_threads = threads;
    }
    if let Some(on_cache) = args.on_cache {
        config.cache.num_on_cache_qubits = on_cache;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

fn check_num_qubits(num_qubits: BitInteger) -> Result<(), Box<dyn Error>> {
    if num_qubits >= usize::BITS {
        return Err(format!("--qubits {} does not fit a {}-bit index", num_qubits, usize::BITS).into());
    }
    Ok(())
}

fn random_state(num_qubits: BitInteger, rng: &mut StdRng) -> Vec<Complex64> {
    (0..1usize << num_qubits)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

// row-major 2^k x 2^k, not necessarily unitary
fn random_matrix(arity: usize, rng: &mut StdRng) -> Vec<Complex64> {
    let dimension = 1usize << arity;
    (0..dimension * dimension)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

fn dense_transform(matrix: &[Complex64]) -> impl Fn(&mut Amplitudes<'_, Complex64>, usize) + Sync + Copy + '_ {
    move |amplitudes: &mut Amplitudes<'_, Complex64>, _thread_index: usize| {
        let input: Vec<Complex64> = amplitudes.iter().copied().collect();
        let dimension = input.len();
        for row in 0..dimension {
            amplitudes[row] = matrix[row * dimension..(row + 1) * dimension]
                .iter()
                .zip(&input)
                .fold(Complex64::new(0.0, 0.0), |sum, (m, a)| sum + m * a);
        }
    }
}

fn run(
    num_qubits: BitInteger,
    targets: Vec<BitInteger>,
    seed: u64,
    repeat: usize,
    json: Option<String>,
    engine: &EngineArgs,
) -> Result<(), Box<dyn Error>> {
    check_num_qubits(num_qubits)?;
    let config = load_engine_config(engine)?;
    let policy = config.build_policy()?;
    let qubits: Vec<Qubit> = targets.iter().copied().map(Qubit).collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = random_state(num_qubits, &mut rng);
    let matrix = random_matrix(qubits.len(), &mut rng);
    info!(
        "run: {} qubits, operated {:?}, policy {} ({} threads), {} on-cache qubits{}",
        num_qubits,
        targets,
        config.policy,
        policy.num_threads(),
        config.cache.num_on_cache_qubits,
        if config.cache.enabled { "" } else { " (staging disabled)" }
    );

    let start = Instant::now();
    for _ in 0..repeat {
        gate_with_config(&policy, &config.cache, &mut state, dense_transform(&matrix), &qubits)?;
    }
    let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

    let checksum = state.iter().fold(Complex64::new(0.0, 0.0), |sum, a| sum + a);
    let norm_sqr: f64 = state.iter().map(|a| a.norm_sqr()).sum();
    println!("applied {} gate(s) in {:.3} ms", repeat, elapsed_ms);
    println!("checksum: {:.12e} {:+.12e}i", checksum.re, checksum.im);
    println!("norm^2:   {:.12e}", norm_sqr);

    if let Some(path) = json {
        let report = RunReport {
            num_qubits,
            operated_qubits: targets,
            num_on_cache_qubits: config.cache.num_on_cache_qubits,
            cache_enabled: config.cache.enabled,
            policy: config.policy.to_string(),
            num_threads: policy.num_threads(),
            repeat,
            elapsed_ms,
            checksum: [checksum.re, checksum.im],
            norm_sqr,
        };
        let outfile = File::create(&path).map_err(|e| format!("error creating '{}': {}", path, e))?;
        to_writer_pretty(outfile, &report)?;
        println!("report written to '{}'", path);
    }
    Ok(())
}

fn verify(num_qubits: BitInteger, arity: usize, seed: u64, engine: &EngineArgs) -> Result<(), Box<dyn Error>> {
    check_num_qubits(num_qubits)?;
    let config = load_engine_config(engine)?;
    let policy = config.build_policy()?;
    let num_on_cache_qubits = config.cache.num_on_cache_qubits;
    if num_on_cache_qubits >= num_qubits {
        return Err(format!("--on-cache {} must be below --qubits {}", num_on_cache_qubits, num_qubits).into());
    }
    if arity > num_on_cache_qubits as usize {
        return Err(format!("--arity {} exceeds --on-cache {}", arity, num_on_cache_qubits).into());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let initial = random_state(num_qubits, &mut rng);
    let mut expected = vec![Complex64::new(0.0, 0.0); initial.len()];
    let mut actual = vec![Complex64::new(0.0, 0.0); initial.len()];
    let mut staging = vec![Complex64::new(0.0, 0.0); 1 << num_on_cache_qubits];

    let mut checked = 0usize;
    let mut mismatches = 0usize;
    for positions in (0..num_qubits).combinations(arity) {
        let reversed: Vec<BitInteger> = positions.iter().rev().copied().collect();
        let orders = if arity > 1 { vec![positions, reversed] } else { vec![positions] };
        for order in orders {
            let qubits: Vec<Qubit> = order.iter().copied().map(Qubit).collect();
            let matrix = random_matrix(arity, &mut rng);

            copy_n(&policy, &initial, &mut expected);
            nocache::gate(&policy, &mut expected, dense_transform(&matrix), &qubits)?;
            copy_n(&policy, &initial, &mut actual);
            cache::gate(&policy, &mut actual, &mut staging, dense_transform(&matrix), &qubits)?;

            checked += 1;
            if expected != actual {
                mismatches += 1;
                let first = expected.iter().zip(&actual).position(|(e, a)| e != a).unwrap_or(0);
                eprintln!(
                    "mismatch for qubits {:?}: first difference at {} ({} vs {})",
                    order, first, expected[first], actual[first]
                );
            } else {
                debug!("verify: qubits {:?} ok", order);
            }
        }
    }

    println!(
        "checked {} qubit orders ({} qubits, arity {}, {} on-cache): {} mismatch(es)",
        checked, num_qubits, arity, num_on_cache_qubits, mismatches
    );
    if mismatches > 0 {
        return Err(format!("{} of {} qubit orders differ between engines", mismatches, checked).into());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            qubits,
            targets,
            seed,
            repeat,
            json,
            engine,
        } => run(qubits, targets, seed, repeat, json, &engine),
        Commands::Verify {
            qubits,
            arity,
            seed,
            engine,
        } => verify(qubits, arity, seed, &engine),
        Commands::Config { engine } => {
            let config = load_engine_config(&engine)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
