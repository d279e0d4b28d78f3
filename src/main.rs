use clap::{Parser, Subcommand};
use peel::codec::list_codecs;
use peel::config::{ConfigError, EngineConfig};
use peel::{detect, neutralize, render, CodecId, Engine, Payload};
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "peel", version, about = "Peel nested encodings off opaque blobs")]
struct Cli {
    /// Log engine decisions at DEBUG level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repeatedly strip recognised layers until nothing further applies
    Auto {
        /// Read input from file(s); stdin is used when neither files nor TEXT are given
        #[arg(short, long)]
        input: Vec<PathBuf>,
        text: Option<String>,
        #[arg(long)]
        max_depth: Option<usize>,
        /// Per-layer output cap in bytes
        #[arg(long)]
        max_output: Option<usize>,
        /// Characters shown before truncating (the full value still goes to --output)
        #[arg(long)]
        display_limit: Option<usize>,
        /// JSON file with engine limits; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Emit a JSON report instead of text
        #[arg(long)]
        json: bool,
        /// Write the untruncated final value here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Apply exactly one codec
    Decode {
        #[arg(short, long)]
        codec: String,
        #[arg(short, long, conflicts_with = "text")]
        input: Option<PathBuf>,
        text: Option<String>,
        /// Output cap in bytes
        #[arg(long)]
        max_output: Option<usize>,
        /// JSON file with engine limits; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List codecs in priority order
    List,
    /// Report obfuscation indicators found in source text
    Detect {
        #[arg(short, long, conflicts_with = "text")]
        input: Option<PathBuf>,
        text: Option<String>,
    },
    /// Rewrite exec(/eval( call sites to print( for safe inspection
    Neutralize {
        #[arg(short, long, conflicts_with = "text")]
        input: Option<PathBuf>,
        text: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Auto ─────────────────────────────────────────────────────────────
        Commands::Auto { input, text, max_depth, max_output, display_limit, config, json, output } => {
            let mut cfg = load_config(config.as_ref())?;
            if let Some(d) = max_depth     { cfg.max_depth = d; }
            if let Some(m) = max_output    { cfg.max_output_size = m; }
            if let Some(l) = display_limit { cfg.display_limit = l; }
            cfg.validate()?;
            debug!(?cfg, "engine configuration");

            let (labels, payloads) = read_many(&input, text)?;
            if output.is_some() && payloads.len() > 1 {
                return Err("--output takes a single input".into());
            }

            let engine   = Engine::new(cfg);
            let outcomes = engine.decode_batch(payloads);

            if json {
                let reports: Vec<_> = labels.iter().zip(&outcomes)
                    .map(|(source, outcome)| serde_json::json!({
                        "source":      source,
                        "invocations": outcome.invocations,
                        "result":      render(outcome, cfg.display_limit),
                    }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for (source, outcome) in labels.iter().zip(&outcomes) {
                    if outcomes.len() > 1 {
                        println!("── {} ──", source);
                    }
                    print!("{}", render(outcome, cfg.display_limit));
                }
            }

            if let (Some(path), Some(outcome)) = (output, outcomes.first()) {
                std::fs::write(&path, outcome.value.as_bytes())?;
                eprintln!("Full result written to {}", path.display());
            }
        }

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { codec, input, text, max_output, config, output } => {
            let mut cfg = load_config(config.as_ref())?;
            if let Some(m) = max_output { cfg.max_output_size = m; }
            cfg.validate()?;
            debug!(?cfg, "engine configuration");

            let name    = CodecId::from_name(&codec).map_or(codec.as_str(), |id| id.name());
            let payload = read_one(input.as_ref(), text)?;
            let value   = Engine::new(cfg).decode_single(&codec, &payload)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, value.as_bytes())?;
                    println!("{} → {}", name, path.display());
                }
                None => println!("{}", value),
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List => {
            println!("{:>3}  {:<22} Description", "#", "Codec");
            for (i, d) in list_codecs().iter().enumerate() {
                println!("{:>3}  {:<22} {}", i + 1, d.id, d.display_name);
            }
        }

        // ── Detect ───────────────────────────────────────────────────────────
        Commands::Detect { input, text } => {
            let payload = read_one(input.as_ref(), text)?;
            let source  = String::from_utf8_lossy(payload.as_bytes());
            println!("Detected:");
            for indicator in detect(&source) {
                match indicator.suggested_codec() {
                    Some(id) => println!("  • {:<24} try: peel decode --codec \"{}\"", indicator.label(), id.name()),
                    None     => println!("  • {}", indicator.label()),
                }
            }
        }

        // ── Neutralize ───────────────────────────────────────────────────────
        Commands::Neutralize { input, text } => {
            let payload = read_one(input.as_ref(), text)?;
            let (safe, n) = neutralize(&String::from_utf8_lossy(payload.as_bytes()));
            println!("{}", safe);
            eprintln!("{} call site(s) rewritten", n);
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, ConfigError> {
    match path {
        Some(path) => EngineConfig::load(path),
        None       => Ok(EngineConfig::default()),
    }
}

fn init_logging(verbose: bool) {
    let level  = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("peel={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_stdin() -> Result<Payload, std::io::Error> {
    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf)?;
    Ok(Payload::from(buf))
}

fn read_one(input: Option<&PathBuf>, text: Option<String>) -> Result<Payload, std::io::Error> {
    match (input, text) {
        (Some(path), _)    => Ok(Payload::from(std::fs::read(path)?)),
        (None, Some(text)) => Ok(Payload::from(text)),
        (None, None)       => read_stdin(),
    }
}

/// Inputs for a batch, each paired with a label for the report.
fn read_many(files: &[PathBuf], text: Option<String>) -> Result<(Vec<String>, Vec<Payload>), std::io::Error> {
    if files.is_empty() {
        let label = if text.is_some() { "<arg>" } else { "<stdin>" };
        return Ok((vec![label.to_owned()], vec![read_one(None, text)?]));
    }
    let mut labels   = Vec::with_capacity(files.len() + 1);
    let mut payloads = Vec::with_capacity(files.len() + 1);
    for path in files {
        labels.push(path.display().to_string());
        payloads.push(Payload::from(std::fs::read(path)?));
    }
    if let Some(text) = text {
        labels.push("<arg>".to_owned());
        payloads.push(Payload::from(text));
    }
    Ok((labels, payloads))
}
