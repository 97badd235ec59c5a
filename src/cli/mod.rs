//! CLI module
//!
//! Command-line interface for sha1bench. Each command owns one report and
//! flushes it once before returning.

mod args;

pub use args::{Args, Commands};

use anyhow::{Context, Result};
use sha1bench::config::{self, Config, OracleKind};
use sha1bench::core::chunker::{ChunkSet, UniversalNewlines, chunk_and_hash};
use sha1bench::core::error::SessionError;
use sha1bench::core::manifest::{Manifest, decode_blob, encode_chunk_set};
use sha1bench::core::transfer::{Receiver, Transmitter};
use sha1bench::core::verify::{
    BuiltinHasher, CommandHasher, ReferenceHasher, Verification, Verifier,
};
use sha1bench::report::{Report, Role, VerificationSummary};
use sha1bench::util::{self, hash::sha1_reader};
use std::io::{BufReader, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

/// Dispatch a parsed command line
pub fn run(args: Args) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    let platform = args.platform;

    match args.command {
        Commands::Hash {
            source,
            out_dir,
            chunk_size,
        } => {
            if let Some(size) = chunk_size {
                config.hashing.chunk_size = size;
            }
            config.validate()?;
            let out_dir = out_dir.unwrap_or_else(|| config.files.work_dir.clone());
            hash_source(&config, &platform, &source, &out_dir)
        }
        Commands::Transmit {
            source,
            host,
            port,
            framing,
            chunk_size,
        } => {
            if let Some(port) = port {
                config.network.port = port;
            }
            if let Some(framing) = framing {
                config.network.framing = framing.into();
            }
            if let Some(size) = chunk_size {
                config.hashing.chunk_size = size;
            }
            config.validate()?;
            transmit(&config, &platform, &source, host)
        }
        Commands::Receive {
            bind,
            port,
            framing,
            timeout,
            json,
        } => {
            if let Some(port) = port {
                config.network.port = port;
            }
            if let Some(framing) = framing {
                config.network.framing = framing.into();
            }
            if let Some(secs) = timeout {
                config.network.receive_timeout_secs = secs;
            }
            config.validate()?;
            receive(&config, &platform, bind, json)
        }
        Commands::Verify {
            manifest,
            blob,
            json,
        } => verify_files(&config, &platform, &manifest, &blob, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_from(path),
        None => config::load(),
    }
}

/// Open the source, as text when newline normalisation is on
fn open_source(source: &Path, normalize: bool) -> Result<Box<dyn Read>> {
    let file = std::fs::File::open(source)
        .with_context(|| format!("Failed to open source {:?}", source))?;
    let reader = BufReader::new(file);
    if normalize {
        Ok(Box::new(UniversalNewlines::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Chunk, hash and write the manifest and blob into `out_dir`
fn prepare(
    config: &Config,
    source: &Path,
    out_dir: &Path,
    report: &mut Report,
) -> Result<(ChunkSet, Vec<u8>, Vec<u8>)> {
    let normalize = config.hashing.normalize_newlines;
    let set = chunk_and_hash(open_source(source, normalize)?, config.hashing.chunk_size)
        .with_context(|| format!("Failed to read source {:?}", source))?;

    report.push("Hashing:");
    for (n, hash) in set.hashes.iter().enumerate() {
        report.push(format!("\tHashed value {}: 0x{}", n + 1, hash));
    }
    report.push(format!(
        "{} chunks of up to {} bytes, {} bytes total",
        set.len(),
        config.hashing.chunk_size,
        set.total_bytes()
    ));

    // the last running digest covers the whole file
    if let Some(last) = set.hashes.last() {
        let whole = sha1_reader(open_source(source, normalize)?)
            .with_context(|| format!("Failed to read source {:?}", source))?;
        if whole != last.as_str() {
            tracing::warn!("Final cumulative digest differs from whole-file SHA-1 of {:?}", source);
            report.push("WARNING: final digest does not match whole-file SHA-1");
        }
    }

    let (manifest, blob) = encode_chunk_set(&set, config.hashing.record_terminator)?;

    let manifest_path = out_dir.join(&config.files.manifest_name);
    let blob_path = out_dir.join(&config.files.transmit_blob_name);
    util::write_file(&manifest_path, &manifest)?;
    util::write_file(&blob_path, &blob)?;
    tracing::info!("Wrote {:?} and {:?}", manifest_path, blob_path);

    Ok((set, manifest, blob))
}

/// `sha1bench hash`
pub fn hash_source(config: &Config, platform: &str, source: &Path, out_dir: &Path) -> Result<ExitCode> {
    let elapsed_start = Instant::now();
    let mut report = Report::with_header(platform, Role::Transmitter, true);

    let program_start = Instant::now();
    let result = prepare(config, source, out_dir, &mut report);
    let execution = program_start.elapsed();

    let results_path = out_dir.join(&config.files.results_name_tx);
    finish(&mut report, result.map(|_| ()), execution, elapsed_start, &results_path, config)?;
    Ok(ExitCode::SUCCESS)
}

/// `sha1bench transmit`
pub fn transmit(config: &Config, platform: &str, source: &Path, host: IpAddr) -> Result<ExitCode> {
    let elapsed_start = Instant::now();
    let mut report = Report::with_header(platform, Role::Transmitter, true);
    let work_dir = config.files.work_dir.clone();

    let program_start = Instant::now();
    let prepared = prepare(config, source, &work_dir, &mut report);
    let execution = program_start.elapsed();

    let result = prepared.and_then(|(_, manifest, blob)| {
        let addr = SocketAddr::new(host, config.network.port);
        report.push(format!(
            "Sending to {} ({} framing)",
            addr, config.network.framing
        ));
        let acks = Transmitter::new(config.transfer_options())
            .send(addr, &manifest, &blob)
            .map_err(SessionError::from)?;
        report.push(acks.manifest);
        report.push(acks.payload);
        Ok(())
    });

    let results_path = work_dir.join(&config.files.results_name_tx);
    finish(&mut report, result, execution, elapsed_start, &results_path, config)?;
    Ok(ExitCode::SUCCESS)
}

/// `sha1bench receive`
pub fn receive(config: &Config, platform: &str, bind: IpAddr, json: bool) -> Result<ExitCode> {
    let elapsed_start = Instant::now();
    let mut report = Report::with_header(platform, Role::Receiver, true);
    let work_dir = config.files.work_dir.clone();
    let results_path = work_dir.join(&config.files.results_name_rx);

    let addr = SocketAddr::new(bind, config.network.port);
    let received = Receiver::bind(addr, config.transfer_options()).and_then(|mut receiver| {
        println!("Listening on {} ...", receiver.local_addr());
        receiver.run()
    });

    let files = match received {
        Ok(files) => files,
        Err(e) => {
            let err = anyhow::Error::from(SessionError::from(e));
            return finish(&mut report, Err(err), Duration::ZERO, elapsed_start, &results_path, config)
                .map(|()| ExitCode::FAILURE);
        }
    };
    report.push(format!(
        "Received {} manifest bytes and {} payload bytes from {}",
        files.manifest.len(),
        files.blob.len(),
        files.peer
    ));

    let manifest_path = work_dir.join(&config.files.manifest_name);
    let blob_path = work_dir.join(&config.files.receive_blob_name);
    let saved = util::write_file(&manifest_path, &files.manifest)
        .and_then(|()| util::write_file(&blob_path, &files.blob))
        .with_context(|| format!("Failed to save received files in {:?}", work_dir));
    if let Err(err) = saved {
        return finish(&mut report, Err(err), Duration::ZERO, elapsed_start, &results_path, config)
            .map(|()| ExitCode::FAILURE);
    }

    let program_start = Instant::now();
    let verified = verify_bytes(config, &files.manifest, &files.blob, &mut report, json);
    let execution = program_start.elapsed();

    let clean = verified.as_ref().map(|v| v.is_clean()).unwrap_or(false);
    finish(&mut report, verified.map(|_| ()), execution, elapsed_start, &results_path, config)?;
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// `sha1bench verify`
pub fn verify_files(
    config: &Config,
    platform: &str,
    manifest: &Path,
    blob: &Path,
    json: bool,
) -> Result<ExitCode> {
    let elapsed_start = Instant::now();
    let mut report = Report::with_header(platform, Role::Receiver, true);
    let results_path = config.files.work_dir.join(&config.files.results_name_rx);

    let manifest_bytes =
        std::fs::read(manifest).with_context(|| format!("Failed to read manifest {:?}", manifest))?;
    let blob_bytes = std::fs::read(blob).with_context(|| format!("Failed to read blob {:?}", blob))?;

    let program_start = Instant::now();
    let verified = verify_bytes(config, &manifest_bytes, &blob_bytes, &mut report, json);
    let execution = program_start.elapsed();

    let clean = verified.as_ref().map(|v| v.is_clean()).unwrap_or(false);
    finish(&mut report, verified.map(|_| ()), execution, elapsed_start, &results_path, config)?;
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Parse, split and reconcile received bytes, reporting every outcome
fn verify_bytes(
    config: &Config,
    manifest: &[u8],
    blob: &[u8],
    report: &mut Report,
    json: bool,
) -> Result<Verification> {
    println!("Reading hashes and chunks...");
    let manifest = Manifest::parse(manifest).map_err(SessionError::from)?;
    let chunks = decode_blob(blob, config.hashing.record_terminator);
    report.push(format!(
        "Manifest holds {} hashes, blob holds {} chunks",
        manifest.len(),
        chunks.len()
    ));

    println!("Comparing hashes...");
    let scratch_root = config.files.work_dir.clone();
    let verification = match config.oracle.kind {
        OracleKind::Command => run_verifier(
            CommandHasher::new(&config.oracle.program, config.oracle.args.clone()),
            config,
            scratch_root,
            &manifest,
            &chunks,
        ),
        OracleKind::Builtin => run_verifier(BuiltinHasher, config, scratch_root, &manifest, &chunks),
    }
    .context("Failed to set up scratch directory")?;

    report.push_verification(&verification);
    if json {
        println!("{}", VerificationSummary::new(&verification).to_json()?);
    }
    Ok(verification)
}

fn run_verifier<H: ReferenceHasher>(
    hasher: H,
    config: &Config,
    scratch_root: PathBuf,
    manifest: &Manifest,
    chunks: &[sha1bench::core::chunker::Chunk],
) -> std::io::Result<Verification> {
    Verifier::new(hasher)
        .with_mode(config.oracle.scratch)
        .with_scratch_root(scratch_root)
        .verify(manifest, chunks)
}

/// Record the outcome and timings, then flush the report once
fn finish(
    report: &mut Report,
    result: Result<()>,
    execution: Duration,
    elapsed_start: Instant,
    results_path: &Path,
    config: &Config,
) -> Result<()> {
    if let Err(e) = &result {
        report.push(format!("FAILED: {:#}", e));
    }
    report.push("");
    report.push_timing(execution, elapsed_start.elapsed());
    report
        .flush_to(results_path, config.hashing.record_terminator)
        .with_context(|| format!("Failed to write report {:?}", results_path))?;
    result
}
