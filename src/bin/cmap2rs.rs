//! Compile CMap files into static Rust tables.
//!
//! Each input file is parsed and optimized, then written as a Rust module
//! holding a `StaticCMap` definition, ready to be registered in the built-in
//! CMap table.
//!
//! Usage:
//!   cargo run --release --bin cmap2rs -- --output-dir src/cmap/generated UniJIS-UCS2-H UniJIS-UCS2-V
//!   cargo run --release --bin cmap2rs -- --dump Adobe-Japan1-UCS2

use cmap_oxide::cmap::codegen::{static_ident, write_static_cmap};
use cmap_oxide::cmap::CMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

struct Cmap2RsConfig {
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    dump: bool,
}

impl Cmap2RsConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut inputs = Vec::new();
        let mut output_dir = PathBuf::from(".");
        let mut dump = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--output-dir" | "-o" => {
                    i += 1;
                    match args.get(i) {
                        Some(dir) => output_dir = PathBuf::from(dir),
                        None => return Err("--output-dir requires a directory".to_string()),
                    }
                },
                "--dump" | "-d" => {
                    dump = true;
                },
                "--help" | "-h" => return Err(String::new()),
                flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
                path => inputs.push(PathBuf::from(path)),
            }
            i += 1;
        }

        if inputs.is_empty() {
            return Err("no input files".to_string());
        }

        Ok(Self {
            inputs,
            output_dir,
            dump,
        })
    }
}

fn print_usage() {
    eprintln!("Usage: cmap2rs [--dump] [--output-dir DIR] CMAP_FILE...");
    eprintln!();
    eprintln!("  --dump, -d            print a readable listing instead of generating Rust");
    eprintln!("  --output-dir, -o DIR  directory for generated modules (default: .)");
}

/// Module file name for a CMap: `UniJIS-UCS2-H` becomes `unijis_ucs2_h.rs`.
fn module_file_name(ident: &str) -> String {
    format!("{}.rs", ident.to_ascii_lowercase())
}

fn process(path: &Path, config: &Cmap2RsConfig) -> cmap_oxide::Result<()> {
    let data = std::fs::read(path)?;
    let cmap = CMap::parse(&data)?;
    log::info!(
        "{}: CMap '{}', {} codespaces, {} ranges, {} table entries",
        path.display(),
        cmap.name(),
        cmap.codespaces().len(),
        cmap.ranges().len(),
        cmap.table().len()
    );

    if config.dump {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        cmap.write_debug(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    let name = if cmap.name().is_empty() {
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    } else {
        cmap.name().to_string()
    };
    let ident = static_ident(&name);
    let out_path = config.output_dir.join(module_file_name(&ident));

    let mut out = BufWriter::new(File::create(&out_path)?);
    write_static_cmap(&cmap, &ident, &mut out)?;
    out.flush()?;
    println!("✓ {} -> {} ({})", path.display(), out_path.display(), ident);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match Cmap2RsConfig::from_args() {
        Ok(config) => config,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {}", msg);
            }
            print_usage();
            return ExitCode::FAILURE;
        },
    };

    if !config.dump {
        if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
            eprintln!("Error: cannot create {}: {}", config.output_dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let mut failures = 0;
    for path in &config.inputs {
        if let Err(e) = process(path, &config) {
            eprintln!("❌ {}: {}", path.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        eprintln!("{} of {} files failed", failures, config.inputs.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
