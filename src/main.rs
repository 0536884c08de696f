use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flate2::read::GzDecoder;
use log::Level;
use serde::Deserialize;

use splice_psi::{analyze_gene, analyze_target, EngineOptions, Exon, SpliceGraph, Strand};

/// Quantify alternative splicing of a gene for primer design.
#[derive(Parser, Debug)]
#[command(name = "splice-psi")]
#[command(author, version, about)]
struct Cli {
    /// Verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate PSI of one target exon within its splicing module
    Analyze(AnalyzeArgs),

    /// List every splicing module of the gene with isoforms and abundances
    Modules(ModulesArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Gene description file (JSON, optionally .gz)
    #[arg(long, short)]
    gene: PathBuf,

    /// Target exon as start-end (0-based, half-open)
    #[arg(long, short)]
    target: String,

    /// Write the full report as JSON here (stdout gets the text rendering)
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Priority decay applied to each selected isoform's junctions
    #[arg(long, default_value_t = 10.0)]
    decay_factor: f64,

    /// EM convergence threshold (total absolute probability change)
    #[arg(long, default_value_t = 1e-4)]
    em_epsilon: f64,

    /// EM iteration cap
    #[arg(long, default_value_t = 1000)]
    em_max_iters: usize,
}

#[derive(Args, Debug)]
struct ModulesArgs {
    /// Gene description file (JSON, optionally .gz)
    #[arg(long, short)]
    gene: PathBuf,
}

/// On-disk gene description: annotated transcript exon chains plus observed
/// junctions with read counts. Exon blocks are (start, end), 0-based
/// half-open, in genomic order.
#[derive(Deserialize, Debug)]
struct GeneInput {
    chr: String,
    strand: Strand,
    #[serde(default)]
    transcripts: Vec<Vec<(u32, u32)>>,
    #[serde(default)]
    junctions: Vec<JunctionInput>,
}

#[derive(Deserialize, Debug)]
struct JunctionInput {
    from: (u32, u32),
    to: (u32, u32),
    #[serde(default)]
    count: f64,
}

fn open_bufread(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).with_context(|| format!("open gene file {}", path.display()))?;

    let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);
    if is_gz {
        let gz = GzDecoder::new(f);
        Ok(Box::new(BufReader::new(gz)))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

fn parse_block(block: (u32, u32)) -> Result<Exon> {
    let (start, end) = block;
    if start >= end {
        bail!("invalid exon block {}-{}: start must be < end", start, end);
    }
    Ok(Exon::new(start, end))
}

fn parse_target(s: &str) -> Result<Exon> {
    let (start, end) = s
        .split_once('-')
        .with_context(|| format!("target '{}' is not of the form start-end", s))?;
    let start: u32 = start
        .trim()
        .parse()
        .with_context(|| format!("bad target start in '{}'", s))?;
    let end: u32 = end
        .trim()
        .parse()
        .with_context(|| format!("bad target end in '{}'", s))?;
    parse_block((start, end))
}

fn load_graph(path: &Path) -> Result<SpliceGraph> {
    let reader = open_bufread(path)?;
    let input: GeneInput = serde_json::from_reader(reader)
        .with_context(|| format!("parsing gene description {}", path.display()))?;

    let mut graph = SpliceGraph::new(&input.chr, input.strand);

    for (i, chain) in input.transcripts.iter().enumerate() {
        let exons: Vec<Exon> = chain
            .iter()
            .map(|&b| parse_block(b))
            .collect::<Result<_>>()
            .with_context(|| format!("transcript #{}", i))?;
        graph
            .add_transcript_path(&exons)
            .with_context(|| format!("transcript #{}", i))?;
    }

    for j in &input.junctions {
        let from = parse_block(j.from)?;
        let to = parse_block(j.to)?;
        graph
            .set_junction_weight(from, to, j.count)
            .with_context(|| format!("junction {}..{}", from, to))?;
    }

    Ok(graph)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::Debug } else { Level::Info };
    simple_logger::init_with_level(level)?;

    match cli.cmd {
        Command::Analyze(args) => {
            let graph = load_graph(&args.gene)?;
            let target = parse_target(&args.target)?;
            let opts = EngineOptions {
                decay_factor: args.decay_factor,
                em_epsilon: args.em_epsilon,
                em_max_iters: args.em_max_iters,
            };

            let report = analyze_target(&graph, target, opts)
                .with_context(|| format!("analyzing target {}", target))?;

            println!("{report}");

            if let Some(out) = &args.out {
                let mut f = File::create(out)
                    .with_context(|| format!("creating report file {}", out.display()))?;
                serde_json::to_writer_pretty(&mut f, &report)
                    .with_context(|| format!("writing report to {}", out.display()))?;
                f.write_all(b"\n")?;
                eprintln!("Report written to {}", out.display());
            }
        }

        Command::Modules(args) => {
            let graph = load_graph(&args.gene)?;
            let results = analyze_gene(&graph, EngineOptions::default())?;

            for result in results {
                match result {
                    Ok(summary) => print!("{summary}"),
                    Err(err) => eprintln!("module skipped: {err}"),
                }
            }
        }
    }

    Ok(())
}
