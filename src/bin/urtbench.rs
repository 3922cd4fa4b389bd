//! urtbench - power/FDR benchmark of differential abundance methods on
//! synthetic URT microbiome data.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use urt_bench::bench::{aggregate, run_benchmark, BenchConfig, SummaryTable};
use urt_bench::error::Result;
use urt_bench::report::{render_benchmark_plot, write_method_tables, write_summary_table};
use urt_bench::simulate::{simulate, SimConfig};
use urt_bench::template::TemplateModel;
use urt_bench::truth::{GroundTruth, DEFAULT_LFC_SET};

/// Differential-abundance method benchmark on synthetic URT data
#[derive(Parser)]
#[command(name = "urtbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full benchmark grid and write tables and the plot
    Run {
        /// Optional benchmark configuration YAML; defaults apply otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for result tables and the plot
        #[arg(short, long, default_value = "bench_out")]
        outdir: PathBuf,

        /// Base random seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Worker pool width (overrides the config file)
        #[arg(long)]
        threads: Option<usize>,

        /// Replicates per grid point (overrides the config file)
        #[arg(long)]
        iterations: Option<usize>,

        /// Quick mode: a small grid with few replicates
        #[arg(long)]
        quick: bool,
    },

    /// Write one synthetic dataset (counts, samples, taxa) to a directory
    Simulate {
        /// Output directory
        #[arg(short, long)]
        outdir: PathBuf,

        /// Sample size
        #[arg(short, long, default_value = "50")]
        n_samples: usize,

        /// Proportion of truly differential taxa
        #[arg(short, long, default_value = "0.2")]
        diff_prop: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            outdir,
            seed,
            threads,
            iterations,
            quick,
        } => cmd_run(config, outdir, seed, threads, iterations, quick),
        Commands::Simulate {
            outdir,
            n_samples,
            diff_prop,
            seed,
        } => cmd_simulate(outdir, n_samples, diff_prop, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    config_path: Option<PathBuf>,
    outdir: PathBuf,
    seed: Option<u64>,
    threads: Option<usize>,
    iterations: Option<usize>,
    quick: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => BenchConfig::from_yaml(&path)?,
        None if quick => BenchConfig::quick(),
        None => BenchConfig::default(),
    };
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(threads) = threads {
        config = config.with_threads(threads);
    }
    if let Some(iterations) = iterations {
        config = config.with_iterations(iterations);
    }

    let results = run_benchmark(&config)?;
    eprintln!(
        "{} result rows in {:.1}s",
        results.records.len(),
        results.runtime_seconds
    );

    write_method_tables(&results.records, &outdir)?;
    let summary = aggregate(&results.records);
    write_summary_table(&summary, &outdir.join("summary.tsv"))?;
    std::fs::write(
        outdir.join("summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;
    render_benchmark_plot(&results.records, &outdir.join("power_fdr.png"))?;
    config.to_yaml(&outdir.join("config.yaml"))?;

    println!("{}", SummaryTable(&summary));
    Ok(())
}

fn cmd_simulate(outdir: PathBuf, n_samples: usize, diff_prop: f64, seed: u64) -> Result<()> {
    use rand::SeedableRng;

    let template = TemplateModel::urt()?;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed);
    let truth = GroundTruth::draw(template.n_taxa(), diff_prop, &DEFAULT_LFC_SET, &mut rng);
    let data = simulate(&template, &truth, &SimConfig::new(n_samples), &mut rng)?;

    std::fs::create_dir_all(&outdir)?;
    data.write_to_dir(&outdir)?;
    eprintln!(
        "wrote {} taxa x {} samples to {:?}",
        data.counts.n_taxa(),
        data.counts.n_samples(),
        outdir
    );
    Ok(())
}
