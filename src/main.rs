use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plotbook::artifact::{save, ArtifactOptions, OutputFormat};
use plotbook::chart::ChartSpec;
use plotbook::datasets::Sources;
use plotbook::recipes::{self, GalleryConfig};
use plotbook::runtime::render_chart;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plotbook")]
#[command(version)]
#[command(about = "Render a gallery of annotated chart recipes", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List recipe names and titles
    List,
    /// Render gallery recipes (all by default)
    Render {
        /// Recipe names, e.g. bar1 line2
        names: Vec<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// JSON gallery configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Case table CSV replacing the embedded one
        #[arg(long)]
        coronavirus: Option<PathBuf>,
        /// Worker threads; 1 renders sequentially
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Render one chart from a JSON spec
    Chart {
        /// iris, coronavirus, or a CSV path
        #[arg(long)]
        data: String,
        /// JSON chart spec
        #[arg(long)]
        spec: PathBuf,
        /// Keep only rows matching this expression
        #[arg(long)]
        filter: Option<String>,
        /// Output file (.png or .svg)
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
        #[arg(long)]
        dpi: Option<u32>,
        #[arg(long)]
        no_trim: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Png,
    Svg,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Png => OutputFormat::Png,
            Format::Svg => OutputFormat::Svg,
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::List => {
            for recipe in recipes::all() {
                println!("{:<8} {}", recipe.name, recipe.title);
            }
            Ok(())
        }
        Command::Render {
            names,
            out_dir,
            format,
            config,
            coronavirus,
            jobs,
        } => {
            let mut gallery = match config {
                Some(path) => {
                    let json = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read config {}", path.display()))?;
                    GalleryConfig::from_json(&json).context("Failed to parse gallery config")?
                }
                None => GalleryConfig::default(),
            };
            if let Some(dir) = out_dir {
                gallery.out_dir = dir;
            }
            if let Some(f) = format {
                gallery.format = f.into();
            }
            if coronavirus.is_some() {
                gallery.coronavirus = coronavirus;
            }
            if jobs.is_some() {
                gallery.jobs = jobs;
            }
            render_gallery(&names, &gallery)
        }
        Command::Chart {
            data,
            spec,
            filter,
            output,
            width,
            height,
            dpi,
            no_trim,
        } => {
            let defaults = ArtifactOptions::default();
            let options = ArtifactOptions {
                width: width.unwrap_or(defaults.width),
                height: height.unwrap_or(defaults.height),
                dpi: dpi.unwrap_or(defaults.dpi),
                trim: !no_trim,
                ..defaults
            };
            render_single(&data, &spec, filter.as_deref(), &output, &options)
        }
    }
}

fn render_gallery(names: &[String], gallery: &GalleryConfig) -> Result<()> {
    let selected = recipes::select(names)?;

    let mut sources = Sources::builtin().context("Failed to load built-in datasets")?;
    if let Some(path) = &gallery.coronavirus {
        sources = sources
            .with_coronavirus(path)
            .with_context(|| format!("Failed to load case table {}", path.display()))?;
    }

    if let Some(n) = gallery.jobs.filter(|n| *n > 1) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let report = recipes::run_batch(
        &selected,
        &sources,
        &gallery.out_dir,
        gallery.format,
        &gallery.artifact,
        gallery.runs_parallel(),
    );

    for artifact in report.succeeded() {
        println!("{}", artifact.path.display());
    }
    let failures: Vec<_> = report.failed().collect();
    if !failures.is_empty() {
        for (name, err) in &failures {
            eprintln!("{}: {}", name, err);
        }
        bail!("{} of {} recipes failed", failures.len(), report.outcomes.len());
    }
    Ok(())
}

fn render_single(
    data: &str,
    spec_path: &PathBuf,
    filter: Option<&str>,
    output: &PathBuf,
    options: &ArtifactOptions,
) -> Result<()> {
    let sources = Sources::builtin().context("Failed to load built-in datasets")?;
    let mut dataset = sources.resolve(data).context("Failed to load dataset")?;
    if let Some(expr) = filter {
        dataset = dataset.filter_expr(expr).context("Failed to apply filter")?;
    }

    let json = fs::read_to_string(spec_path)
        .with_context(|| format!("Failed to read spec {}", spec_path.display()))?;
    let spec = ChartSpec::from_json(&json).context("Failed to parse chart spec")?;

    let chart = render_chart(&spec, &dataset).context("Failed to render chart")?;
    let artifact = save(&chart, output, options).context("Failed to write chart")?;
    println!("{}", artifact.path.display());
    Ok(())
}
