use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use segway_inputs::app::App;
use segway_inputs::config::{ConfigLoader, RunConfig};
use segway_inputs::error::SegwayError;
use segway_inputs::output::write_input_json;
use segway_inputs::portal::{BaseUrl, DEFAULT_BASE_URL, Keypair, PortalHttpClient};
use segway_inputs::recolor::{default_color_table, recolor_bed_file};

#[derive(Parser)]
#[command(name = "segway-inputs")]
#[command(about = "Build Segway input documents from ENCODE reference epigenomes")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Select signal files for a reference epigenome and write the input JSON")]
    MakeInput(MakeInputArgs),
    #[command(about = "Recolor a Segway annotation BED with the chromatin-state palette")]
    RecolorBed(RecolorArgs),
}

#[derive(Args)]
struct MakeInputArgs {
    #[arg(short, long, help = "Reference epigenome accession")]
    accession: String,

    #[arg(short, long, help = "Portal path of the chrom sizes file")]
    chrom_sizes: String,

    #[arg(short = 'g', long, help = "Portal path of the annotation GTF file")]
    annotation_gtf: String,

    #[arg(short, long, default_value = "input.json")]
    outfile: Utf8PathBuf,

    #[arg(short, long, help = "JSON keypair file with a \"submit\" section")]
    keypair: Option<Utf8PathBuf>,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, num_args = 1.., help = "Assays to leave out, e.g. \"DNase-seq\"")]
    skip_assays: Vec<String>,

    #[arg(long, num_args = 1.., help = "Only keep datasets with these target labels")]
    chip_targets: Vec<String>,

    #[arg(long)]
    namespace: Option<String>,

    #[arg(long, help = "JSON object of extra scalar parameters")]
    params: Option<Utf8PathBuf>,

    #[arg(short = 'f', long)]
    minibatch_fraction: Option<f64>,

    #[arg(short = 'm', long)]
    max_train_rounds: Option<u32>,

    #[arg(long)]
    prior_strength: Option<f64>,

    #[arg(long)]
    num_segway_cpus: Option<u32>,

    #[arg(long = "param", value_name = "KEY=VALUE")]
    raw_params: Vec<String>,
}

#[derive(Args)]
struct RecolorArgs {
    bed: Utf8PathBuf,

    #[arg(short, long)]
    output_filename: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SegwayError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SegwayError) -> u8 {
    match error {
        SegwayError::Configuration(_) => 2,
        error if error.is_transport() => 3,
        SegwayError::Selection(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::MakeInput(args) => run_make_input(args),
        Commands::RecolorBed(args) => {
            recolor_bed_file(&args.bed, &args.output_filename, &default_color_table())?;
            info!(output = %args.output_filename, "recolored BED written");
            Ok(())
        }
    }
}

fn run_make_input(args: MakeInputArgs) -> miette::Result<()> {
    let base_url = BaseUrl::parse(&args.base_url)?;
    let keypair = args
        .keypair
        .as_deref()
        .map(Keypair::load)
        .transpose()?;

    let mut params = Vec::new();
    if let Some(value) = args.minibatch_fraction {
        params.push(("minibatch_fraction".to_string(), Value::from(value)));
    }
    if let Some(value) = args.max_train_rounds {
        params.push(("max_train_rounds".to_string(), Value::from(value)));
    }
    if let Some(value) = args.prior_strength {
        params.push(("prior_strength".to_string(), Value::from(value)));
    }
    if let Some(value) = args.num_segway_cpus {
        params.push(("num_segway_cpus".to_string(), Value::from(value)));
    }

    let request = ConfigLoader::resolve(RunConfig {
        accession: args.accession,
        chrom_sizes: args.chrom_sizes,
        annotation_gtf: args.annotation_gtf,
        skip_assays: args.skip_assays,
        chip_targets: args.chip_targets,
        namespace: args.namespace,
        params_file: args.params,
        params,
        raw_params: args.raw_params,
    })?;

    let portal = PortalHttpClient::new(base_url, keypair)?;
    let app = App::new(portal);
    let document = app.make_input_document(&request)?;
    write_input_json(&args.outfile, &document)?;
    info!(outfile = %args.outfile, "input JSON written");
    Ok(())
}
