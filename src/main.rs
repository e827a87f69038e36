use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use limb_rigger::config::{load_config, Config};
use limb_rigger::inspect::DEFAULT_MAX_GROUPS;
use limb_rigger::{export_limbs, import_scene, inspect_scene, Side};

#[derive(Parser)]
#[command(name = "limb-rigger")]
#[command(about = "Cut single-arm sub-rigs out of a skinned glTF character")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print objects, bones and vertex groups of a glTF/GLB file
    Inspect {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Vertex groups listed per mesh
        #[arg(long, default_value_t = DEFAULT_MAX_GROUPS)]
        max_groups: usize,

        /// Print a JSON report instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Export left/right hand-and-elbow rigs
    Export {
        /// Input glTF/GLB file (overrides config `source`)
        input: Option<PathBuf>,

        /// Output directory (overrides config `output_dir`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Which side(s) to export
        #[arg(long, value_enum, default_value_t = SideArg::Both)]
        side: SideArg,

        /// Vertices at or below this allowed-group weight are deleted
        #[arg(long)]
        min_weight: Option<f32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Left,
    Right,
    Both,
}

impl SideArg {
    fn sides(self) -> Vec<Side> {
        match self {
            SideArg::Left => vec![Side::Left],
            SideArg::Right => vec![Side::Right],
            SideArg::Both => Side::BOTH.to_vec(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            input,
            max_groups,
            json,
        } => {
            let scene = import_scene(&input)
                .with_context(|| format!("Failed to inspect {:?}", input))?;
            let report = inspect_scene(&scene, max_groups);
            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.render_text());
            }
        }

        Commands::Export {
            input,
            output,
            config,
            side,
            min_weight,
        } => {
            let config = match &config {
                Some(path) => load_config(path)?,
                None => Config::default(),
            };
            let source = input
                .or_else(|| config.source.clone())
                .context("No input file given and no `source` in config")?;
            let options = config.export_options(&side.sides(), output, min_weight);

            let reports = export_limbs(&source, &options)
                .with_context(|| format!("Failed to export limbs from {:?}", source))?;
            for report in &reports {
                tracing::info!(
                    "{}: {} bones, {} vertices, {} vertex groups ({} bones and {} vertices removed)",
                    report.side,
                    report.bones,
                    report.vertices,
                    report.vertex_groups,
                    report.removed_bones,
                    report.removed_vertices
                );
            }
        }
    }

    Ok(())
}
