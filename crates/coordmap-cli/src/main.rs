use anyhow::{Context, Result};
use burn_ndarray::NdArray;
use clap::{Parser, Subcommand};
use coordmap_io::{format_points, read_points, read_space_image, write_points};
use coordmap_mapping::{CoordinateMapper, MapRequest, MapperConfig, TransformInput};
use std::path::{Path, PathBuf};
use tracing::info;

type Backend = NdArray<f64>;

#[derive(Parser)]
#[command(name = "coordmap")]
#[command(about = "Map voxel coordinates between image spaces through registration transforms")]
struct Cli {
    /// Mapper configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a point list from source voxels into the destination space
    Map {
        /// Point list, one `x y z` voxel coordinate per line
        #[arg(short, long)]
        points: PathBuf,

        /// NIfTI image defining the source space
        #[arg(short, long)]
        source: PathBuf,

        /// Transform artifact
        #[arg(short, long)]
        transform: Option<PathBuf>,

        /// NIfTI image defining the destination space
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Method hint (affine, coreg, spm, ants, fsl, fnirt, deformation)
        #[arg(short, long)]
        method: Option<String>,

        /// Apply engine A non-linear artifacts without inversion
        #[arg(long)]
        no_inverse: bool,

        /// World coordinate output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Destination voxel output file
        #[arg(long)]
        voxel_output: Option<PathBuf>,
    },

    /// Show which kernel a transform artifact resolves to
    Classify {
        /// Transform artifact
        transform: PathBuf,

        /// Method hint
        #[arg(short, long)]
        method: Option<String>,

        /// Apply engine A non-linear artifacts without inversion
        #[arg(long)]
        no_inverse: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let mapper = CoordinateMapper::<Backend>::new(Default::default()).with_config(config);

    match cli.command {
        Commands::Map {
            points,
            source,
            transform,
            dest,
            method,
            no_inverse,
            output,
            voxel_output,
        } => {
            let args = MapArgs {
                points: &points,
                source: &source,
                transform: transform.as_deref(),
                dest: dest.as_deref(),
                method: method.as_deref(),
                use_inverse: no_inverse.then_some(false),
            };
            map_points(&mapper, &args, output.as_deref(), voxel_output.as_deref())?;
        }
        Commands::Classify {
            transform,
            method,
            no_inverse,
        } => {
            let resolved = mapper
                .classify(
                    &TransformInput::Path(transform.clone()),
                    method.as_deref(),
                    no_inverse.then_some(false),
                )
                .with_context(|| format!("Failed to classify {}", transform.display()))?;
            println!("{}", resolved.method());
            println!("{:#?}", resolved);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MapperConfig> {
    let Some(path) = path else {
        return Ok(MapperConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    info!("Loaded mapper config from {}", path.display());
    Ok(config)
}

struct MapArgs<'a> {
    points: &'a Path,
    source: &'a Path,
    transform: Option<&'a Path>,
    dest: Option<&'a Path>,
    method: Option<&'a str>,
    use_inverse: Option<bool>,
}

fn map_points(
    mapper: &CoordinateMapper<Backend>,
    args: &MapArgs<'_>,
    output: Option<&Path>,
    voxel_output: Option<&Path>,
) -> Result<()> {
    let points = read_points(args.points)
        .with_context(|| format!("Failed to read points {}", args.points.display()))?;
    let source = read_space_image(args.source)
        .with_context(|| format!("Failed to read source space {}", args.source.display()))?;
    let dest = args
        .dest
        .map(|path| {
            read_space_image(path)
                .with_context(|| format!("Failed to read destination space {}", path.display()))
        })
        .transpose()?;

    let mut request = MapRequest::new(&points, &source);
    if let Some(transform) = args.transform {
        request = request.transform(transform);
    }
    if let Some(dest) = &dest {
        request = request.dest(dest);
    }
    if let Some(method) = args.method {
        request = request.method(method);
    }
    if let Some(use_inverse) = args.use_inverse {
        request = request.use_inverse(use_inverse);
    }

    info!("Mapping {} points from {}", points.len(), args.source.display());
    let mapped = mapper.map(&request).context("Coordinate mapping failed")?;

    match output {
        Some(path) => {
            write_points(path, &mapped.world)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote world coordinates to {}", path.display());
        }
        None => print!("{}", format_points(&mapped.world)),
    }

    match (voxel_output, &mapped.voxel) {
        (Some(path), Some(voxel)) => {
            write_points(path, voxel)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote destination voxels to {}", path.display());
        }
        (Some(path), None) => {
            anyhow::bail!(
                "No destination voxels available for {}; pass --dest",
                path.display()
            );
        }
        (None, _) => {}
    }

    Ok(())
}
