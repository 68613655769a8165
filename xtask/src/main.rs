use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use warpfield_core::geometry::{Point, SpatialJacobian};
use warpfield_core::transform::{spatial_jacobians, transform_points, AdvancedTransform};
use warpfield_core::{BSplineDeformableTransform, BSplineTransformConfig};

/// Points evaluated between two progress updates.
const CHUNK_SIZE: usize = 4096;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Developer tasks for the warpfield workspace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a B-spline transform configuration template as JSON
    Template {
        /// Spatial dimension (2 or 3)
        #[arg(short, long, default_value_t = 3)]
        dimension: usize,

        /// Spline order (0 to 3)
        #[arg(long, default_value_t = 3)]
        order: usize,

        /// Control points per axis
        #[arg(short, long, default_value_t = 8)]
        size: usize,

        /// Control-point spacing, identical along every axis
        #[arg(long, default_value_t = 1.0)]
        spacing: f64,

        /// Output file; stdout if absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bind random coefficients and evaluate random points in parallel
    Sweep {
        /// Configuration file written by `template`
        #[arg(short, long)]
        config: PathBuf,

        /// Number of query points
        #[arg(short, long, default_value_t = 100_000)]
        points: usize,

        /// Seed for coefficients and points
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Coefficients are drawn uniformly from [-amplitude, amplitude]
        #[arg(short, long, default_value_t = 0.5)]
        amplitude: f64,
    },
}

struct SweepArgs {
    points: usize,
    seed: u64,
    amplitude: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Template { dimension, order, size, spacing, output } => {
            write_template(dimension, order, size, spacing, output.as_deref())?;
        }
        Commands::Sweep { config, points, seed, amplitude } => {
            if !(amplitude.is_finite() && amplitude >= 0.0) {
                bail!("Amplitude must be a non-negative number, got {}", amplitude);
            }
            sweep(&config, SweepArgs { points, seed, amplitude })?;
        }
    }

    Ok(())
}

fn write_template(
    dimension: usize,
    order: usize,
    size: usize,
    spacing: f64,
    output: Option<&Path>,
) -> Result<()> {
    let config = BSplineTransformConfig::new(vec![size; dimension])
        .with_spline_order(order)
        .with_grid_index(vec![0; dimension])
        .with_grid_origin(vec![0.0; dimension])
        .with_grid_spacing(vec![spacing; dimension]);

    // Reject templates the library would refuse to build.
    match dimension {
        2 => drop(config.build::<2>()?),
        3 => drop(config.build::<3>()?),
        _ => bail!("Unsupported dimension: {}. Use 2 or 3.", dimension),
    }

    let json = serde_json::to_string_pretty(&config)?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Template written to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn sweep(path: &Path, args: SweepArgs) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: BSplineTransformConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    match config.grid_size.len() {
        2 => run_sweep::<2>(&config, &args, |jacobian| jacobian.determinant()),
        3 => run_sweep::<3>(&config, &args, |jacobian| jacobian.determinant()),
        n => bail!("Unsupported dimension: {}. Use 2 or 3.", n),
    }
}

fn run_sweep<const D: usize>(
    config: &BSplineTransformConfig,
    args: &SweepArgs,
    determinant: fn(&SpatialJacobian<D>) -> f64,
) -> Result<()> {
    let lattice = config.lattice::<D>()?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    let params: Vec<f64> = (0..D * lattice.number_of_points())
        .map(|_| rng.gen_range(-args.amplitude..=args.amplitude))
        .collect();

    // Sample one lattice spacing beyond the region so the sweep also
    // exercises points without full support.
    let region = *lattice.region();
    let points: Vec<Point<D>> = (0..args.points)
        .map(|_| {
            let cindex = Point::<D>::from(std::array::from_fn(|j| {
                let low = region.index()[j] as f64 - 1.0;
                let high = (region.index()[j] + region.size()[j] as i64) as f64;
                rng.gen_range(low..high)
            }));
            lattice.transform_continuous_index_to_point(&cindex)
        })
        .collect();

    let mut transform = BSplineDeformableTransform::with_lattice(config.order()?, lattice)?;
    transform.set_parameters(&params)?;
    info!(
        "Sweeping {} points over a {}-D order-{} grid with {} parameters",
        points.len(),
        D,
        transform.spline_order(),
        transform.number_of_parameters()
    );

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut first = Vec::with_capacity(points.len());
    for chunk in points.chunks(CHUNK_SIZE) {
        first.extend(transform_points(&transform, chunk));
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let second = transform_points(&transform, &points);
    if first != second {
        bail!("Two evaluation passes over the same points differ");
    }

    let max_difference = points
        .par_iter()
        .zip(&first)
        .map_init(
            || transform.new_context(),
            |ctx, (point, plain)| {
                let diagnostic = transform.transform_point_with_weights(point, ctx);
                if diagnostic.inside != plain.inside {
                    f64::INFINITY
                } else {
                    (diagnostic.point - plain.point).amax()
                }
            },
        )
        .reduce(|| 0.0, f64::max);
    if max_difference > 1e-12 {
        bail!("Plain and diagnostic evaluation differ by {:e}", max_difference);
    }

    let inside = first.iter().filter(|mapped| mapped.inside).count();
    let min_determinant = spatial_jacobians(&transform, &points)
        .iter()
        .zip(&first)
        .filter(|(_, mapped)| mapped.inside)
        .map(|(jacobian, _)| determinant(jacobian))
        .fold(f64::INFINITY, f64::min);

    let seconds = elapsed.as_secs_f64().max(f64::EPSILON);
    info!("Inside fraction: {:.4}", inside as f64 / points.len().max(1) as f64);
    info!("Minimum spatial Jacobian determinant: {:.6}", min_determinant);
    info!(
        "Throughput: {:.0} points/s ({:.3} s)",
        points.len() as f64 / seconds,
        seconds
    );
    info!("Sweep complete!");
    Ok(())
}
