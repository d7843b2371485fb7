use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use earthtones::{
    Earthtones, EarthtonesConfig, EarthtonesRequest, ExtractParams, HttpTileSource, Method, Provider, get_earthtones,
    palette_from_bytes, render,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Derive earth-inspired color palettes from satellite imagery.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file; defaults apply to anything it omits
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Palette for the imagery around a location
    Location {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,

        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,

        #[arg(short, long, default_value_t = 11)]
        zoom: u32,

        /// Imagery provider
        #[arg(long, default_value = "default")]
        provider: Provider,

        /// Return the palette without the source imagery
        #[arg(long)]
        no_map: bool,

        /// Write the imagery and palette strip to this PNG
        #[arg(short, long = "render")]
        render_to: Option<PathBuf>,

        #[command(flatten)]
        palette: PaletteArgs,
    },

    /// Palette for one or more local image files
    Image {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write a palette strip per input into this directory
        #[arg(short = 'd', long)]
        render_dir: Option<PathBuf>,

        #[command(flatten)]
        palette: PaletteArgs,
    },

    /// Print the effective configuration as JSON
    PrintConfig,
}

#[derive(Args, Debug)]
struct PaletteArgs {
    /// Number of colors
    #[arg(short = 'k', long, default_value_t = 3)]
    n_colors: usize,

    /// Clustering method: kmeans or pam
    #[arg(short, long, default_value = "pam")]
    method: Method,

    /// Keep every n-th valid pixel
    #[arg(short, long, default_value_t = 500)]
    sample_rate: usize,

    /// Seed for reproducible k-means
    #[arg(long)]
    seed: Option<u64>,

    /// Order the palette from dark to light
    #[arg(long)]
    sort: bool,

    /// Print JSON instead of plain hex
    #[arg(long)]
    json: bool,
}

impl PaletteArgs {
    fn params(&self) -> ExtractParams {
        ExtractParams {
            number_of_colors: self.n_colors,
            method: self.method,
            sample_rate: self.sample_rate,
            seed: self.seed,
        }
    }
}

const RENDER_WIDTH: u32 = 512;

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EarthtonesConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EarthtonesConfig::default(),
    };

    match cli.command {
        Command::Location {
            latitude,
            longitude,
            zoom,
            provider,
            no_map,
            render_to,
            palette,
        } => {
            let request = EarthtonesRequest {
                latitude,
                longitude,
                zoom,
                number_of_colors: palette.n_colors,
                method: palette.method,
                sample_rate: palette.sample_rate,
                include_map: !no_map || render_to.is_some(),
                provider,
                seed: palette.seed,
            };
            let source = HttpTileSource::new(&config.tiles).context("creating tile client")?;
            let mut result = get_earthtones(&request, &source, &config).context("deriving earthtones")?;
            if palette.sort {
                result = result.sorted_by_lightness();
            }

            if let Some(path) = &render_to {
                save_png(&render::render(&result, RENDER_WIDTH), path)?;
            }
            if no_map {
                result = Earthtones::Palette(result.into_palette());
            }
            print_result(&result, palette.json)?;
        }
        Command::Image {
            inputs,
            render_dir,
            palette,
        } => {
            let params = palette.params();
            let mut outputs = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
                let mut colors = palette_from_bytes(&bytes, &params, &config)
                    .with_context(|| format!("extracting palette from {}", input.display()))?;
                if palette.sort {
                    colors = colors.sorted_by_lightness();
                }

                if let Some(dir) = &render_dir {
                    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
                    let strip = render::render(&Earthtones::Palette(colors.clone()), RENDER_WIDTH);
                    save_png(&strip, &dir.join(format!("{stem}_palette.png")))?;
                }

                if palette.json {
                    outputs.push(serde_json::json!({ "input": input, "palette": colors }));
                } else {
                    println!("{}\t{colors}", input.display());
                }
            }
            if palette.json {
                println!("{}", serde_json::to_string_pretty(&outputs)?);
            }
        }
        Command::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn print_result(result: &Earthtones, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.palette());
    }
    Ok(())
}

fn save_png(img: &image::RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "saved render");
    Ok(())
}
