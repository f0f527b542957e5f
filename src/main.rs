//! CLI for wavemark
//!
//! ```bash
//! wavemark embed photo.png -m "Copyright © 2024 MyCompany" -o marked.png
//! wavemark extract marked.png
//! wavemark capacity photo.png --level 3
//! wavemark batch -m "ACME" --out-dir marked/ a.png b.png c.png
//! wavemark robustness marked.png -m "Copyright © 2024 MyCompany" --seed 7
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use wavemark::{
    capacity_for, embed, embed_batch, extract, extract_batch, suggest_step, EmbedParams,
    ExtractParams, ImageAttackSimulator, PixelBuffer, RobustnessSuite, SubBand, Wavelet,
};

#[derive(Parser)]
#[command(
    name = "wavemark",
    version,
    about = "Invisible DWT + QIM image watermarking"
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Transform parameters shared by every subcommand.
///
/// Flags override values loaded from `--params`.
#[derive(Args, Clone, Debug)]
struct ParamArgs {
    /// JSON parameter file
    #[arg(short, long)]
    params: Option<PathBuf>,
    /// Wavelet: haar, db4, db8
    #[arg(short, long)]
    wavelet: Option<Wavelet>,
    /// Decomposition level
    #[arg(short, long)]
    level: Option<usize>,
    /// Subband: ll, lh, hl, hh
    #[arg(short, long)]
    band: Option<SubBand>,
    /// Quantization step
    #[arg(short, long)]
    step: Option<f64>,
    /// Embedding strength (0-1), used with --auto-step
    #[arg(long)]
    strength: Option<f64>,
}

impl ParamArgs {
    fn embed_params(&self) -> anyhow::Result<EmbedParams> {
        let mut params = match &self.params {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parse parameters in {}", path.display()))?
            }
            None => EmbedParams::default(),
        };
        if let Some(w) = self.wavelet {
            params.wavelet = w;
        }
        if let Some(l) = self.level {
            params.level = l;
        }
        if let Some(b) = self.band {
            params.band = b;
        }
        if let Some(s) = self.step {
            params.step = s;
        }
        if let Some(s) = self.strength {
            params.strength = s;
        }
        Ok(params)
    }

    fn extract_params(&self) -> anyhow::Result<ExtractParams> {
        Ok(ExtractParams::from(&self.embed_params()?))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a message into an image
    Embed {
        /// Carrier image
        input: PathBuf,
        /// Message to embed
        #[arg(short, long)]
        message: String,
        /// Output image (PNG recommended)
        #[arg(short, long)]
        output: PathBuf,
        /// Derive the step from the image instead of using --step
        #[arg(long)]
        auto_step: bool,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Read a message back from an image
    Extract {
        /// Watermarked image
        input: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Show how many message bits an image can carry
    Capacity {
        input: PathBuf,
        /// Decomposition level
        #[arg(short, long, default_value_t = 2)]
        level: usize,
    },
    /// Embed (or extract) many images in parallel
    Batch {
        /// Input images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Message to embed; omit to extract instead
        #[arg(short, long)]
        message: Option<String>,
        /// Directory for watermarked images
        #[arg(long, default_value = "watermarked")]
        out_dir: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Attack a watermarked image and report bit error rates
    Robustness {
        /// Watermarked image
        input: PathBuf,
        /// Message that was embedded
        #[arg(short, long)]
        message: String,
        /// Noise seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        params: ParamArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Embed {
            input,
            message,
            output,
            auto_step,
            params,
        } => cmd_embed(&input, &message, &output, auto_step, &params),
        Commands::Extract {
            input,
            json,
            params,
        } => cmd_extract(&input, json, &params),
        Commands::Capacity { input, level } => cmd_capacity(&input, level),
        Commands::Batch {
            inputs,
            message,
            out_dir,
            params,
        } => cmd_batch(&inputs, message.as_deref(), &out_dir, &params),
        Commands::Robustness {
            input,
            message,
            seed,
            json,
            params,
        } => cmd_robustness(&input, &message, seed, json, &params),
    }
}

fn load_image(path: &Path) -> anyhow::Result<PixelBuffer> {
    let img = image::open(path)
        .with_context(|| format!("open {}", path.display()))?
        .to_rgba8();
    Ok(PixelBuffer::try_from(img)?)
}

fn save_image(buffer: PixelBuffer, path: &Path) -> anyhow::Result<()> {
    let rgba = buffer.into_rgba_image();
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    let saved = if is_jpeg {
        warn!("JPEG output is lossy and may damage the watermark");
        image::DynamicImage::ImageRgba8(rgba).to_rgb8().save(path)
    } else {
        rgba.save(path)
    };
    saved.with_context(|| format!("write {}", path.display()))
}

fn cmd_embed(
    input: &Path,
    message: &str,
    output: &Path,
    auto_step: bool,
    args: &ParamArgs,
) -> anyhow::Result<()> {
    let image = load_image(input)?;
    let mut params = args.embed_params()?;
    if auto_step {
        params.step = suggest_step(&image, &params)?;
        info!(step = params.step, "using suggested step");
    }

    let out = embed(&image, message, &params)?;
    save_image(out.image, output)?;

    eprintln!(
        "embedded {} bits ({} available) -> {} (PSNR {:.2} dB, SSIM {:.4})",
        out.payload_bits,
        out.capacity,
        output.display(),
        out.metrics.psnr,
        out.metrics.ssim,
    );
    if params.step != EmbedParams::default().step {
        eprintln!("extract with --step {}", params.step);
    }
    Ok(())
}

fn cmd_extract(input: &Path, json: bool, args: &ParamArgs) -> anyhow::Result<()> {
    let image = load_image(input)?;
    let out = extract(&image, &args.extract_params()?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", out.message);
        eprintln!("confidence: {:.1}%", out.confidence * 100.0);
    }
    Ok(())
}

fn cmd_capacity(input: &Path, level: usize) -> anyhow::Result<()> {
    let image = load_image(input)?;
    let bits = capacity_for(&image, level);
    println!("Image:     {}x{}", image.width(), image.height());
    println!(
        "Padded:    {}x{}",
        image.width().next_power_of_two(),
        image.height().next_power_of_two()
    );
    println!("Level:     {level}");
    println!("Capacity:  {bits} bits");
    // Header is charged once more by the embed check.
    println!("Max text:  {} bytes UTF-8", bits.saturating_sub(32) / 8);
    Ok(())
}

fn cmd_batch(
    inputs: &[PathBuf],
    message: Option<&str>,
    out_dir: &Path,
    args: &ParamArgs,
) -> anyhow::Result<()> {
    let mut images = Vec::with_capacity(inputs.len());
    let mut paths = Vec::with_capacity(inputs.len());
    for path in inputs {
        match load_image(path) {
            Ok(img) => {
                images.push(img);
                paths.push(path);
            }
            Err(e) => warn!("skipping {}: {e:#}", path.display()),
        }
    }

    let mut failed = 0usize;
    match message {
        Some(message) => {
            fs::create_dir_all(out_dir)
                .with_context(|| format!("create {}", out_dir.display()))?;
            let params = args.embed_params()?;
            for (path, result) in paths.iter().zip(embed_batch(&images, message, &params)) {
                let name = path.file_name().map(PathBuf::from).unwrap_or_default();
                let dest = out_dir.join(name).with_extension("png");
                match result.map_err(anyhow::Error::from).and_then(|out| {
                    let psnr = out.metrics.psnr;
                    save_image(out.image, &dest).map(|_| psnr)
                }) {
                    Ok(psnr) => println!("  ok  {} -> {} ({psnr:.2} dB)", path.display(), dest.display()),
                    Err(e) => {
                        failed += 1;
                        println!("  err {}: {e:#}", path.display());
                    }
                }
            }
        }
        None => {
            let params = args.extract_params()?;
            for (path, result) in paths.iter().zip(extract_batch(&images, &params)) {
                match result {
                    Ok(out) => println!(
                        "  ok  {}: {:?} ({:.1}%)",
                        path.display(),
                        out.message,
                        out.confidence * 100.0
                    ),
                    Err(e) => {
                        failed += 1;
                        println!("  err {}: {e}", path.display());
                    }
                }
            }
        }
    }

    info!(total = paths.len(), failed, "batch finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", paths.len());
    }
    Ok(())
}

fn cmd_robustness(
    input: &Path,
    message: &str,
    seed: u64,
    json: bool,
    args: &ParamArgs,
) -> anyhow::Result<()> {
    let image = load_image(input)?;
    let params = args.extract_params()?;
    let mut simulator = ImageAttackSimulator::seeded(seed);
    let report = RobustnessSuite::standard().run(&image, message, &params, &mut simulator);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for case in &report.cases {
        println!(
            "  {:<24} BER {:>6.2}%  {}",
            case.name,
            case.ber * 100.0,
            if case.passed { "pass" } else { "FAIL" }
        );
    }
    println!("{}/{} attacks survived", report.passed(), report.cases.len());
    Ok(())
}
