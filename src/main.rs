use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rawstage::image_pipeline::session::GAMMA_RANGE;
use rawstage::image_pipeline::{
    DemosaicAlgorithm, ExportConfig, Overlays, PipelineStage, RawToStagePipeline, RenderRequest,
    TiffCompression,
};
use rawstage::logger;

use tracing::info;

#[derive(Parser)]
#[command(name = "rawstage")]
#[command(version, about = "Inspect every stage of a RAW to RGB conversion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the frame metadata
    Info {
        /// RAW input file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Render one stage to a TIFF file
    Render {
        /// RAW input file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output TIFF file
        #[arg(short, long, value_name = "FILE", default_value = "output.tiff")]
        out: PathBuf,

        /// Pipeline stage (0 raw .. 5 gamma encoded)
        #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=5))]
        stage: u8,

        #[command(flatten)]
        options: RenderOptions,
    },

    /// Render every stage into a directory as stage_<n>.tiff
    Stages {
        /// RAW input file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,

        #[command(flatten)]
        options: RenderOptions,
    },
}

#[derive(Args)]
struct RenderOptions {
    /// Display gamma (1.0 - 4.0)
    #[arg(long, value_name = "FLOAT", default_value_t = 2.2)]
    gamma: f32,

    /// Demosaic algorithm
    #[arg(long, value_enum, default_value_t = Algorithm::Bilinear)]
    algorithm: Algorithm,

    /// Tint pixels with their CFA color
    #[arg(long)]
    bayer_grid: bool,

    /// Show the dual-gain blend for mosaic stages
    #[arg(long)]
    dual_gain: bool,

    /// Show the demosaic chroma error map
    #[arg(long)]
    error_view: bool,

    /// Apply the sensor color matrix after demosaicing
    #[arg(long)]
    color_correction: bool,

    /// TIFF compression
    #[arg(long, value_enum, default_value_t = Compression::Deflate)]
    compression: Compression,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Bilinear,
    Adaptive,
}

#[derive(Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Lzw,
    Deflate,
}

impl RenderOptions {
    fn request(&self, stage: PipelineStage) -> anyhow::Result<RenderRequest> {
        if !GAMMA_RANGE.contains(&self.gamma) {
            bail!("gamma {} outside {:?}", self.gamma, GAMMA_RANGE);
        }
        let algorithm = match self.algorithm {
            Algorithm::Bilinear => DemosaicAlgorithm::Bilinear,
            Algorithm::Adaptive => DemosaicAlgorithm::Adaptive,
        };
        Ok(RenderRequest::builder()
            .stage(stage)
            .gamma(self.gamma)
            .algorithm(algorithm)
            .overlays(Overlays {
                bayer_grid: self.bayer_grid,
                dual_gain: self.dual_gain,
                demosaic_error: self.error_view,
            })
            .color_correction(self.color_correction)
            .build())
    }

    fn export_config(&self) -> ExportConfig {
        let compression = match self.compression {
            Compression::None => TiffCompression::None,
            Compression::Lzw => TiffCompression::Lzw,
            Compression::Deflate => TiffCompression::DeflateBalanced,
        };
        ExportConfig::builder().compression(compression).build()
    }
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let pipeline = RawToStagePipeline::new(ExportConfig::default());
            let frame = pipeline
                .load_file(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            info!("Metadata for {}:\n{}", input.display(), frame.summary());
        }
        Commands::Render { input, out, stage, options } => {
            let request = options.request(PipelineStage::from_index(stage as usize))?;
            let pipeline = RawToStagePipeline::new(options.export_config());
            info!("{} with {}", request.stage, request.algorithm);
            pipeline
                .convert_file(&input, &out, &request)
                .with_context(|| format!("rendering {}", input.display()))?;
            info!("Wrote {}", out.display());
        }
        Commands::Stages { input, out_dir, options } => {
            let request = options.request(PipelineStage::RawMosaic)?;
            let pipeline = RawToStagePipeline::new(options.export_config());
            let frame = pipeline
                .load_file(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            let written = pipeline
                .export_all_stages(&frame, &request, &out_dir)
                .with_context(|| format!("exporting stages to {}", out_dir.display()))?;
            for path in written {
                info!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
