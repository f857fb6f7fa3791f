use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::image_pipeline::{
    common::error::{ConversionError, Result},
    export::{ExportConfig, ImageExporter, TiffExporter},
    raw::{RawFrame, RawFrameReader, RawLoaderReader},
    render::{PipelineStage, RenderRequest, render},
};

pub struct RawToStagePipeline<R: RawFrameReader, W: ImageExporter> {
    reader: R,
    exporter: W,
    config: ExportConfig,
}

impl RawToStagePipeline<RawLoaderReader, TiffExporter> {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            reader: RawLoaderReader,
            exporter: TiffExporter,
            config,
        }
    }
}

impl<R: RawFrameReader, W: ImageExporter> RawToStagePipeline<R, W> {
    pub fn with_custom(reader: R, exporter: W, config: ExportConfig) -> Self {
        Self {
            reader,
            exporter,
            config,
        }
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }

        Ok(())
    }

    /// Decodes RAW bytes into a frame.
    #[instrument(skip(self, input_data), fields(input_size = input_data.len()))]
    pub fn load(&self, input_data: &[u8]) -> Result<RawFrame> {
        let frame = {
            let _span = tracing::info_span!("decode_raw").entered();
            self.reader.read_raw(input_data)?
        };
        self.validate_dimensions(frame.width(), frame.height())?;
        info!(
            width = frame.width(),
            height = frame.height(),
            pattern = %frame.pattern(),
            "Frame loaded"
        );
        Ok(frame)
    }

    /// Loads a RAW file from disk.
    pub fn load_file<P: AsRef<Path>>(&self, input_path: P) -> Result<RawFrame> {
        let input_path = input_path.as_ref();
        let input_data = {
            let _span = tracing::info_span!("read_input_file").entered();
            std::fs::read(input_path).map_err(|e| {
                ConversionError::InputReadError(format!("{}: {}", input_path.display(), e))
            })?
        };
        self.load(&input_data)
    }

    /// Renders one stage of an already loaded frame and writes it to `output`.
    #[instrument(skip(self, frame, output))]
    pub fn export(&self, frame: &RawFrame, request: &RenderRequest, output: &mut dyn Write) -> Result<()> {
        let image = {
            let _span = tracing::info_span!("render", stage = request.stage.index()).entered();
            render(frame, request)?
        };

        {
            let _span = tracing::info_span!("encode").entered();
            self.exporter.export(&image, output, &self.config)?;
        }

        info!(
            width = image.width(),
            height = image.height(),
            channels = image.channels(),
            "{} exported",
            request.stage
        );
        Ok(())
    }

    /// Decodes RAW bytes, renders the requested stage and writes it to `output`.
    pub fn convert(&self, input_data: &[u8], request: &RenderRequest, output: &mut dyn Write) -> Result<()> {
        info!("Starting RAW stage conversion");
        let frame = self.load(input_data)?;
        self.export(&frame, request, output)
    }

    #[instrument(skip(self, input_path, output_path))]
    pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        request: &RenderRequest,
    ) -> Result<()> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Converting file"
        );

        let frame = self.load_file(input_path)?;
        self.write_stage(&frame, request, output_path)
    }

    /// Writes every stage of `frame` as `stage_<n>.tiff` into `out_dir`, using
    /// `request` for everything but the stage.
    pub fn export_all_stages<P: AsRef<Path>>(
        &self,
        frame: &RawFrame,
        request: &RenderRequest,
        out_dir: P,
    ) -> Result<Vec<PathBuf>> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir).map_err(|e| {
            ConversionError::OutputWriteError(format!("{}: {}", out_dir.display(), e))
        })?;

        let mut written = Vec::with_capacity(PipelineStage::ALL.len());
        for stage in PipelineStage::ALL {
            let path = out_dir.join(stage_file_name(stage));
            let stage_request = RenderRequest { stage, ..*request };
            self.write_stage(frame, &stage_request, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    fn write_stage(&self, frame: &RawFrame, request: &RenderRequest, output_path: &Path) -> Result<()> {
        let mut output_file = {
            let _span = tracing::info_span!("create_output_file").entered();
            std::fs::File::create(output_path).map_err(|e| {
                ConversionError::OutputWriteError(format!("{}: {}", output_path.display(), e))
            })?
        };
        self.export(frame, request, &mut output_file)
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ExportConfig) {
        self.config = config;
    }
}

/// File name used when saving a stage, e.g. `stage_3.tiff`.
pub fn stage_file_name(stage: PipelineStage) -> String {
    format!("stage_{}.tiff", stage.index())
}
