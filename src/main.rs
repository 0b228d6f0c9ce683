use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use detlabel::dataset::{self, Retriever};
use detlabel::{
    AnnotationStyle, Annotator, CommandDetector, Detector, ImageOutcome, ImageRecord, PipelineConfig,
    PipelineDriver, PrecomputedDetector,
};

#[derive(Parser)]
#[command(name = "detlabel")]
#[command(about = "Run an object detector over a dataset sample, draw the boxes and tabulate the detections")]
#[command(group(ArgGroup::new("source").required(true).args(["dataset", "images"])))]
#[command(group(ArgGroup::new("model").required(true).args(["detections", "detector_cmd"])))]
struct Cli {
    /// Dataset metadata (JSON array or JSON lines with url/coco_url/flickr_url)
    #[arg(long, value_name = "FILE")]
    dataset: Option<PathBuf>,

    /// Use images already present in this directory instead of downloading
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,

    /// Precomputed detections: JSON object mapping file name to detections
    #[arg(long, value_name = "FILE")]
    detections: Option<PathBuf>,

    /// Detector program; receives the image path as its last argument
    #[arg(long, value_name = "PROGRAM")]
    detector_cmd: Option<String>,

    /// Extra argument passed to the detector program (repeatable)
    #[arg(long = "detector-arg", value_name = "ARG", allow_hyphen_values = true)]
    detector_args: Vec<String>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for annotated images and the results table
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Number of dataset entries to process
    #[arg(long)]
    limit: Option<usize>,

    /// TrueType font for captions (a system font is tried otherwise)
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(limit) = self.limit {
            config.sample_limit = limit;
        }
        if let Some(font) = &self.font {
            config.font_path = Some(font.clone());
        }
        Ok(config)
    }

    fn detector(&self) -> anyhow::Result<Box<dyn Detector>> {
        if let Some(path) = &self.detections {
            return Ok(Box::new(PrecomputedDetector::load(path)?));
        }
        match &self.detector_cmd {
            Some(program) => Ok(Box::new(
                CommandDetector::new(program.clone()).with_args(self.detector_args.iter().cloned()),
            )),
            None => anyhow::bail!("either --detections or --detector-cmd is required"),
        }
    }

    fn records(&self, config: &PipelineConfig) -> anyhow::Result<Vec<ImageRecord>> {
        if let Some(dir) = &self.images {
            return dataset::records_from_dir(dir, config.sample_limit);
        }
        let Some(path) = &self.dataset else {
            anyhow::bail!("either --dataset or --images is required");
        };

        println!("Loading metadata from {} (first {} samples)...", path.display(), config.sample_limit);
        let entries = dataset::load_entries(path, config.sample_limit)?;
        let retriever = Retriever::new(config.image_dir.clone());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(retriever.fetch_all(&entries))
    }
}

fn annotator(config: &PipelineConfig) -> anyhow::Result<Annotator> {
    let style = AnnotationStyle::default()
        .with_thickness(config.box_thickness)
        .with_font_scale(config.font_scale);
    let style = match &config.font_path {
        Some(path) => style.with_font_path(path)?,
        None => style.with_system_font(),
    };
    Ok(Annotator::new(style))
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    detlabel::init_tracing(if args.verbose { "debug" } else { "info" });

    let config = args.pipeline_config()?;
    let detector = args.detector()?;
    let records = args.records(&config)?;

    let driver = PipelineDriver::new(config.clone(), annotator(&config)?);
    let report = driver.run(&records, detector.as_ref())?;

    println!("\n=== Detection Results ===");
    println!("Images processed: {}", report.processed());
    println!("Images skipped: {}", report.skipped());
    println!("Total detections: {}", report.rows_written);

    if args.verbose {
        for outcome in &report.outcomes {
            match outcome {
                ImageOutcome::Processed { file_name, detections, .. } => {
                    println!("  {} - {} detections", file_name, detections.len());
                }
                ImageOutcome::Skipped { file_name, reason, .. } => {
                    println!("  {} - skipped: {}", file_name, reason);
                }
            }
        }
    }

    println!("Detection results saved to {}", report.results_path.display());
    println!("Detection complete.");

    Ok(())
}
