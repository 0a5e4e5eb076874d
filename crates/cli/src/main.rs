use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use maskwatch_core::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
use maskwatch_core::detection::infrastructure::model_resolver::ModelSource;
use maskwatch_core::pipeline::detect_masks_use_case::{DetectMasksUseCase, DetectionReport};
use maskwatch_core::pipeline::detection_settings::DetectionSettings;
use maskwatch_core::pipeline::model_loading::{
    default_search_dirs, load_face_detector, load_mask_classifier,
};
use maskwatch_core::shared::constants::{
    DEFAULT_MASK_THRESHOLD, DEFAULT_MIN_FACE_SIZE, DETECTOR_MODEL_NAME, IMAGE_EXTENSIONS,
    MASK_MODEL_NAME,
};
use maskwatch_core::video::infrastructure::image_codec::{decode_image, is_allowed_image_filename};

/// Detect faces in an image and label each as masked or unmasked.
#[derive(Parser)]
#[command(name = "maskwatch", version)]
struct Cli {
    /// Input image file.
    input: PathBuf,

    /// Where to write the annotated image (format follows the extension).
    output: Option<PathBuf>,

    /// Print detections as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Mask probability threshold (0.0-1.0, exclusive).
    #[arg(long, default_value_t = DEFAULT_MASK_THRESHOLD)]
    threshold: f32,

    /// Minimum face width and height in pixels.
    #[arg(long, default_value_t = DEFAULT_MIN_FACE_SIZE)]
    min_face_size: u32,

    /// Mask classifier model (ONNX).
    #[arg(long, default_value = MASK_MODEL_NAME)]
    model: PathBuf,

    /// Face detector model (BlazeFace ONNX).
    #[arg(long, default_value = DETECTOR_MODEL_NAME)]
    detector: PathBuf,

    /// TrueType font for captions.
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let settings = detection_settings(&cli)?;

    let bytes = std::fs::read(&cli.input)?;
    let frame = decode_image(&bytes)?;
    log::info!(
        "Loaded {} ({}x{})",
        cli.input.display(),
        frame.width(),
        frame.height()
    );

    let mut use_case = build_use_case(&cli, settings)?;
    let report = use_case.execute(frame)?;

    if let Some(output) = &cli.output {
        let img = report
            .frame
            .to_rgb_image()
            .ok_or("Annotated frame is not RGB")?;
        img.save(output)?;
        log::info!("Output written to {}", output.display());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

/// The detector is required here; a missing mask model falls back like
/// the server does.
fn build_use_case(
    cli: &Cli,
    settings: DetectionSettings,
) -> Result<DetectMasksUseCase, Box<dyn std::error::Error>> {
    let detector = load_face_detector(
        &model_source(&cli.detector),
        settings.detector_confidence,
        None,
    )?;

    let classifier = match load_mask_classifier(&model_source(&cli.model), None) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("Mask model unavailable: {e}");
            None
        }
    };

    let annotator = OverlayAnnotator::with_font_search(cli.font.as_deref());
    Ok(DetectMasksUseCase::new(
        Some(detector),
        classifier,
        Box::new(annotator),
        settings,
    ))
}

fn detection_settings(cli: &Cli) -> Result<DetectionSettings, Box<dyn std::error::Error>> {
    let settings = DetectionSettings {
        threshold: cli.threshold,
        min_face_size: cli.min_face_size,
        ..DetectionSettings::default()
    };
    settings.validate()?;
    Ok(settings)
}

fn model_source(path: &Path) -> ModelSource {
    ModelSource {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: Some(path.to_path_buf()),
        search_dirs: default_search_dirs(),
        url: None,
    }
}

fn report_json(report: &DetectionReport) -> serde_json::Value {
    serde_json::json!({
        "detections": report.detections,
        "faces": report.detections.len(),
        "demo_mode": report.demo_mode,
        "banners": report.banners,
    })
}

fn print_summary(report: &DetectionReport) {
    for banner in &report.banners {
        println!("! {banner}");
    }
    if report.detections.is_empty() {
        println!("No faces detected");
        return;
    }
    for (i, d) in report.detections.iter().enumerate() {
        let [x, y, w, h] = d.bbox;
        println!(
            "Face {}: {} {}% at ({x}, {y}) {w}x{h}",
            i + 1,
            d.label,
            (d.confidence * 100.0).round() as i32
        );
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !has_image_extension(&cli.input) {
        return Err(format!(
            "Unsupported input type: {} (expected one of: {})",
            cli.input.display(),
            IMAGE_EXTENSIONS.join(", ")
        )
        .into());
    }
    if let Some(output) = &cli.output {
        if !has_image_extension(output) {
            return Err(format!(
                "Unsupported output type: {} (expected one of: {})",
                output.display(),
                IMAGE_EXTENSIONS.join(", ")
            )
            .into());
        }
    }
    Ok(())
}

fn has_image_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_allowed_image_filename)
}
