//! sticker-merge - estimate poses in a photo and draw a sticker over each person

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use pose_sticker::render::write_png;
use pose_sticker::{
    fingerprint, AppConfig, EstimationOutcome, EstimatorRegistry, FixtureEstimator, Session,
    StickerAsset, StickerCatalog, Upload, UploadVerdict,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Photo to decorate (PNG or JPEG).
    #[arg(long)]
    image: Option<PathBuf>,
    /// Sticker path or URL.
    #[arg(long, conflicts_with = "pick")]
    sticker: Option<String>,
    /// Sticker name from the sticker directory.
    #[arg(long)]
    pick: Option<String>,
    /// Sticker directory (overrides config).
    #[arg(long)]
    sticker_dir: Option<PathBuf>,
    /// List stickers in the sticker directory and exit.
    #[arg(long)]
    list_stickers: bool,
    /// Recorded poses (PoseNet JSON) served by the fixture estimator.
    #[arg(long)]
    poses: Option<PathBuf>,
    /// ONNX multipose model (requires the backend-tract feature).
    #[arg(long, env = "STICKER_MODEL_PATH")]
    model: Option<PathBuf>,
    /// Width the photo is displayed at when poses are estimated.
    #[arg(long)]
    display_width: Option<u32>,
    /// Minimum pose score (overrides config).
    #[arg(long)]
    score_threshold: Option<f32>,
    /// Maximum number of poses (overrides config).
    #[arg(long)]
    max_detections: Option<usize>,
    /// Mirror detections horizontally.
    #[arg(long)]
    flip_horizontal: bool,
    /// Output PNG path.
    #[arg(long, default_value = "merged.png")]
    out: PathBuf,
    /// Also print the merged image as a data URI on stdout.
    #[arg(long)]
    data_uri: bool,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());

    let mut cfg = AppConfig::load()?;
    if let Some(dir) = &args.sticker_dir {
        cfg.sticker.dir = dir.clone();
    }
    if let Some(threshold) = args.score_threshold {
        cfg.estimator.options.score_threshold = threshold;
    }
    if let Some(max) = args.max_detections {
        cfg.estimator.options.max_detections = max;
    }
    if args.flip_horizontal {
        cfg.estimator.options.flip_horizontal = true;
    }
    if args.model.is_some() {
        cfg.estimator.model_path = args.model.clone();
        cfg.estimator.backend = "tract".to_string();
    }
    if args.poses.is_some() {
        cfg.estimator.backend = "fixture".to_string();
    }
    cfg.estimator.options.validate()?;

    if args.list_stickers {
        let catalog = StickerCatalog::scan(&cfg.sticker.dir)?;
        for name in catalog.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let image_path = args
        .image
        .as_ref()
        .ok_or_else(|| anyhow!("--image is required"))?;

    let mut session = Session::new(cfg.max_upload_bytes);
    session.set_display_width(args.display_width);
    {
        let _stage = ui.stage("Check upload");
        let upload = Upload::from_path(image_path)?;
        match session.select_file(upload)? {
            UploadVerdict::Accepted { .. } => {}
            UploadVerdict::Oversize { size, limit } => {
                return Err(anyhow!(
                    "image is too big ({} bytes, limit {}); please upload a smaller one",
                    size,
                    limit
                ));
            }
            UploadVerdict::Unsupported { detected } => {
                return Err(anyhow!(
                    "unsupported image type {}; expected PNG or JPEG",
                    detected.as_deref().unwrap_or("unknown")
                ));
            }
        }
    }

    let registry = build_registry(&cfg, &args)?;
    {
        let mut stage = ui.stage("Estimate poses");
        let token = session.begin_estimation()?;
        let input = session.estimation_image()?;
        let result = registry.estimate(&input, &cfg.estimator.options);
        match session.complete_estimation(token, result)? {
            EstimationOutcome::Resolved { anchors } => stage.detail(format!("{} poses", anchors)),
            EstimationOutcome::Stale => return Err(anyhow!("estimation was superseded")),
        }
    }
    for anchor in session.anchors().unwrap_or_default() {
        log::debug!(
            "anchor score={:.3} eyes=({:.1}, {:.1}) height={:.1}",
            anchor.score,
            anchor.anchor_x,
            anchor.anchor_y,
            anchor.height_ref
        );
    }

    {
        let _stage = ui.stage("Load sticker");
        let sticker = match (&args.sticker, &args.pick) {
            (Some(source), _) => StickerAsset::load(source)?,
            (None, Some(name)) => StickerCatalog::scan(&cfg.sticker.dir)?.load(name)?,
            (None, None) => return Err(anyhow!("choose a sticker with --sticker or --pick")),
        };
        session.select_sticker(
            sticker.with_geometry(cfg.sticker.reference_size, cfg.sticker.eye_line),
        );
    }

    {
        let _stage = ui.stage("Merge");
        let merged = session.merge()?;
        log::info!("composite fingerprint {}", fingerprint(merged));
        write_png(merged, &args.out)?;
    }

    if args.data_uri {
        if let Some(uri) = session.preview_data_uri()? {
            println!("{}", uri);
        }
    }
    eprintln!("merged image written to {}", args.out.display());
    Ok(())
}

fn build_registry(cfg: &AppConfig, args: &Args) -> Result<EstimatorRegistry> {
    let mut registry = EstimatorRegistry::new();
    match cfg.estimator.backend.as_str() {
        "fixture" => {
            let path = args
                .poses
                .as_ref()
                .context("the fixture estimator needs --poses <file>")?;
            registry.register(FixtureEstimator::from_path(path)?);
        }
        "tract" => register_tract(&mut registry, cfg)?,
        other => return Err(anyhow!("unknown estimator backend '{}'", other)),
    }
    registry.set_default(&cfg.estimator.backend)?;
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut EstimatorRegistry, cfg: &AppConfig) -> Result<()> {
    let path = cfg
        .estimator
        .model_path
        .as_ref()
        .context("the tract estimator needs --model <file>")?;
    let mut estimator = pose_sticker::TractEstimator::new(
        path,
        cfg.estimator.input_width,
        cfg.estimator.input_height,
    )?;
    pose_sticker::PoseEstimator::warm_up(&mut estimator)?;
    registry.register(estimator);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut EstimatorRegistry, _cfg: &AppConfig) -> Result<()> {
    Err(anyhow!(
        "the tract estimator requires the backend-tract feature"
    ))
}
