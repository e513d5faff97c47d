use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use stylematch_contracts::analysis::AnalysisOutcome;
use stylematch_contracts::events::EventLog;
use stylematch_contracts::languages::LanguageCode;
use stylematch_contracts::modes::{AnalysisMode, ImageAsset, SlotBuffer};
use stylematch_contracts::prefs::PreferenceStore;
use stylematch_engine::dryrun::{DirectoryFrameSource, SilhouetteSegmenter};
use stylematch_engine::orchestrator::Orchestrator;
use stylematch_engine::remote::GeminiClient;
use stylematch_engine::tryon::TryOnSession;

#[derive(Debug, Parser)]
#[command(
    name = "stylematch-rs",
    version,
    about = "AI outfit feedback and virtual saree/pair try-on"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one analysis over the filled image slots.
    Analyze(AnalyzeArgs),
    /// Preview a garment over replayed camera frames and capture a look.
    Tryon(TryonArgs),
    /// Show or change the persisted display language.
    Lang(LangArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    SingleOutfit,
    Pair,
    Saree,
}

impl ModeArg {
    fn as_mode(self) -> AnalysisMode {
        match self {
            ModeArg::SingleOutfit => AnalysisMode::SingleOutfit,
            ModeArg::Pair => AnalysisMode::Pair,
            ModeArg::Saree => AnalysisMode::SareeTryOn,
        }
    }
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long, value_enum)]
    mode: ModeArg,
    /// Full-outfit photo (single-outfit mode).
    #[arg(long)]
    outfit: Option<PathBuf>,
    /// Face photo (pair and saree modes).
    #[arg(long)]
    face: Option<PathBuf>,
    /// First clothing item (pair mode).
    #[arg(long)]
    first_item: Option<PathBuf>,
    /// Second clothing item (pair mode).
    #[arg(long)]
    second_item: Option<PathBuf>,
    /// Saree photo (saree mode).
    #[arg(long)]
    saree: Option<PathBuf>,
    /// Directory for the generated try-on image.
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Override of the persisted display language (en, es, fr).
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    prefs: Option<PathBuf>,
    /// Also print the generated image as a data URL.
    #[arg(long)]
    emit_data_url: bool,
}

#[derive(Debug, Parser)]
struct TryonArgs {
    /// Garment image tiled over the person silhouette.
    #[arg(long)]
    garment: PathBuf,
    /// Directory of camera frames to replay.
    #[arg(long)]
    frames: PathBuf,
    /// Preview frames to composite before capturing.
    #[arg(long, default_value_t = 30)]
    ticks: usize,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Send the captured look through the single-outfit analyzer.
    #[arg(long)]
    analyze_look: bool,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    prefs: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct LangArgs {
    #[command(subcommand)]
    action: LangAction,
    #[arg(long)]
    prefs: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum LangAction {
    Get,
    Set { code: String },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("stylematch-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Tryon(args) => run_tryon(args),
        Command::Lang(args) => run_lang(args),
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let mode = args.mode.as_mode();
    let language = resolve_language(args.language.as_deref(), args.prefs.as_deref())?;

    let mut slots = SlotBuffer::new();
    for (slot, path) in [
        ("outfit", args.outfit.as_deref()),
        ("face", args.face.as_deref()),
        ("first-item", args.first_item.as_deref()),
        ("second-item", args.second_item.as_deref()),
        ("saree", args.saree.as_deref()),
    ] {
        if let Some(path) = path {
            slots.set(slot, load_asset(path)?)?;
        }
    }

    let client = GeminiClient::from_env()?;
    let mut orchestrator = Orchestrator::new(client);
    if let Some(events) = args.events {
        orchestrator = orchestrator.with_events(EventLog::for_new_session(events));
    }

    let outcome = orchestrator
        .analyze(mode, &slots, language)
        .context("analysis failed")?;
    report_outcome(&outcome, &args.out, args.emit_data_url)?;
    Ok(0)
}

fn run_tryon(args: TryonArgs) -> Result<i32> {
    let garment = image::open(&args.garment)
        .with_context(|| format!("failed loading garment {}", args.garment.display()))?
        .to_rgba8();
    let camera = DirectoryFrameSource::open(&args.frames)?;

    let mut session = TryOnSession::start(camera, SilhouetteSegmenter::new(), garment)?;
    if let Some(events) = &args.events {
        session = session.with_events(EventLog::for_new_session(events));
    }

    for _ in 0..args.ticks.max(1) {
        if !session.tick()? {
            break;
        }
    }
    let captured = session.capture()?.clone();
    session.close();

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed creating {}", args.out.display()))?;
    let artifact = args.out.join(&captured.name);
    fs::write(&artifact, &captured.png_bytes)
        .with_context(|| format!("failed writing {}", artifact.display()))?;
    println!("captured {}", artifact.display());

    if args.analyze_look {
        let language = resolve_language(args.language.as_deref(), args.prefs.as_deref())?;
        let mut slots = SlotBuffer::new();
        slots.set("outfit", captured.as_asset())?;
        let mut orchestrator = Orchestrator::new(GeminiClient::from_env()?);
        let outcome = orchestrator
            .analyze(AnalysisMode::SingleOutfit, &slots, language)
            .context("analysis of the captured look failed")?;
        report_outcome(&outcome, &args.out, false)?;
    }
    Ok(0)
}

fn run_lang(args: LangArgs) -> Result<i32> {
    let mut store = PreferenceStore::load(prefs_path(args.prefs.as_deref())?);
    match args.action {
        LangAction::Get => {
            let language = store.language();
            println!("{} ({})", language.code(), language.display_name());
        }
        LangAction::Set { code } => {
            let Some(language) = LanguageCode::parse(&code) else {
                bail!(
                    "unknown language '{code}'; expected one of: {}",
                    LanguageCode::ALL
                        .iter()
                        .map(|lang| lang.code())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            };
            store.set_language(language)?;
            println!("{} ({})", language.code(), language.display_name());
        }
    }
    Ok(0)
}

fn report_outcome(outcome: &AnalysisOutcome, out_dir: &Path, emit_data_url: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&outcome.analysis)?);
    if let Some(image) = &outcome.generated_image {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed creating {}", out_dir.display()))?;
        let mime = image.mime_type.as_deref().unwrap_or("image/png");
        let path = out_dir.join(format!("tryon.{}", extension_for_mime(mime)));
        fs::write(&path, &image.bytes)
            .with_context(|| format!("failed writing {}", path.display()))?;
        println!(
            "{}",
            json!({ "generated_image": path.display().to_string() })
        );
        if emit_data_url {
            println!("{}", data_url(mime, &image.bytes));
        }
    }
    Ok(())
}

fn resolve_language(flag: Option<&str>, prefs: Option<&Path>) -> Result<LanguageCode> {
    if let Some(code) = flag {
        return LanguageCode::parse(code)
            .with_context(|| format!("unknown language '{code}'"));
    }
    Ok(PreferenceStore::load(prefs_path(prefs)?).language())
}

fn prefs_path(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(dir) = non_empty_env("STYLEMATCH_CONFIG_DIR") {
        return Ok(PathBuf::from(dir).join("prefs.json"));
    }
    let home = non_empty_env("HOME").context("HOME not set; pass --prefs")?;
    Ok(PathBuf::from(home).join(".stylematch").join("prefs.json"))
}

fn load_asset(path: &Path) -> Result<ImageAsset> {
    let bytes =
        fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mime = mime_for_path(path).unwrap_or("image/png");
    Ok(ImageAsset::new(bytes, mime))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{data_url, extension_for_mime, load_asset, mime_for_path, ModeArg};
    use stylematch_contracts::modes::AnalysisMode;

    #[test]
    fn mode_flags_map_to_analysis_modes() {
        assert_eq!(ModeArg::SingleOutfit.as_mode(), AnalysisMode::SingleOutfit);
        assert_eq!(ModeArg::Pair.as_mode(), AnalysisMode::Pair);
        assert_eq!(ModeArg::Saree.as_mode(), AnalysisMode::SareeTryOn);
    }

    #[test]
    fn mime_and_extension_tables_agree() {
        assert_eq!(mime_for_path(Path::new("look.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("look.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("look.raw")), None);
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }

    #[test]
    fn load_asset_carries_bytes_and_declared_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("item.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0])?;
        let asset = load_asset(&path)?;
        assert_eq!(asset.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(asset.mime_type, "image/jpeg");
        Ok(())
    }

    #[test]
    fn data_url_embeds_mime_and_base64_payload() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }
}
