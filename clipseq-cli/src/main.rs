use std::path::PathBuf;

use clap::Parser;

use clipseq::pipeline::{GenerateConfig, generate, validate_config};
use clipseq::probe::Ffprobe;

/// Generates an xmeml edit sequence from a video and its clip list.
#[derive(Parser)]
#[command(name = "clipseq")]
struct Args {
    /// Source video file
    #[arg(long, required_unless_present_any = ["print_schema", "version"])]
    video: Option<PathBuf>,

    /// Clip list JSON ({"clips": [{"start_time", "end_time", "name", "importance"}]})
    #[arg(long, required_unless_present_any = ["print_schema", "version"])]
    clips: Option<PathBuf>,

    /// Output XML file (default: <workdir>/<video name>_final.xml)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Sequence template XML (default: built-in 1080p template)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Keep <video name>_sequence.xml and <video name>_clips.json in the work directory
    #[arg(long = "keep-intermediate", default_value_t = false)]
    keep_intermediate: bool,

    /// Work directory (default: the video's directory)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// ffprobe binary to run
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Print JSON schema for the clip list format and exit
    #[arg(long = "print-schema")]
    print_schema: bool,

    /// Display version and quit
    #[arg(long = "version")]
    version: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.version {
        clipseq::version::print_cli_version_banner(
            "Clip Sequence Generator",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return Ok(());
    }

    if args.print_schema {
        let schema = schemars::schema_for!(clipseq::clips::ClipList);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = validate_args(args)?;
    let prober = Ffprobe {
        binary: args.ffprobe.clone(),
    };

    let report = generate(&config, &prober)?;
    log::info!(
        "Placed {} video and {} audio clip(s) ({} gap(s), {} dropped) in {}",
        report.placement.video_clips,
        report.placement.audio_clips,
        report.gaps,
        report.dropped,
        report.output.display()
    );
    Ok(())
}

fn validate_args(args: &Args) -> Result<GenerateConfig, Box<dyn std::error::Error>> {
    let (Some(video), Some(clips)) = (&args.video, &args.clips) else {
        return Err("Both --video and --clips are required!".into());
    };

    let config = GenerateConfig {
        video: video.clone(),
        clips: clips.clone(),
        output: args.output.clone(),
        template: args.template.clone(),
        workdir: args.workdir.clone(),
        keep_intermediate: args.keep_intermediate,
    };
    validate_config(&config)?;
    Ok(config)
}
