use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vdcrpt", version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(long, global = true)]
    verbose: bool,

    /// Directory holding the shared cache and session scratch space.
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// ffmpeg binary to invoke.
    #[arg(long, global = true, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Corrupt a video and render it to a playable file.
    Corrupt(CorruptArgs),
    /// Delete every cached conversion and intermediate file.
    ClearCache,
}

#[derive(Parser, Debug)]
struct CorruptArgs {
    /// Video to corrupt.
    input: PathBuf,

    /// Output video.
    output: PathBuf,

    /// Overwrite the output if it exists.
    #[arg(short, long)]
    overwrite: bool,

    /// Video codec used while corrupting.
    #[arg(short = 'v', long, default_value = "mpeg4")]
    vcodec: String,

    /// Audio codec used while corrupting.
    #[arg(short = 'a', long, default_value = "pcm_mulaw")]
    acodec: String,

    /// Number of bursts.
    #[arg(short, long, default_value_t = 20)]
    iterations: usize,

    /// Burst size in bytes.
    #[arg(short = 's', long, default_value_t = 5000)]
    burst_size: usize,

    /// Minimum repetitions per burst.
    #[arg(short = 'r', long, default_value_t = 10)]
    min_repeat: usize,

    /// Maximum repetitions per burst.
    #[arg(short = 'R', long, default_value_t = 20)]
    max_repeat: usize,

    /// Seed for reproducible corruption.
    #[arg(long)]
    seed: Option<u64>,

    /// Burst inside individual video frames instead of across the whole file.
    #[arg(long)]
    frames: bool,

    /// JSON file with one effect or an array of effects; replaces the
    /// burst flags above.
    #[arg(long, conflicts_with = "frames")]
    settings: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut opts = vdcrpt::SessionOpts::default()
        .with_transcoder(Arc::new(vdcrpt::FfmpegTranscoder::new(&cli.ffmpeg)));
    if let Some(dir) = cli.temp_dir {
        opts = opts.with_temp_root(dir);
    }

    match cli.cmd {
        Command::Corrupt(args) => cmd_corrupt(args, opts),
        Command::ClearCache => {
            let cache_root = opts.temp_root.join("cache");
            vdcrpt::clear_cache(&cache_root)
                .with_context(|| format!("clear cache '{}'", cache_root.display()))?;
            eprintln!("cleared {}", cache_root.display());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_corrupt(args: CorruptArgs, opts: vdcrpt::SessionOpts) -> anyhow::Result<()> {
    if !args.overwrite && args.output.exists() {
        anyhow::bail!(
            "output file '{}' already exists (use --overwrite to replace it)",
            args.output.display()
        );
    }

    let settings = match &args.settings {
        Some(path) => vdcrpt::EffectSettings::list_from_json_path(path)
            .with_context(|| format!("load settings '{}'", path.display()))?,
        None => vec![settings_from_flags(&args)],
    };
    let effects = settings
        .into_iter()
        .map(vdcrpt::EffectSettings::into_effect)
        .collect::<Result<Vec<_>, _>>()
        .context("invalid effect settings")?;

    let mut render = vdcrpt::TranscodeOptions::final_output();
    render.overwrite = args.overwrite;

    let mut session = vdcrpt::Session::new(&args.input, opts)
        .with_context(|| format!("open input '{}'", args.input.display()))?;
    for effect in effects {
        session.add(effect)?;
    }
    session
        .render_with(&args.output, &render)
        .with_context(|| format!("render '{}'", args.output.display()))?;

    eprintln!("wrote {}", args.output.display());
    Ok(())
}

fn settings_from_flags(args: &CorruptArgs) -> vdcrpt::EffectSettings {
    let burst = vdcrpt::BurstParams {
        iterations: args.iterations,
        burst_size: args.burst_size,
        min_repeat: args.min_repeat,
        max_repeat: args.max_repeat,
    };
    let codecs = vdcrpt::CorruptionCodecs {
        video_codec: args.vcodec.clone(),
        audio_codec: args.acodec.clone(),
        ..vdcrpt::CorruptionCodecs::default()
    };

    if args.frames {
        vdcrpt::EffectSettings::FrameBurst {
            params: vdcrpt::FrameBurstParams {
                burst,
                ..vdcrpt::FrameBurstParams::default()
            },
            codecs,
            seed: args.seed,
        }
    } else {
        vdcrpt::EffectSettings::BinaryRepeat {
            burst,
            codecs,
            seed: args.seed,
        }
    }
}
