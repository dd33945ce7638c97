/// Entry point and player loop.

mod config;
mod domain;
mod error;
mod library;
mod sim;
mod ui;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;

use config::PlayerConfig;
use domain::model::MusicBox;
use sim::audio::AudioBackend;
use sim::player::{Flow, Player};
use sim::view::Screen;
use ui::gamepad::GamepadState;
use ui::input;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

#[derive(Parser, Debug)]
#[command(name = "rpgbox", version)]
#[command(about = "Background music and sound effects for the game table")]
struct Args {
    /// Box file (TOML) describing themes and global effects
    #[arg(short = 'b', long = "box", value_name = "FILE", conflicts_with = "path")]
    box_file: Option<PathBuf>,

    /// Directory of sound files, one subdirectory per theme
    #[arg(short, long, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Start with debug output enabled
    #[arg(long)]
    debug: bool,

    /// Explicit config.toml instead of the search path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write debug output to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>, debug: bool) -> anyhow::Result<()> {
    let mut builder = env_logger::builder();
    builder.filter_level(log::LevelFilter::Debug).parse_default_env();
    if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("could not create {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    log::set_max_level(if debug { log::LevelFilter::Debug } else { log::LevelFilter::Warn });
    Ok(())
}

/// Load the box and move into its directory so relative media paths resolve.
fn load_music_box(args: &Args) -> anyhow::Result<MusicBox> {
    let (source, is_box_file) = match (&args.box_file, &args.path) {
        (Some(file), None) => (file, true),
        (None, Some(dir)) => (dir, false),
        _ => bail!("give either --box <FILE> or --path <DIR>"),
    };

    let real = source
        .canonicalize()
        .with_context(|| format!("{} not found", source.display()))?;
    let name = real.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    if let Some(dir) = real.parent() {
        std::env::set_current_dir(dir)
            .with_context(|| format!("could not change into {}", dir.display()))?;
    }

    let music_box = if is_box_file {
        library::load_box(&name)
    } else {
        library::load_path(&name)
    };
    music_box.with_context(|| format!("invalid box {}", real.display()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.log.as_deref(), args.debug)?;
    let mut config = PlayerConfig::load(args.config.as_deref());
    config.debug |= args.debug;
    if config.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let music_box = load_music_box(&args)?;
    let engine = SoundEngine::new(config.channels).context("could not start audio output")?;
    let mut player = Player::new(music_box, engine, &config).context("could not load global effects")?;
    let mut gamepad = GamepadState::new(&config.gamepad);

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;

    let result = run(&mut player, &mut renderer, &mut gamepad, config.timing.tick_rate());

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    result
}

fn run<B: AudioBackend>(
    player: &mut Player<B>,
    renderer: &mut Renderer,
    gamepad: &mut GamepadState,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    let mut events = Vec::new();
    let mut last_tick = Instant::now();

    loop {
        input::drain_events(&mut events);
        gamepad.drain_events(player.keys(), &mut events);
        for event in events.drain(..) {
            player.post(event);
        }

        if last_tick.elapsed() >= tick_rate {
            player.poll_audio();
            if player.tick()? == Flow::Quit {
                return Ok(());
            }
            last_tick = Instant::now();
        }

        if player.take_dirty() {
            renderer.render(&Screen::of(player))?;
        }
        std::thread::sleep(FRAME_SLEEP);
    }
}
