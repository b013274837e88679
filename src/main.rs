use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use rodio::OutputStream;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strumline::audio;
use strumline::controller::{ControllerConfig, LoopController};
use strumline::display::{ChannelSink, DisplayUpdate};
use strumline::engine::TrackSource;
use strumline::export;
use strumline::gui;
use strumline::i18n::{self, Language};
use strumline::input::InputEvent;
use strumline::player::RodioEngine;
use strumline::timefmt::parse_timestamp;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Loop a section of an audio file for practice",
    long_about = None
)]
struct Cli {
    input: Option<PathBuf>,
    /// Loop start, as SS, SS.mmm, M:SS or M:SS.mmm
    #[arg(short, long, value_parser = parse_timestamp)]
    start: Option<u64>,
    /// Loop end, same format as --start
    #[arg(short, long, value_parser = parse_timestamp)]
    end: Option<u64>,
    /// Render the loop to a WAV file instead of playing it
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Repetitions when exporting
    #[arg(short, long, default_value_t = 5)]
    loops: u32,
    /// Watchdog interval in milliseconds (10-1000)
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
    /// Only correct playback that runs past the loop end
    #[arg(long)]
    lenient: bool,
    #[arg(long, default_value_t = 0.8)]
    volume: f32,
    /// UI language: en or zh
    #[arg(long)]
    lang: Option<String>,
    #[arg(long)]
    gui: bool,
}

impl Cli {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            strict: !self.lenient,
            ..ControllerConfig::default()
        }
        .with_tick_interval(Duration::from_millis(self.tick_ms))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(code) = &cli.lang {
        match Language::from_code(code) {
            Some(lang) => i18n::set_language(lang),
            None => bail!("unknown language {:?}, expected en or zh", code),
        }
    }

    let config = cli.controller_config();
    let volume = cli.volume.clamp(0.0, 1.0);

    if cli.gui {
        return gui::run(cli.input, config, volume);
    }
    let Some(input_path) = cli.input.clone() else {
        return gui::run(None, config, volume);
    };

    if let Some(output_path) = &cli.output {
        return export_file(&cli, &input_path, output_path);
    }

    play_in_terminal(&cli, input_path, config, volume)
}

fn export_file(cli: &Cli, input_path: &Path, output_path: &Path) -> anyhow::Result<()> {
    println!("Loading audio: {:?}", input_path);
    let data = audio::load_audio_file(input_path)
        .with_context(|| format!("cannot load {}", input_path.display()))?;

    let bounds = strumline::LoopState::full(data.duration_ms())
        .clamped(cli.start.unwrap_or(0), cli.end.unwrap_or(u64::MAX));
    println!(
        "Exporting {}..{} ms ({} ms) x{} to {:?}",
        bounds.start_ms,
        bounds.end_ms,
        bounds.len_ms(),
        cli.loops,
        output_path
    );
    export::export_loop(output_path, &data, &bounds, cli.loops)?;
    println!("Export complete.");
    Ok(())
}

fn play_in_terminal(
    cli: &Cli,
    input_path: PathBuf,
    config: ControllerConfig,
    volume: f32,
) -> anyhow::Result<()> {
    let (_stream, stream_handle) =
        OutputStream::try_default().context("no audio output device")?;
    let engine = Arc::new(RodioEngine::new(&stream_handle)?);
    engine.set_volume(volume);

    let (display_tx, display_rx) = unbounded();
    let sink = Arc::new(ChannelSink::new(display_tx));
    let mut controller = LoopController::new(engine, sink, config);

    let track = controller
        .load(&TrackSource::Path(input_path.clone()))
        .with_context(|| format!("cannot load {}", input_path.display()))?;
    let name = track.title.clone().unwrap_or_else(|| input_path.display().to_string());
    println!("{} ({} ms)", name, track.duration_ms);
    if cli.start.is_some() || cli.end.is_some() {
        controller.set_bounds(cli.start.unwrap_or(0), cli.end.unwrap_or(track.duration_ms));
    }
    println!("{}", COMMAND_HELP);

    let (input_tx, input_rx) = unbounded();
    let (quit_tx, quit_rx) = unbounded();
    spawn_stdin_reader(input_tx, quit_tx);

    run_terminal_loop(&mut controller, &display_rx, &input_rx, &quit_rx);
    controller.unload();
    println!();
    Ok(())
}

fn run_terminal_loop(
    controller: &mut LoopController,
    display_rx: &Receiver<DisplayUpdate>,
    input_rx: &Receiver<InputEvent>,
    quit_rx: &Receiver<()>,
) {
    let mut bounds_label = String::new();
    loop {
        select! {
            recv(display_rx) -> update => match update {
                Ok(DisplayUpdate::Position { label, .. }) => {
                    print!("\r{} {}   ", label, bounds_label);
                    std::io::stdout().flush().ok();
                }
                Ok(DisplayUpdate::Bounds { start_label, end_label, .. }) => {
                    bounds_label = format!("[{} - {}]", start_label, end_label);
                }
                Err(_) => break,
            },
            recv(input_rx) -> event => match event {
                Ok(event) => controller.apply(event),
                Err(_) => break,
            },
            recv(quit_rx) -> _ => break,
        }
    }
}

fn spawn_stdin_reader(input_tx: Sender<InputEvent>, quit_tx: Sender<()>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Ok(Some(event)) => {
                    if input_tx.send(event).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(message) => eprintln!("\n{}", message),
            }
        }
        quit_tx.send(()).ok();
    });
}

const COMMAND_HELP: &str = "Commands: a = mark start, b = mark end, \
    r <start> <end> = set range, p or empty line = play/pause, q = quit";

/// `Ok(None)` means quit.
fn parse_command(line: &str) -> Result<Option<InputEvent>, String> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("a") => Ok(Some(InputEvent::MarkStart)),
        Some("b") => Ok(Some(InputEvent::MarkEnd)),
        Some("p") | None => Ok(Some(InputEvent::TogglePlayback)),
        Some("q") => Ok(None),
        Some("r") => {
            let (Some(start), Some(end)) = (words.next(), words.next()) else {
                return Err("usage: r <start> <end>".to_string());
            };
            let min = parse_timestamp(start).map_err(|e| e.to_string())?;
            let max = parse_timestamp(end).map_err(|e| e.to_string())?;
            Ok(Some(InputEvent::RangeChanged { min, max }))
        }
        Some(other) => Err(format!("unknown command {:?}", other)),
    }
}
