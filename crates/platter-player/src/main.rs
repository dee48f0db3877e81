//! Platter Player - command-line host for the scratch engine
//!
//! Thin glue only: logger init, config load, engine + stream bring-up,
//! and a line-oriented prompt that drives the engine's command surface.
//! The real product wraps the same commands behind a touch UI; this host
//! exists for development and listening tests.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use platter_core::audio::OutputStream;
use platter_core::config::{load_config, EngineConfig};
use platter_core::decode::SymphoniaDecoder;
use platter_core::engine::Engine;

const USAGE: &str = "\
commands:
  intro <path>     load sample, play once, then loop
  next             next platter sample
  play             play current music track
  stop             stop music track
  nexttrack        next music track and play
  skiptrack        next music track, keep play state
  fader <0..1>     platter fader volume
  master <0..1>    master volume
  sens <f>         scratch sensitivity
  norm <f>         unity rate normalization
  scratch <delta>  one touch-drag step (degrees)
  coast <rate>     one coasting-rate update
  release          lift finger off the platter
  start | pause    control the output stream
  quit";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("platter.yaml"));
    let config: EngineConfig = load_config(&config_path);

    let engine = Arc::new(Engine::new(config, Box::new(SymphoniaDecoder)));
    let stream = OutputStream::open(Arc::clone(&engine)).context("failed to open output stream")?;
    stream.start().context("failed to start output stream")?;

    log::info!(
        "platter-player running at {} Hz, {} channels",
        stream.sample_rate(),
        stream.channels()
    );
    println!("{}", USAGE);

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { continue };
        let arg = parts.next();

        match (cmd, arg) {
            ("intro", Some(path)) => engine.play_intro(path),
            ("next", _) => engine.next_platter_sample(),
            ("play", _) => engine.play_music_track(),
            ("stop", _) => engine.stop_music_track(),
            ("nexttrack", _) => engine.next_music_track_and_play(),
            ("skiptrack", _) => engine.next_music_track_keep_state(),
            ("fader", Some(v)) => match v.parse() {
                Ok(v) => engine.set_fader_volume(v),
                Err(_) => println!("not a number: {}", v),
            },
            ("master", Some(v)) => match v.parse() {
                Ok(v) => engine.set_master_volume(v),
                Err(_) => println!("not a number: {}", v),
            },
            ("sens", Some(v)) => match v.parse() {
                Ok(v) => engine.set_scratch_sensitivity(v),
                Err(_) => println!("not a number: {}", v),
            },
            ("norm", Some(v)) => match v.parse() {
                Ok(v) => engine.set_unity_rate_normalization(v),
                Err(_) => println!("not a number: {}", v),
            },
            ("scratch", Some(v)) => match v.parse() {
                Ok(delta) => engine.scratch_input(true, delta),
                Err(_) => println!("not a number: {}", v),
            },
            ("coast", Some(v)) => match v.parse() {
                Ok(rate) => engine.scratch_input(false, rate),
                Err(_) => println!("not a number: {}", v),
            },
            ("release", _) => engine.release_touch(),
            ("start", _) => {
                if let Err(e) = stream.start() {
                    log::error!("{}", e);
                }
            }
            ("pause", _) => {
                if let Err(e) = stream.stop() {
                    log::error!("{}", e);
                }
            }
            ("quit", _) | ("exit", _) => break,
            _ => println!("{}", USAGE),
        }
    }

    stream.stop().ok();
    log::info!("platter-player shut down");
    Ok(())
}
