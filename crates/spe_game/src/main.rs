//! Headless frame driver for the sprite engine.
//!
//! Loads a scene file (or the built-in demo level), feeds scripted key input
//! from an optional replay file, and runs the game for a fixed number of
//! ticks. Each tick follows the engine's frame order:
//!
//!   1. turn this tick's held keys into press/release events and hand them to
//!      the key listener
//!   2. optionally sleep out the frame budget (`--realtime`)
//!   3. `Game::tick`: advance the frame counter, before-paint hook, repaint,
//!      frame painter
//!
//! The last frame can be upscaled and written to a PNG with `--out`.

mod assets;
mod behaviour;
mod demo;
mod replay;
mod scene;

use image::RgbaImage;
use spe_core::{Game, GameConfig, InputState, Key};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use behaviour::{player_key_listener, progress_bar, DEFAULT_MAX_SCROLL_X};
use replay::load_replay_from_path;
use scene::load_level;

const DEFAULT_FRAME_COUNT: u64 = 256;

#[derive(Debug, Clone, PartialEq, Default)]
struct RunOptions {
    level_path: Option<PathBuf>,
    replay_path: Option<PathBuf>,
    frames: Option<u64>,
    output_path: Option<PathBuf>,
    realtime: bool,
}

fn usage() -> String {
    "Usage: cargo run -p spe_game -- [--level <scene.level.json>] [--replay <replay.json>] [--frames N] [--out <frame.png>] [--realtime]\nExample: cargo run -p spe_game -- --replay assets/replays/walk.json --frames 300 --out frame.png".to_string()
}

fn parse_args(args: &[String]) -> Result<RunOptions, String> {
    let mut options = RunOptions::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--level" => options.level_path = Some(PathBuf::from(flag_value(&mut iter, arg)?)),
            "--replay" => options.replay_path = Some(PathBuf::from(flag_value(&mut iter, arg)?)),
            "--out" => options.output_path = Some(PathBuf::from(flag_value(&mut iter, arg)?)),
            "--frames" => {
                let value = flag_value(&mut iter, arg)?;
                let frames = value
                    .parse::<u64>()
                    .map_err(|e| format!("Invalid frame count '{value}': {e}"))?;
                if frames == 0 {
                    return Err("--frames must be > 0".to_string());
                }
                options.frames = Some(frames);
            }
            "--realtime" => options.realtime = true,
            "-h" | "--help" => return Err(usage()),
            other => return Err(format!("Unknown argument '{other}'\n{}", usage())),
        }
    }
    Ok(options)
}

fn flag_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a String, String> {
    iter.next()
        .ok_or_else(|| format!("Missing value for {flag}\n{}", usage()))
}

/// Build the game from a scene file, or from the demo level without one.
fn build_game(level_path: Option<&Path>) -> Result<Game, String> {
    let (config, level, max_scroll_x) = match level_path {
        Some(path) => {
            let loaded = load_level(path)?;
            log::info!("Using level '{}'", loaded.level_id);
            let max_scroll_x = loaded
                .camera
                .map_or(DEFAULT_MAX_SCROLL_X, |camera| camera.max_scroll_x);
            (loaded.config.unwrap_or_default(), loaded.level, max_scroll_x)
        }
        None => {
            log::info!("No level given, running the built-in demo");
            (GameConfig::default(), demo::demo_level()?, DEFAULT_MAX_SCROLL_X)
        }
    };

    Ok(Game::new(config, vec![level])?
        .with_key_listener(player_key_listener)
        .with_frame_painter(progress_bar(max_scroll_x)))
}

/// Run `frames` ticks, feeding `script[i]` as the held keys of tick `i` (no
/// keys once the script runs out). Returns the last stage.
fn run_frames(
    game: &mut Game,
    script: &[HashSet<Key>],
    frames: u64,
    realtime: bool,
) -> RgbaImage {
    let mut input = InputState::new();
    let mut stage = game.new_stage();
    let idle = HashSet::new();
    let report_every = u64::from(game.config().target_frame_rate);

    for tick in 0..frames {
        let held = usize::try_from(tick)
            .ok()
            .and_then(|index| script.get(index))
            .unwrap_or(&idle);
        for event in input.apply_held(held) {
            log::debug!("Tick {tick}: {:?} {:?}", event.key, event.direction);
            game.broadcast_input(&event);
        }

        let fps = if realtime {
            game.clock_mut().pace()
        } else {
            f64::from(game.config().target_frame_rate)
        };
        game.tick(&mut stage, fps);

        if (tick + 1) % report_every == 0 {
            let level = game.current_level();
            log::info!(
                "Tick {}: frame {}/{}, scroll ({:.0}, {:.0}), {:.1} fps",
                tick + 1,
                game.clock().current_frame(),
                game.clock().target_frame_rate(),
                level.paint_offset.x,
                level.paint_offset.y,
                fps
            );
        }
    }

    stage
}

fn write_png(path: &Path, image: &RgbaImage) -> Result<(), String> {
    let tmp = temporary_output_path(path);
    image
        .save_with_format(&tmp, image::ImageFormat::Png)
        .map_err(|e| format!("Failed to write '{}': {e}", tmp.display()))?;
    promote_temporary_file(&tmp, path)
}

fn temporary_output_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output");
    path.with_file_name(format!("{file_name}.tmp"))
}

fn promote_temporary_file(temp_path: &Path, final_path: &Path) -> Result<(), String> {
    if final_path.exists() {
        fs::remove_file(final_path).map_err(|e| {
            format!(
                "Failed to replace existing output '{}': {e}",
                final_path.display()
            )
        })?;
    }
    fs::rename(temp_path, final_path).map_err(|e| {
        format!(
            "Failed to move temporary output '{}' -> '{}': {e}",
            temp_path.display(),
            final_path.display()
        )
    })
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    let script = match &options.replay_path {
        Some(path) => {
            let replay = load_replay_from_path(path)?;
            let keys = replay.expanded_keys();
            log::info!("Loaded replay {}: {} tick(s)", path.display(), keys.len());
            keys
        }
        None => Vec::new(),
    };
    let frames = options.frames.unwrap_or(if script.is_empty() {
        DEFAULT_FRAME_COUNT
    } else {
        script.len() as u64
    });

    let mut game = build_game(options.level_path.as_deref())?;
    log::info!(
        "Running '{}' for {} tick(s){}",
        game.config().title,
        frames,
        if options.realtime { " in real time" } else { "" }
    );
    let stage = run_frames(&mut game, &script, frames, options.realtime);

    if let Some(output_path) = &options.output_path {
        let frame = game.upscale(&stage);
        write_png(output_path, &frame)?;
        log::info!(
            "Wrote {}x{} frame to {}",
            frame.width(),
            frame.height(),
            output_path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::temp_file_path;
    use image::Rgba;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("spe_game")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parse_args_defaults() {
        assert_eq!(parse_args(&args(&[])), Ok(RunOptions::default()));
    }

    #[test]
    fn parse_args_reads_every_flag() {
        let options = parse_args(&args(&[
            "--level", "a.level.json", "--replay", "r.json", "--frames", "90", "--out",
            "f.png", "--realtime",
        ]))
        .expect("valid arguments");
        assert_eq!(options.level_path, Some(PathBuf::from("a.level.json")));
        assert_eq!(options.replay_path, Some(PathBuf::from("r.json")));
        assert_eq!(options.frames, Some(90));
        assert_eq!(options.output_path, Some(PathBuf::from("f.png")));
        assert!(options.realtime);
    }

    #[test]
    fn parse_args_rejects_bad_input() {
        assert!(parse_args(&args(&["--frames"]))
            .expect_err("missing value")
            .contains("Missing value for --frames"));
        assert!(parse_args(&args(&["--frames", "0"]))
            .expect_err("zero frames")
            .contains("must be > 0"));
        assert!(parse_args(&args(&["--frames", "many"]))
            .expect_err("not a number")
            .contains("Invalid frame count 'many'"));
        assert!(parse_args(&args(&["--fast"]))
            .expect_err("unknown flag")
            .contains("Unknown argument '--fast'"));
    }

    #[test]
    fn temporary_output_path_appends_suffix() {
        let result = temporary_output_path(Path::new("out/frame.png"));
        assert_eq!(result, PathBuf::from("out/frame.png.tmp"));
    }

    #[test]
    fn demo_run_scrolls_with_the_player() {
        let mut game = build_game(None).expect("demo game");
        let mut script = vec![HashSet::new(); 2];
        script.extend(std::iter::repeat(HashSet::from([Key::Right])).take(150));

        let stage = run_frames(&mut game, &script, 160, false);

        assert_eq!(stage.dimensions(), (320, 224));
        // 150 walking ticks from x 20 puts the camera at 320 - 160.
        assert_eq!(game.current_level().paint_offset.x, 160.0);
        assert_eq!(game.clock().frame_count, 160);
        // Frame 160 wraps to 160 - 2 * 64.
        assert_eq!(game.clock().current_frame(), 32);
    }

    #[test]
    fn final_frame_is_written_upscaled() {
        let mut game = build_game(None).expect("demo game");
        let stage = run_frames(&mut game, &[], 3, false);
        let frame = game.upscale(&stage);

        let path = temp_file_path("frame", "png");
        write_png(&path, &frame).expect("png written");
        let decoded = image::open(&path).expect("png decodes").to_rgba8();
        let _ = fs::remove_file(&path);

        assert_eq!(decoded.dimensions(), (640, 448));
        // Top-left corner sits above the progress bar, so it shows the sky.
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([126, 192, 238, 255]));
        assert_eq!(decoded, frame);
    }
}
