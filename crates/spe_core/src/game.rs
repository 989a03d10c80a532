use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Deserialize;
use std::fmt;
use std::rc::Rc;

use crate::game_object::GameObject;
use crate::input::KeyEvent;
use crate::level::{GameLink, Level};
use crate::time::FrameClock;

/// Receives raw key events for each controllable object of the current level.
pub type KeyListener = Rc<dyn Fn(&KeyEvent, &mut GameObject)>;

/// Paints overlays onto the finished stage; receives the measured frame rate.
pub type FramePainter = Rc<dyn Fn(&mut RgbaImage, &Level, f64)>;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GameConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: u32,
    #[serde(default = "default_target_frame_rate")]
    pub target_frame_rate: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            scale_factor: default_scale_factor(),
            target_frame_rate: default_target_frame_rate(),
        }
    }
}

pub fn validate_game_config(config: &GameConfig) -> Result<(), String> {
    if config.width == 0 || config.height == 0 {
        return Err("Game config validation failed: width/height must be > 0".to_string());
    }
    if config.scale_factor == 0 {
        return Err("Game config validation failed: scale_factor must be > 0".to_string());
    }
    if config.target_frame_rate == 0 {
        return Err("Game config validation failed: target_frame_rate must be > 0".to_string());
    }
    if config.width.checked_mul(config.scale_factor).is_none()
        || config.height.checked_mul(config.scale_factor).is_none()
    {
        return Err("Game config validation failed: scaled size overflows u32 range".to_string());
    }
    Ok(())
}

fn default_title() -> String {
    "Sprite Engine".to_string()
}

const fn default_width() -> u32 {
    320
}

const fn default_height() -> u32 {
    224
}

const fn default_scale_factor() -> u32 {
    2
}

const fn default_target_frame_rate() -> u32 {
    64
}

/// Owns the levels and the frame counter, and drives one level per tick.
pub struct Game {
    config: GameConfig,
    levels: Vec<Level>,
    current_level: usize,
    clock: FrameClock,
    pub key_listener: Option<KeyListener>,
    pub frame_painter: Option<FramePainter>,
}

impl Game {
    pub fn new(config: GameConfig, levels: Vec<Level>) -> Result<Self, String> {
        validate_game_config(&config)?;
        if levels.is_empty() {
            return Err("Game validation failed: at least one level is required".to_string());
        }

        let clock = FrameClock::new(config.target_frame_rate);
        log::info!(
            "Game '{}' created: {}x{} x{} at {} fps, {} level(s)",
            config.title,
            config.width,
            config.height,
            config.scale_factor,
            config.target_frame_rate,
            levels.len()
        );

        Ok(Self {
            config,
            levels,
            current_level: 0,
            clock,
            key_listener: None,
            frame_painter: None,
        })
    }

    pub fn with_key_listener(mut self, listener: impl Fn(&KeyEvent, &mut GameObject) + 'static) -> Self {
        self.key_listener = Some(Rc::new(listener));
        self
    }

    pub fn with_frame_painter(
        mut self,
        painter: impl Fn(&mut RgbaImage, &Level, f64) + 'static,
    ) -> Self {
        self.frame_painter = Some(Rc::new(painter));
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn current_level_index(&self) -> usize {
        self.current_level
    }

    pub fn current_level(&self) -> &Level {
        &self.levels[self.current_level]
    }

    pub fn current_level_mut(&mut self) -> &mut Level {
        &mut self.levels[self.current_level]
    }

    pub fn set_current_level(&mut self, index: usize) -> Result<(), String> {
        if index >= self.levels.len() {
            return Err(format!(
                "Level {} does not exist (game has {} level(s))",
                index,
                self.levels.len()
            ));
        }
        if index != self.current_level {
            log::info!("Switching to level {}", index);
        }
        self.current_level = index;
        Ok(())
    }

    /// Hand `event` to the key listener once per controllable object of the
    /// current level.
    pub fn broadcast_input(&mut self, event: &KeyEvent) {
        let Some(listener) = self.key_listener.clone() else {
            return;
        };
        for (_, object) in self.current_level_mut().objects_mut() {
            if object.is_controllable {
                listener(event, object);
            }
        }
    }

    /// A blank stage at the game's logical resolution.
    pub fn new_stage(&self) -> RgbaImage {
        RgbaImage::new(self.config.width, self.config.height)
    }

    /// Advance the frame counter and produce the next frame on `stage`.
    pub fn tick(&mut self, stage: &mut RgbaImage, measured_fps: f64) {
        self.clock.advance();
        let link = GameLink {
            timing: self.clock.timing(),
            width: self.config.width,
            height: self.config.height,
        };
        let painter = self.frame_painter.clone();

        let level = &mut self.levels[self.current_level];
        level.link_game(link);
        level.run_before_paint();
        level.repaint(stage);
        if let Some(painter) = painter {
            painter(stage, &*level, measured_fps);
        }
    }

    /// Nearest-neighbour scale of `stage` by the configured scale factor.
    pub fn upscale(&self, stage: &RgbaImage) -> RgbaImage {
        if self.config.scale_factor == 1 {
            return stage.clone();
        }
        imageops::resize(
            stage,
            stage.width() * self.config.scale_factor,
            stage.height() * self.config.scale_factor,
            FilterType::Nearest,
        )
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("config", &self.config)
            .field("levels", &self.levels.len())
            .field("current_level", &self.current_level)
            .field("current_frame", &self.clock.current_frame())
            .finish_non_exhaustive()
    }
}
