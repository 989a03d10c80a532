//! Game content hooks: how the demo character reacts to keys, lifecycle events
//! and collisions, plus the camera and HUD hooks.

use image::{Rgba, RgbaImage};
use serde::Deserialize;
use spe_core::{
    Collision, Direction, GameEvent, GameObject, Key, KeyEvent, Level, ObjectId, Vector,
};

pub const DEFAULT_MAX_SCROLL_X: f64 = 960.0;
pub const JUMP_VELOCITY: f64 = 6.0;
pub const RESPAWN_POSITION: Vector = Vector::new(20.0, 100.0);
pub const POWERUP_SPEED: f64 = 3.0;
pub const POWERUP_GRAVITY: f64 = 0.3;
pub const POWERUP_TYPE: &str = "powerup";

/// States the player hooks switch between.
pub const PLAYER_STATES: [&str; 4] = ["standing", "moving", "jumping", "landing"];

/// Which built-in hooks a scene object gets.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Behaviour {
    #[default]
    None,
    Player,
    Powerup,
}

impl Behaviour {
    pub fn apply(self, object: GameObject) -> GameObject {
        match self {
            Self::None => object,
            Self::Player => player(object),
            Self::Powerup => {
                let object = object.interactive(true);
                if object.has_dynamic_data("type") {
                    object
                } else {
                    object.with_data("type", POWERUP_TYPE)
                }
            }
        }
    }
}

/// Make `object` the controllable character.
pub fn player(object: GameObject) -> GameObject {
    object
        .controllable()
        .interactive(true)
        .with_event_handler(player_event_handler)
        .with_collision_handler(player_collision_handler)
}

/// Arrow keys walk while grounded; space jumps while grounded.
pub fn player_key_listener(event: &KeyEvent, object: &mut GameObject) {
    match event.key {
        Key::Left => steer(event, object, Direction::Left),
        Key::Right => steer(event, object, Direction::Right),
        Key::Space => {
            if event.is_press() && object.is_resting() {
                object.current_state = "jumping".to_string();
                object.velocity.y = JUMP_VELOCITY;
            }
        }
    }
}

fn steer(event: &KeyEvent, object: &mut GameObject, direction: Direction) {
    if event.is_press() {
        if object.is_resting() && object.direction == Direction::Stationary {
            object.direction = direction;
            object.current_state = "moving".to_string();
        }
    } else if object.direction == direction {
        object.direction = Direction::Stationary;
        object.current_state = "standing".to_string();
    }
}

pub fn player_event_handler(event: GameEvent, object: &mut GameObject) {
    match event {
        GameEvent::FreeFall => object.current_state = "landing".to_string(),
        GameEvent::FloorCollision => {
            object.current_state = if object.direction == Direction::Stationary {
                "standing".to_string()
            } else {
                "moving".to_string()
            };
        }
        GameEvent::DropOffLevel => {
            log::info!("'{}' fell off the level, respawning", object.name);
            object.position = RESPAWN_POSITION;
            object.is_flipped = false;
        }
    }
}

/// Collecting a powerup speeds the player up, lowers gravity and consumes
/// the powerup.
pub fn player_collision_handler(level: &mut Level, me: ObjectId, collision: Collision) {
    let is_powerup = level
        .object(collision.other)
        .is_some_and(|other| other.dynamic_str("type", "") == POWERUP_TYPE);
    if !is_powerup {
        return;
    }

    if let Some(player) = level.object_mut(me) {
        player.velocity.x = POWERUP_SPEED;
        log::info!("'{}' collected a powerup ({})", player.name, collision.edge);
    }
    level.gravity = POWERUP_GRAVITY;
    if let Some(powerup) = level.object_mut(collision.other) {
        powerup.is_hidden = true;
        powerup.is_interactive = false;
    }
}

/// Before-paint hook keeping the controllable object centred on screen.
///
/// X scroll is clamped to `[0, max_scroll_x]`; Y scroll stays at 0 until the
/// object climbs past mid-screen.
pub fn camera_follow(max_scroll_x: f64) -> impl Fn(&mut Level) + 'static {
    move |level: &mut Level| {
        let Some(link) = level.game() else {
            return;
        };
        let half_width = (link.width / 2) as f64;
        let half_height = (link.height / 2) as f64;

        let target = level
            .objects()
            .filter(|(_, object)| object.is_controllable)
            .map(|(_, object)| object.position)
            .last();
        let Some(position) = target else {
            return;
        };

        let x = (position.x - half_width).max(0.0).min(max_scroll_x);
        let y = if position.y < half_height {
            0.0
        } else {
            position.y - half_height
        };
        level.paint_offset = Vector::new(x, y);
    }
}

const BAR_HEIGHT: u32 = 3;
const BAR_MARGIN: u32 = 4;
const BAR_TRACK: Rgba<u8> = Rgba([0, 0, 0, 96]);
const BAR_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);
const FPS_GAUGE_HEIGHT: u32 = 1;
const FPS_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Frame painter drawing a scroll-progress bar along the top of the stage,
/// with a thin gauge of measured fps against the target rate beneath it.
///
/// The fps gauge needs the game link for the target rate and is skipped
/// until the level has been ticked.
pub fn progress_bar(max_scroll_x: f64) -> impl Fn(&mut RgbaImage, &Level, f64) + 'static {
    move |stage: &mut RgbaImage, level: &Level, fps: f64| {
        if stage.width() <= BAR_MARGIN * 2 || stage.height() <= BAR_MARGIN + BAR_HEIGHT {
            return;
        }
        let progress = if max_scroll_x > 0.0 {
            level.paint_offset.x / max_scroll_x
        } else {
            0.0
        };
        draw_gauge(stage, BAR_MARGIN, BAR_HEIGHT, progress, BAR_FILL);

        let gauge_top = BAR_MARGIN + BAR_HEIGHT + 1;
        let Some(link) = level.game() else {
            return;
        };
        if stage.height() < gauge_top + FPS_GAUGE_HEIGHT {
            return;
        }
        let target = f64::from(link.timing.target_frame_rate.max(1));
        draw_gauge(stage, gauge_top, FPS_GAUGE_HEIGHT, fps / target, FPS_FILL);
    }
}

/// Horizontal gauge spanning the stage between the margins, filled to
/// `fraction` (clamped to 0..=1).
fn draw_gauge(stage: &mut RgbaImage, top: u32, height: u32, fraction: f64, fill: Rgba<u8>) {
    let track = stage.width() - BAR_MARGIN * 2;
    let filled = (track as f64 * fraction.clamp(0.0, 1.0)).round() as u32;
    for y in top..top + height {
        for step in 0..track {
            let colour = if step < filled { fill } else { BAR_TRACK };
            stage.put_pixel(BAR_MARGIN + step, y, colour);
        }
    }
}
