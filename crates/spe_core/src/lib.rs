//! Tile-sprite game engine core: indexed-colour sprites, frame-counter
//! animation, simple gravity physics and per-tick level simulation.

pub mod animation;
pub mod game;
pub mod game_object;
pub mod input;
pub mod level;
pub mod palette;
pub mod sprite;
pub mod sprite_group;
pub mod time;

pub use animation::{select_frame_index, AnimationSeries, FrameTiming};
pub use game::{validate_game_config, FramePainter, Game, GameConfig, KeyListener};
pub use game_object::{
    Collision, CollisionHandler, Direction, DynamicValue, Edge, EventHandler, GameEvent,
    GameObject, ObjectId, Vector,
};
pub use input::{InputState, Key, KeyDirection, KeyEvent};
pub use level::{BeforePaint, GameLink, Level};
pub use palette::Palette;
pub use sprite::{Compositable, Sprite, SCANLINE_COUNT, SPRITE_SIZE};
pub use sprite_group::SpriteGroup;
pub use time::FrameClock;
