//! Simulated entities: physics integration, resting/edge inference and the
//! open-ended per-object data store.
//!
//! Coordinates are Cartesian with Y growing upwards; the level flips the axis
//! when painting. `floor_y` is recomputed by the level every tick and is the
//! lowest Y the object may fall to.

use glam::DVec2;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::animation::{AnimationSeries, FrameTiming};
use crate::level::Level;
use crate::sprite::Compositable;

pub type Vector = DVec2;

/// Reacts to lifecycle events raised during physics.
pub type EventHandler = Rc<dyn Fn(GameEvent, &mut GameObject)>;

/// Reacts to this object (`ObjectId`) intersecting another. Receives the whole
/// level so it can change the other object, the gravity, or hide objects.
pub type CollisionHandler = Rc<dyn Fn(&mut Level, ObjectId, Collision)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    #[default]
    Stationary,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
            Self::Stationary => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameEvent {
    /// Landed on the floor after being above it.
    FloorCollision,
    /// Fell to the bottom guard line below the visible level.
    DropOffLevel,
    /// Still above the floor and moving downwards.
    FreeFall,
}

impl GameEvent {
    pub fn code(self) -> u8 {
        match self {
            Self::FloorCollision => 0,
            Self::DropOffLevel => 1,
            Self::FreeFall => 2,
        }
    }
}

/// Edge of the calling object that met the other object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
    Left,
    Right,
    None,
}

impl Edge {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::Bottom => "bottom",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
            Self::Left => "left",
            Self::Right => "right",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle of an object inside its level. Stable for the object's lifetime
/// and never reused by the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub other: ObjectId,
    pub edge: Edge,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DynamicValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

pub struct GameObject {
    pub name: String,
    pub current_state: String,
    pub states: HashMap<String, AnimationSeries>,
    pub position: Vector,
    /// Zero means the object floats: no gravity, no floor, no drop-off guard.
    pub mass: f64,
    pub velocity: Vector,
    pub direction: Direction,
    pub is_flipped: bool,
    pub is_controllable: bool,
    pub is_floor: bool,
    pub is_interactive: bool,
    pub is_hidden: bool,
    pub floor_y: f64,
    pub event_handler: Option<EventHandler>,
    pub collision_handler: Option<CollisionHandler>,
    dynamic_data: HashMap<String, DynamicValue>,
    timing: Option<FrameTiming>,
}

impl GameObject {
    pub fn new(
        name: impl Into<String>,
        initial_state: impl Into<String>,
        states: HashMap<String, AnimationSeries>,
    ) -> Result<Self, String> {
        let name = name.into();
        let current_state = initial_state.into();
        if !states.contains_key(&current_state) {
            return Err(format!(
                "Game object '{}' has no animation series for its initial state '{}'",
                name, current_state
            ));
        }
        Ok(Self::from_parts(name, current_state, states))
    }

    /// Single-state object showing one frame forever.
    pub fn still(name: impl Into<String>, frame: Rc<dyn Compositable>) -> Self {
        let states = HashMap::from([("default".to_string(), AnimationSeries::still(frame))]);
        Self::from_parts(name.into(), "default".to_string(), states)
    }

    fn from_parts(
        name: String,
        current_state: String,
        states: HashMap<String, AnimationSeries>,
    ) -> Self {
        Self {
            name,
            current_state,
            states,
            position: Vector::ZERO,
            mass: 0.0,
            velocity: Vector::ZERO,
            direction: Direction::Stationary,
            is_flipped: false,
            is_controllable: false,
            is_floor: false,
            is_interactive: false,
            is_hidden: false,
            floor_y: 0.0,
            event_handler: None,
            collision_handler: None,
            dynamic_data: HashMap::new(),
            timing: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Vector::new(x, y);
        self
    }

    pub fn with_velocity(mut self, x: f64, y: f64) -> Self {
        self.velocity = Vector::new(x, y);
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn floor(mut self) -> Self {
        self.is_floor = true;
        self
    }

    pub fn controllable(mut self) -> Self {
        self.is_controllable = true;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.is_interactive = interactive;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    pub fn with_event_handler(mut self, handler: impl Fn(GameEvent, &mut GameObject) + 'static) -> Self {
        self.event_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_collision_handler(
        mut self,
        handler: impl Fn(&mut Level, ObjectId, Collision) + 'static,
    ) -> Self {
        self.collision_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<DynamicValue>) -> Self {
        self.set_dynamic_data(key, value);
        self
    }

    /// Frame-rate context from the owning level's game, if linked.
    pub fn frame_timing(&self) -> Option<FrameTiming> {
        self.timing
    }

    pub(crate) fn link(&mut self, timing: Option<FrameTiming>) {
        self.timing = timing;
    }

    /// Series for the current state.
    ///
    /// Panics when the state has no series: states are fixed at construction
    /// and handlers switching to an unknown state is a content bug.
    pub fn current_series(&self) -> &AnimationSeries {
        self.states.get(&self.current_state).unwrap_or_else(|| {
            panic!(
                "game object '{}' has no animation series for state '{}'",
                self.name, self.current_state
            )
        })
    }

    pub fn current_sprite(&self) -> &dyn Compositable {
        self.current_series().frame(self.timing)
    }

    pub fn width(&self) -> i32 {
        self.current_sprite().width() as i32
    }

    pub fn height(&self) -> i32 {
        self.current_sprite().height() as i32
    }

    /// Integer X columns covered by the object.
    pub fn columns(&self) -> Range<i64> {
        let start = self.position.x as i64;
        start..start + self.width() as i64
    }

    /// Bottom and top Y of the bounding box.
    pub fn vertical_span(&self) -> (f64, f64) {
        let bottom = self.position.y;
        (bottom, bottom + self.height() as f64)
    }

    pub fn is_resting(&self) -> bool {
        if self.mass == 0.0 {
            return false;
        }
        self.position.y as i64 == self.floor_y as i64
    }

    /// Advance one tick of movement under `gravity`, firing lifecycle events
    /// on this object's handler as they happen.
    pub fn recalculate_position(&mut self, gravity: f64) {
        match self.direction {
            Direction::Right => self.position.x += self.velocity.x,
            Direction::Left => self.position.x -= self.velocity.x,
            Direction::Stationary => {}
        }

        if self.floor_y <= self.position.y {
            let was_above_floor = self.position.y > self.floor_y;

            self.position.y += self.velocity.y;
            self.velocity.y -= gravity * self.mass;

            if self.position.y > self.floor_y && self.velocity.y < 0.0 {
                self.emit(GameEvent::FreeFall);
            }

            if self.position.y <= self.floor_y && self.mass != 0.0 {
                self.position.y = self.floor_y;
                self.velocity.y = 0.0;
                if was_above_floor {
                    self.emit(GameEvent::FloorCollision);
                }
            }
        }

        if self.mass != 0.0 {
            let min_y = -(self.height() as f64);
            if self.position.y <= min_y {
                self.position.y = min_y;
                if self.is_interactive {
                    self.emit(GameEvent::DropOffLevel);
                }
            }
        }
    }

    pub fn emit(&mut self, event: GameEvent) {
        log::trace!("'{}' raised {:?}", self.name, event);
        if let Some(handler) = self.event_handler.clone() {
            handler(event, self);
        }
    }

    /// Infer which of this object's edges met `other`.
    ///
    /// When neither object is moving vertically (both float or rest), only
    /// left/right are meaningful. Otherwise corners win over plain edges.
    pub fn collision_edge(&self, other: &GameObject) -> Edge {
        let is_left = self.position.x < other.position.x;
        let is_right =
            self.position.x + self.width() as f64 > other.position.x + other.width() as f64;
        let is_bottom = self.position.y < other.position.y;
        let is_top =
            self.position.y + self.height() as f64 > other.position.y + other.height() as f64;

        let settled = |object: &GameObject| object.mass == 0.0 || object.is_resting();
        if settled(self) && settled(other) {
            if is_left {
                return Edge::Left;
            }
            if is_right {
                return Edge::Right;
            }
        }

        match (is_left, is_right, is_bottom, is_top) {
            (true, _, _, true) => Edge::TopLeft,
            (_, true, _, true) => Edge::TopRight,
            (true, _, true, _) => Edge::BottomLeft,
            (_, true, true, _) => Edge::BottomRight,
            (true, _, _, _) => Edge::Left,
            (_, true, _, _) => Edge::Right,
            (_, _, _, true) => Edge::Top,
            (_, _, true, _) => Edge::Bottom,
            _ => Edge::None,
        }
    }

    pub fn set_dynamic_data(&mut self, key: &str, value: impl Into<DynamicValue>) {
        self.dynamic_data.insert(key.to_string(), value.into());
    }

    pub fn get_dynamic_data(&self, key: &str, fallback: DynamicValue) -> DynamicValue {
        self.dynamic_data.get(key).cloned().unwrap_or(fallback)
    }

    pub fn has_dynamic_data(&self, key: &str) -> bool {
        self.dynamic_data.contains_key(key)
    }

    pub fn clear_dynamic_data(&mut self, key: &str) {
        self.dynamic_data.remove(key);
    }

    /// Numeric data as `f64`; integers widen, other variants fall back.
    pub fn dynamic_f64(&self, key: &str, fallback: f64) -> f64 {
        match self.dynamic_data.get(key) {
            Some(DynamicValue::Float(value)) => *value,
            Some(DynamicValue::Int(value)) => *value as f64,
            _ => fallback,
        }
    }

    pub fn dynamic_bool(&self, key: &str, fallback: bool) -> bool {
        match self.dynamic_data.get(key) {
            Some(DynamicValue::Bool(value)) => *value,
            _ => fallback,
        }
    }

    pub fn dynamic_str<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        match self.dynamic_data.get(key) {
            Some(DynamicValue::Text(value)) => value,
            _ => fallback,
        }
    }
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("name", &self.name)
            .field("current_state", &self.current_state)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("mass", &self.mass)
            .field("direction", &self.direction)
            .field("floor_y", &self.floor_y)
            .field("is_hidden", &self.is_hidden)
            .finish_non_exhaustive()
    }
}
