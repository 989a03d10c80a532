//! A level owns its game objects and runs the per-tick pipeline: floor
//! assignment, collision dispatch, physics and painting.
//!
//! Floors and collisions are found with a full sweep over a column index
//! rebuilt every tick (integer X column -> objects spanning it). Nothing
//! spatial persists between ticks.

use image::{Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::animation::FrameTiming;
use crate::game_object::{Collision, Direction, GameObject, ObjectId, Vector};

/// Runs against the level just before it is repainted, e.g. to scroll.
pub type BeforePaint = Rc<dyn Fn(&mut Level)>;

/// What a level knows about the game it belongs to for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLink {
    pub timing: FrameTiming,
    pub width: u32,
    pub height: u32,
}

pub struct Level {
    pub background_colour: Rgba<u8>,
    pub gravity: f64,
    /// Scroll offset applied when painting; X scrolls right, Y scrolls up.
    pub paint_offset: Vector,
    pub before_paint: Option<BeforePaint>,
    game: Option<GameLink>,
    objects: Vec<(ObjectId, GameObject)>,
    next_id: u32,
}

impl Level {
    pub fn new(background_colour: Rgba<u8>, gravity: f64) -> Self {
        Self {
            background_colour,
            gravity,
            paint_offset: Vector::ZERO,
            before_paint: None,
            game: None,
            objects: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_before_paint(mut self, hook: impl Fn(&mut Level) + 'static) -> Self {
        self.before_paint = Some(Rc::new(hook));
        self
    }

    /// Append an object to the paint sequence.
    pub fn add_object(&mut self, mut object: GameObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        object.link(self.game.map(|link| link.timing));
        self.objects.push((id, object));
        id
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<GameObject> {
        let index = self.index_of(id)?;
        Some(self.objects.remove(index).1)
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.index_of(id).map(|index| &self.objects[index].1)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.index_of(id).map(move |index| &mut self.objects[index].1)
    }

    /// Objects in paint order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.objects.iter().map(|(id, object)| (*id, object))
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut GameObject)> {
        self.objects.iter_mut().map(|(id, object)| (*id, object))
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Game context for this tick; `None` until the level has been ticked by a game.
    pub fn game(&self) -> Option<GameLink> {
        self.game
    }

    /// Attach this tick's game context. Objects see the new frame counter
    /// immediately, so floors and collisions use this tick's frame sizes.
    pub fn link_game(&mut self, link: GameLink) {
        self.game = Some(link);
        for (_, object) in &mut self.objects {
            object.link(Some(link.timing));
        }
    }

    pub fn run_before_paint(&mut self) {
        if let Some(hook) = self.before_paint.clone() {
            hook(self);
        }
    }

    /// Give every visible, interactive, massive object the highest floor top
    /// edge beneath it, or `-height` when nothing supports it.
    pub fn assign_floors(&mut self) {
        let mut columns: HashMap<i64, Vec<f64>> = HashMap::new();
        for (_, object) in &self.objects {
            if object.is_hidden || !object.is_interactive || !object.is_floor {
                continue;
            }
            let top = object.vertical_span().1;
            for x in object.columns() {
                columns.entry(x).or_default().push(top);
            }
        }

        let mut supported = 0usize;
        for (_, object) in &mut self.objects {
            if object.is_hidden || !object.is_interactive || object.mass == 0.0 {
                continue;
            }

            let mut floor_y = -(object.height() as f64);
            for x in object.columns() {
                let Some(tops) = columns.get(&x) else {
                    continue;
                };
                for &top in tops {
                    if top <= object.position.y && top > floor_y {
                        floor_y = top;
                    }
                }
            }
            if floor_y > -(object.height() as f64) {
                supported += 1;
            }
            object.floor_y = floor_y;
        }

        log::debug!(
            "Assigned floors: {} floor columns, {} supported objects",
            columns.len(),
            supported
        );
    }

    /// Find every pair of visible, interactive objects whose boxes overlap
    /// and call each scanning object's collision handler once per partner.
    ///
    /// Both objects of a pair scan independently, so each side's handler
    /// fires with the edge seen from its own perspective. Handlers may mutate
    /// the level; later scans see those changes.
    pub fn calculate_collisions(&mut self) {
        let mut columns: HashMap<i64, Vec<ObjectId>> = HashMap::new();
        let mut scanners = Vec::new();
        for (id, object) in &self.objects {
            if object.is_hidden || !object.is_interactive {
                continue;
            }
            for x in object.columns() {
                columns.entry(x).or_default().push(*id);
            }
            scanners.push(*id);
        }

        let mut dispatched = 0usize;
        for scanner in scanners {
            let has_handler = self
                .object(scanner)
                .is_some_and(|object| object.collision_handler.is_some());
            if !has_handler {
                continue;
            }
            for other in self.intersecting(scanner, &columns) {
                let Some(object) = self.object(scanner) else {
                    break;
                };
                let Some(handler) = object.collision_handler.clone() else {
                    break;
                };
                let Some(other_object) = self.object(other) else {
                    continue;
                };
                let edge = object.collision_edge(other_object);
                log::trace!("'{}' collided with '{}' on {}", object.name, other_object.name, edge);
                handler(self, scanner, Collision { other, edge });
                dispatched += 1;
            }
        }

        if dispatched > 0 {
            log::debug!("Dispatched {} collisions", dispatched);
        }
    }

    /// Distinct objects sharing a column with `scanner` whose vertical
    /// spans overlap it, in discovery order.
    fn intersecting(&self, scanner: ObjectId, columns: &HashMap<i64, Vec<ObjectId>>) -> Vec<ObjectId> {
        let Some(object) = self.object(scanner) else {
            return Vec::new();
        };
        let (bottom, top) = object.vertical_span();

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for x in object.columns() {
            let Some(candidates) = columns.get(&x) else {
                continue;
            };
            for &candidate in candidates {
                if candidate == scanner || seen.contains(&candidate) {
                    continue;
                }
                let Some(other) = self.object(candidate) else {
                    continue;
                };
                let (other_bottom, other_top) = other.vertical_span();
                if bottom >= other_top || top <= other_bottom {
                    continue;
                }
                seen.insert(candidate);
                found.push(candidate);
            }
        }
        found
    }

    /// Run one tick and paint it: floors, collisions, background, then each
    /// visible object's physics and sprite in sequence order.
    pub fn repaint(&mut self, stage: &mut RgbaImage) {
        self.assign_floors();
        self.calculate_collisions();

        let background = self.background_colour;
        for pixel in stage.pixels_mut() {
            *pixel = background;
        }

        let gravity = self.gravity;
        let offset_x = self.paint_offset.x as i64;
        let offset_y = self.paint_offset.y as i64;
        let stage_height = stage.height() as i64;

        for (_, object) in &mut self.objects {
            if object.is_hidden {
                continue;
            }

            object.recalculate_position(gravity);

            match object.direction {
                Direction::Left => object.is_flipped = true,
                Direction::Right => object.is_flipped = false,
                Direction::Stationary => {}
            }

            let paint_x = object.position.x as i64 - offset_x;
            let paint_y =
                stage_height - object.position.y as i64 - object.height() as i64 + offset_y;
            object.current_sprite().render(
                stage,
                clamp_to_i32(paint_x),
                clamp_to_i32(paint_y),
                object.is_flipped,
            );
        }
    }

    fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.binary_search_by_key(&id, |(id, _)| *id).ok()
    }
}

fn clamp_to_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("background_colour", &self.background_colour)
            .field("gravity", &self.gravity)
            .field("paint_offset", &self.paint_offset)
            .field("objects", &self.objects.len())
            .field("game", &self.game)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_object::tests::block;
    use crate::game_object::{Edge, GameEvent};
    use std::cell::RefCell;

    const SKY: Rgba<u8> = Rgba([10, 20, 30, 255]);
    const BLOCK: Rgba<u8> = Rgba([200, 40, 40, 255]);

    fn ground(x: f64, y: f64) -> GameObject {
        GameObject::still("ground", block(1, 1))
            .interactive(true)
            .floor()
            .with_position(x, y)
    }

    fn body(name: &str, x: f64, y: f64) -> GameObject {
        GameObject::still(name, block(1, 1))
            .interactive(true)
            .with_mass(1.0)
            .with_position(x, y)
    }

    type Hits = Rc<RefCell<Vec<(String, ObjectId, Edge)>>>;

    fn recording(object: GameObject, hits: &Hits) -> GameObject {
        let hits = hits.clone();
        object.with_collision_handler(move |level, me, collision| {
            let name = level.object(me).map(|o| o.name.clone()).unwrap_or_default();
            hits.borrow_mut().push((name, collision.other, collision.edge));
        })
    }

    #[test]
    fn ids_stay_valid_after_removal() {
        let mut level = Level::new(SKY, 1.0);
        let a = level.add_object(body("a", 0.0, 0.0));
        let b = level.add_object(body("b", 0.0, 0.0));
        let c = level.add_object(body("c", 0.0, 0.0));

        let removed = level.remove_object(b).expect("b exists");
        assert_eq!(removed.name, "b");
        assert!(level.object(b).is_none());
        assert_eq!(level.object(a).map(|o| o.name.as_str()), Some("a"));
        assert_eq!(level.object(c).map(|o| o.name.as_str()), Some("c"));

        let d = level.add_object(body("d", 0.0, 0.0));
        assert_ne!(d, b);
        let order: Vec<_> = level.objects().map(|(_, o)| o.name.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "d"]);
        assert_eq!(level.find_object("d"), Some(d));
    }

    #[test]
    fn object_sitting_on_floor_gets_its_top_edge() {
        let mut level = Level::new(SKY, 1.0);
        level.add_object(ground(0.0, 0.0));
        let hero = level.add_object(body("hero", 8.0, 16.0));
        level.assign_floors();
        assert_eq!(level.object(hero).map(|o| o.floor_y), Some(16.0));
    }

    #[test]
    fn highest_floor_below_wins_across_columns() {
        let mut level = Level::new(SKY, 1.0);
        level.add_object(ground(0.0, 0.0));
        level.add_object(ground(16.0, 20.0));
        // Above both, spanning columns of each.
        level.add_object(ground(40.0, 200.0));
        let hero = level.add_object(body("hero", 8.0, 50.0));
        level.assign_floors();
        assert_eq!(level.object(hero).map(|o| o.floor_y), Some(36.0));
    }

    #[test]
    fn unsupported_object_floors_at_minus_height() {
        let mut level = Level::new(SKY, 1.0);
        level.add_object(ground(100.0, 0.0));
        let hero = level.add_object(body("hero", 0.0, 40.0));
        level.assign_floors();
        assert_eq!(level.object(hero).map(|o| o.floor_y), Some(-16.0));
    }

    #[test]
    fn hidden_or_inert_floors_do_not_support() {
        let mut level = Level::new(SKY, 1.0);
        level.add_object(ground(0.0, 0.0).hidden());
        level.add_object(ground(0.0, 0.0).interactive(false));
        let hero = level.add_object(body("hero", 0.0, 40.0));
        level.assign_floors();
        assert_eq!(level.object(hero).map(|o| o.floor_y), Some(-16.0));
    }

    #[test]
    fn overlapping_pair_reports_from_both_sides() {
        let hits: Hits = Rc::new(RefCell::new(Vec::new()));
        let mut level = Level::new(SKY, 1.0);
        let mut a = body("a", 0.0, 10.0);
        a.floor_y = 0.0;
        let a = level.add_object(recording(a, &hits));
        let b = level.add_object(recording(
            GameObject::still("b", block(1, 1))
                .interactive(true)
                .with_position(8.0, 0.0),
            &hits,
        ));

        level.calculate_collisions();

        let hits = hits.borrow();
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&("a".to_string(), b, Edge::TopLeft)));
        assert!(hits.contains(&("b".to_string(), a, Edge::BottomRight)));
    }

    #[test]
    fn each_partner_reported_once_per_tick() {
        let hits: Hits = Rc::new(RefCell::new(Vec::new()));
        let mut level = Level::new(SKY, 1.0);
        // Wide object shares many columns with the narrow one.
        level.add_object(recording(
            GameObject::still("wide", block(4, 1))
                .interactive(true)
                .with_position(0.0, 0.0),
            &hits,
        ));
        level.add_object(
            GameObject::still("narrow", block(1, 1))
                .interactive(true)
                .with_position(20.0, 4.0),
        );
        level.calculate_collisions();
        assert_eq!(hits.borrow().len(), 1);
    }

    #[test]
    fn only_objects_with_handlers_scan() {
        let hits: Hits = Rc::new(RefCell::new(Vec::new()));
        let mut level = Level::new(SKY, 1.0);
        let crowd: Vec<ObjectId> = (0..4)
            .map(|i| level.add_object(body(&format!("crowd{i}"), f64::from(i) * 4.0, 0.0)))
            .collect();
        level.add_object(recording(body("scanner", 2.0, 2.0), &hits));

        level.calculate_collisions();

        let hits = hits.borrow();
        assert_eq!(hits.len(), crowd.len());
        assert!(hits.iter().all(|(name, _, _)| name == "scanner"));
        assert!(crowd.iter().all(|id| hits.iter().any(|(_, other, _)| other == id)));
    }

    #[test]
    fn touching_edges_do_not_collide() {
        let hits: Hits = Rc::new(RefCell::new(Vec::new()));
        let mut level = Level::new(SKY, 1.0);
        level.add_object(recording(ground(0.0, 0.0), &hits));
        level.add_object(recording(body("hero", 0.0, 16.0), &hits));
        level.add_object(recording(body("beside", 16.0, 0.0), &hits));
        level.calculate_collisions();
        assert!(hits.borrow().is_empty());
    }

    #[test]
    fn hidden_objects_are_not_scanned() {
        let hits: Hits = Rc::new(RefCell::new(Vec::new()));
        let mut level = Level::new(SKY, 1.0);
        level.add_object(recording(body("a", 0.0, 0.0), &hits));
        level.add_object(recording(body("b", 0.0, 0.0).hidden(), &hits));
        level.calculate_collisions();
        assert!(hits.borrow().is_empty());
    }

    #[test]
    fn collision_handler_can_change_the_level() {
        let mut level = Level::new(SKY, 1.0);
        let hero = body("hero", 0.0, 0.0).with_collision_handler(|level, _, collision| {
            let is_powerup = level
                .object(collision.other)
                .is_some_and(|o| o.dynamic_str("type", "") == "powerup");
            if is_powerup {
                level.gravity = 0.3;
                if let Some(other) = level.object_mut(collision.other) {
                    other.is_hidden = true;
                    other.is_interactive = false;
                }
            }
        });
        level.add_object(hero);
        let powerup = level.add_object(
            GameObject::still("powerup", block(1, 1))
                .interactive(true)
                .with_position(4.0, 4.0)
                .with_data("type", "powerup"),
        );

        level.calculate_collisions();

        assert_eq!(level.gravity, 0.3);
        let powerup = level.object(powerup).expect("powerup remains");
        assert!(powerup.is_hidden);
        assert!(!powerup.is_interactive);
    }

    #[test]
    fn repaint_flips_y_and_applies_offset() {
        let mut level = Level::new(SKY, 1.0);
        level.add_object(
            GameObject::still("crate", block(1, 1))
                .interactive(true)
                .with_position(10.0, 20.0),
        );
        level.paint_offset = Vector::new(4.0, 3.0);

        let mut stage = RgbaImage::new(64, 64);
        level.repaint(&mut stage);

        // x = 10 - 4, y = 64 - 20 - 16 + 3
        assert_eq!(stage.get_pixel(6, 31), &BLOCK);
        assert_eq!(stage.get_pixel(21, 46), &BLOCK);
        assert_eq!(stage.get_pixel(5, 31), &SKY);
        assert_eq!(stage.get_pixel(6, 30), &SKY);
        assert_eq!(stage.get_pixel(22, 47), &SKY);
    }

    #[test]
    fn repaint_skips_hidden_objects() {
        let mut level = Level::new(SKY, 1.0);
        let ghost = level.add_object(
            GameObject::still("ghost", block(1, 1))
                .hidden()
                .with_mass(1.0)
                .with_position(0.0, 30.0),
        );
        let mut stage = RgbaImage::new(32, 64);
        level.repaint(&mut stage);
        assert!(stage.pixels().all(|p| *p == SKY));
        assert_eq!(level.object(ghost).map(|o| o.position.y), Some(30.0));
    }

    #[test]
    fn repaint_updates_flip_from_direction() {
        let mut level = Level::new(SKY, 0.0);
        let id = level.add_object(
            GameObject::still("walker", block(1, 1)).with_direction(Direction::Left),
        );
        let mut stage = RgbaImage::new(32, 32);
        level.repaint(&mut stage);
        assert_eq!(level.object(id).map(|o| o.is_flipped), Some(true));

        if let Some(object) = level.object_mut(id) {
            object.direction = Direction::Stationary;
        }
        level.repaint(&mut stage);
        assert_eq!(level.object(id).map(|o| o.is_flipped), Some(true));

        if let Some(object) = level.object_mut(id) {
            object.direction = Direction::Right;
        }
        level.repaint(&mut stage);
        assert_eq!(level.object(id).map(|o| o.is_flipped), Some(false));
    }

    #[test]
    fn falling_body_lands_on_floor_over_repaints() {
        let landings = Rc::new(RefCell::new(0));
        let counter = landings.clone();
        let mut level = Level::new(SKY, 1.0);
        level.add_object(ground(0.0, 0.0));
        let hero = level.add_object(
            body("hero", 0.0, 26.0)
                .with_mass(0.4)
                .with_event_handler(move |event, _| {
                    if event == GameEvent::FloorCollision {
                        *counter.borrow_mut() += 1;
                    }
                }),
        );

        let mut stage = RgbaImage::new(64, 64);
        for _ in 0..30 {
            level.repaint(&mut stage);
        }

        let hero = level.object(hero).expect("hero");
        assert_eq!(hero.position.y, 16.0);
        assert_eq!(hero.velocity.y, 0.0);
        assert!(hero.is_resting());
        assert_eq!(*landings.borrow(), 1);
    }

    #[test]
    fn before_paint_hook_can_scroll() {
        let mut level = Level::new(SKY, 1.0).with_before_paint(|level| {
            level.paint_offset.x += 2.0;
        });
        level.run_before_paint();
        level.run_before_paint();
        assert_eq!(level.paint_offset.x, 4.0);
    }

    fn link_frame(level: &mut Level, current_frame: u32) {
        level.link_game(GameLink {
            timing: FrameTiming {
                target_frame_rate: 3,
                current_frame,
            },
            width: 64,
            height: 64,
        });
    }

    #[test]
    fn collisions_use_the_current_frame_size() {
        // At 3 fps and 1 cps the series shows index 2 (32px) on frame 1 and
        // index 0 (16px) on frame 2.
        let series = crate::animation::AnimationSeries::new(
            vec![block(1, 1), block(1, 1), block(2, 1)],
            1,
        )
        .expect("valid series");
        let states = HashMap::from([("default".to_string(), series)]);
        let frames_hit: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let record = frames_hit.clone();
        let grower = GameObject::new("grower", "default", states)
            .expect("valid object")
            .interactive(true)
            .with_collision_handler(move |level, _, _| {
                let frame = level.game().map_or(0, |link| link.timing.current_frame);
                record.borrow_mut().push(frame);
            });

        let mut level = Level::new(SKY, 1.0);
        level.add_object(grower);
        level.add_object(GameObject::still("post", block(1, 1)).interactive(true).with_position(20.0, 0.0));
        let mut stage = RgbaImage::new(64, 64);

        link_frame(&mut level, 1);
        level.repaint(&mut stage);
        link_frame(&mut level, 2);
        level.repaint(&mut stage);

        assert_eq!(*frames_hit.borrow(), vec![1]);
    }

    #[test]
    fn objects_added_after_linking_see_the_frame() {
        let mut level = Level::new(SKY, 1.0);
        link_frame(&mut level, 2);
        let id = level.add_object(body("late", 0.0, 0.0));
        let timing = level.object(id).and_then(|o| o.frame_timing());
        assert_eq!(timing.map(|t| t.current_frame), Some(2));
    }
}
