use image::Rgba;
use serde::Deserialize;
use spe_core::{AnimationSeries, Direction, DynamicValue, GameConfig, GameObject, Level, Vector};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assets::{load_sheet_from_path, SpriteRegistry};
use crate::behaviour::{self, Behaviour};

#[derive(Debug, Deserialize, Clone)]
pub struct SceneFile {
    pub version: String,
    pub level_id: String,
    #[serde(default)]
    pub game: Option<GameConfig>,
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    #[serde(default = "default_background")]
    pub background: [u8; 4],
    #[serde(default)]
    pub paint_offset: [f64; 2],
    #[serde(default)]
    pub camera: Option<SceneCamera>,
    #[serde(default)]
    pub sheets: Vec<String>,
    pub objects: Vec<SceneObject>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SceneCamera {
    #[serde(default = "default_max_scroll_x")]
    pub max_scroll_x: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub behaviour: Behaviour,
    pub state: String,
    pub states: BTreeMap<String, SceneState>,
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default)]
    pub mass: f64,
    #[serde(default)]
    pub velocity: [f64; 2],
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub floor: bool,
    #[serde(default)]
    pub controllable: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub data: BTreeMap<String, DynamicValue>,
    /// Stamp the object `count` times, offsetting each copy by `step`.
    #[serde(default)]
    pub repeat: Option<SceneRepeat>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SceneState {
    pub frames: Vec<String>,
    #[serde(default = "default_cycles_per_second")]
    pub cycles_per_second: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SceneRepeat {
    pub count: u32,
    pub step: [f64; 2],
}

/// A scene turned into a runnable level.
pub struct LoadedScene {
    pub level_id: String,
    pub config: Option<GameConfig>,
    pub camera: Option<SceneCamera>,
    pub level: Level,
}

pub fn load_scene_from_path(scene_path: &Path) -> Result<SceneFile, String> {
    let raw = fs::read_to_string(scene_path)
        .map_err(|e| format!("Failed to read scene file {}: {e}", scene_path.display()))?;
    let scene: SceneFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse scene JSON {}: {e}", scene_path.display()))?;
    validate_scene(&scene)?;
    Ok(scene)
}

/// Load a scene, every sprite sheet it names (relative to the scene file) and
/// build its level.
pub fn load_level(scene_path: &Path) -> Result<LoadedScene, String> {
    let scene = load_scene_from_path(scene_path)?;
    let base_dir = scene_path.parent().unwrap_or_else(|| Path::new("."));

    let mut registry = SpriteRegistry::new();
    for sheet in &scene.sheets {
        let sheet_path: PathBuf = base_dir.join(sheet);
        registry.add_sheet(load_sheet_from_path(&sheet_path)?)?;
    }

    let level = build_level(&scene, &registry)?;
    log::info!(
        "Loaded scene '{}' from {}: {} sheet(s), {} object(s)",
        scene.level_id,
        scene_path.display(),
        registry.len(),
        level.len()
    );
    Ok(LoadedScene {
        level_id: scene.level_id,
        config: scene.game,
        camera: scene.camera,
        level,
    })
}

pub fn build_level(scene: &SceneFile, registry: &SpriteRegistry) -> Result<Level, String> {
    let mut level = Level::new(Rgba(scene.background), scene.gravity);
    level.paint_offset = Vector::from_array(scene.paint_offset);
    if let Some(camera) = scene.camera {
        level = level.with_before_paint(behaviour::camera_follow(camera.max_scroll_x));
    }

    for object in &scene.objects {
        let (count, step) = match object.repeat {
            Some(repeat) => (repeat.count, Vector::from_array(repeat.step)),
            None => (1, Vector::ZERO),
        };
        for copy in 0..count {
            let name = if object.repeat.is_some() {
                format!("{}_{}", object.name, copy)
            } else {
                object.name.clone()
            };
            let offset = step * copy as f64;
            level.add_object(build_object(object, name, offset, registry)?);
        }
    }

    Ok(level)
}

fn build_object(
    object: &SceneObject,
    name: String,
    offset: Vector,
    registry: &SpriteRegistry,
) -> Result<GameObject, String> {
    let mut states = HashMap::with_capacity(object.states.len());
    for (state, series) in &object.states {
        let frames = registry
            .resolve_frames(&series.frames)
            .map_err(|e| format!("Object '{}' state '{}': {e}", object.name, state))?;
        let series = AnimationSeries::new(frames, series.cycles_per_second)
            .map_err(|e| format!("Object '{}' state '{}': {e}", object.name, state))?;
        states.insert(state.clone(), series);
    }

    let position = Vector::from_array(object.position) + offset;
    let mut built = GameObject::new(name, object.state.clone(), states)?
        .with_position(position.x, position.y)
        .with_mass(object.mass)
        .with_velocity(object.velocity[0], object.velocity[1])
        .with_direction(object.direction)
        .interactive(object.interactive);
    built.is_floor = object.floor;
    built.is_controllable = object.controllable;
    built.is_hidden = object.hidden;
    for (key, value) in &object.data {
        built.set_dynamic_data(key, value.clone());
    }

    Ok(object.behaviour.apply(built))
}

fn validate_scene(scene: &SceneFile) -> Result<(), String> {
    if scene.version != "0.1" {
        return Err(format!(
            "Scene validation failed: unsupported version '{}'",
            scene.version
        ));
    }
    if let Some(config) = &scene.game {
        spe_core::validate_game_config(config)
            .map_err(|e| format!("Scene '{}': {e}", scene.level_id))?;
    }
    if scene.objects.is_empty() {
        log::warn!(
            "Scene '{}' has no objects. This is allowed but often accidental.",
            scene.level_id
        );
    }

    let mut names = HashSet::new();
    for object in &scene.objects {
        if !names.insert(object.name.clone()) {
            return Err(format!(
                "Scene validation failed: duplicate object name '{}'",
                object.name
            ));
        }
        if !object.states.contains_key(&object.state) {
            return Err(format!(
                "Scene validation failed: object '{}' starts in unknown state '{}'",
                object.name, object.state
            ));
        }
        for (state, series) in &object.states {
            if series.frames.is_empty() {
                return Err(format!(
                    "Scene validation failed: object '{}' state '{}' has no frames",
                    object.name, state
                ));
            }
            if series.cycles_per_second == 0 {
                return Err(format!(
                    "Scene validation failed: object '{}' state '{}' has cycles_per_second 0",
                    object.name, state
                ));
            }
        }
        if object.behaviour == Behaviour::Player {
            if let Some(missing) = behaviour::PLAYER_STATES
                .iter()
                .find(|state| !object.states.contains_key(**state))
            {
                return Err(format!(
                    "Scene validation failed: player object '{}' is missing state '{}'",
                    object.name, missing
                ));
            }
        }
        if let Some(repeat) = object.repeat {
            if repeat.count == 0 {
                return Err(format!(
                    "Scene validation failed: object '{}' repeats 0 times",
                    object.name
                ));
            }
        }
    }

    Ok(())
}

const fn default_gravity() -> f64 {
    1.0
}

const fn default_background() -> [u8; 4] {
    [0, 0, 0, 255]
}

const fn default_max_scroll_x() -> f64 {
    behaviour::DEFAULT_MAX_SCROLL_X
}

const fn default_cycles_per_second() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{temp_file_path, two_cell_sheet_json};

    fn write_scene_file(path: &Path, body: &str) {
        fs::write(path, body).expect("failed to write temp scene file");
    }

    fn scene_json(sheet_file: &str, objects: &str) -> String {
        format!(
            r#"{{
              "version": "0.1",
              "level_id": "test_level",
              "game": {{ "width": 160, "height": 120, "target_frame_rate": 30 }},
              "gravity": 0.5,
              "background": [1, 2, 3, 255],
              "camera": {{}},
              "sheets": ["{sheet_file}"],
              "objects": [{objects}]
            }}"#
        )
    }

    const GROUND: &str = r#"{
        "name": "ground",
        "state": "default",
        "states": { "default": { "frames": ["tiles@0,0"] } },
        "floor": true,
        "interactive": true,
        "repeat": { "count": 4, "step": [16, 0] }
    }"#;

    const HERO: &str = r#"{
        "name": "hero",
        "behaviour": "player",
        "state": "standing",
        "states": {
            "standing": { "frames": ["tiles"] },
            "moving": { "frames": ["tiles@0,0", "tiles@1,0"], "cycles_per_second": 2 },
            "jumping": { "frames": ["tiles@1,0"] },
            "landing": { "frames": ["tiles@1,0"] }
        },
        "position": [8, 40],
        "mass": 0.4,
        "velocity": [2, 0],
        "data": { "lives": 3, "title": "hero" }
    }"#;

    /// Writes a sheet and a scene beside it; returns (scene, sheet) paths.
    fn write_fixture(name_hint: &str, objects: &str) -> (PathBuf, PathBuf) {
        let sheet_path = temp_file_path(name_hint, "sheet.json");
        fs::write(&sheet_path, two_cell_sheet_json("tiles")).expect("write sheet");
        let sheet_name = sheet_path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("utf-8 file name")
            .to_string();
        let scene_path = temp_file_path(name_hint, "level.json");
        write_scene_file(&scene_path, &scene_json(&sheet_name, objects));
        (scene_path, sheet_path)
    }

    fn cleanup(paths: (PathBuf, PathBuf)) {
        let _ = fs::remove_file(paths.0);
        let _ = fs::remove_file(paths.1);
    }

    #[test]
    fn load_level_builds_objects_from_sheets() {
        let paths = write_fixture("valid", &format!("{GROUND},{HERO}"));
        let loaded = load_level(&paths.0).expect("scene should load");
        cleanup(paths);

        assert_eq!(loaded.level_id, "test_level");
        let config = loaded.config.expect("embedded game config");
        assert_eq!((config.width, config.height), (160, 120));
        assert_eq!(config.scale_factor, 2);
        assert_eq!(config.target_frame_rate, 30);

        let level = loaded.level;
        assert_eq!(level.len(), 5);
        assert_eq!(level.gravity, 0.5);
        assert_eq!(level.background_colour, Rgba([1, 2, 3, 255]));
        assert!(level.before_paint.is_some());
        let camera = loaded.camera.expect("camera block");
        assert_eq!(camera.max_scroll_x, 960.0);

        let last_ground = level.find_object("ground_3").and_then(|id| level.object(id));
        let last_ground = last_ground.expect("repeated ground");
        assert_eq!(last_ground.position, Vector::new(48.0, 0.0));
        assert!(last_ground.is_floor);
        assert!(last_ground.is_interactive);

        let hero = level.find_object("hero").and_then(|id| level.object(id)).expect("hero");
        assert!(hero.is_controllable);
        assert!(hero.collision_handler.is_some());
        assert_eq!((hero.width(), hero.height()), (32, 16));
        assert_eq!(hero.states["moving"].cycles_per_second(), 2);
        assert_eq!(hero.dynamic_f64("lives", 0.0), 3.0);
        assert_eq!(hero.dynamic_str("title", ""), "hero");
    }

    #[test]
    fn load_scene_rejects_duplicate_object_names() {
        let paths = write_fixture("dup_names", &format!("{HERO},{HERO}"));
        let err = load_level(&paths.0).err().expect("duplicate names should fail");
        cleanup(paths);
        assert!(err.contains("duplicate object name 'hero'"));
    }

    #[test]
    fn load_scene_rejects_unknown_initial_state() {
        let object = HERO.replace(r#""state": "standing""#, r#""state": "flying""#);
        let paths = write_fixture("unknown_state", &object);
        let err = load_level(&paths.0).err().expect("unknown state should fail");
        cleanup(paths);
        assert!(err.contains("unknown state 'flying'"));
    }

    #[test]
    fn load_scene_rejects_zero_cycles() {
        let object = HERO.replace(r#""cycles_per_second": 2"#, r#""cycles_per_second": 0"#);
        let paths = write_fixture("zero_cycles", &object);
        let err = load_level(&paths.0).err().expect("zero cycles should fail");
        cleanup(paths);
        assert!(err.contains("cycles_per_second 0"));
    }

    #[test]
    fn load_scene_rejects_player_without_landing_state() {
        let object = HERO.replace(r#""landing": { "frames": ["tiles@1,0"] }"#, r#""falling": { "frames": ["tiles@1,0"] }"#);
        let paths = write_fixture("player_states", &object);
        let err = load_level(&paths.0).err().expect("missing player state should fail");
        cleanup(paths);
        assert!(err.contains("missing state 'landing'"));
    }

    #[test]
    fn load_scene_rejects_unknown_behaviour() {
        let object = HERO.replace(r#""behaviour": "player""#, r#""behaviour": "wizard""#);
        let paths = write_fixture("unknown_behaviour", &object);
        let err = load_level(&paths.0).err().expect("unknown behaviour should fail");
        cleanup(paths);
        assert!(err.contains("Failed to parse scene JSON"));
    }

    #[test]
    fn load_scene_rejects_unknown_sprite_reference() {
        let object = HERO.replace(r#"["tiles"]"#, r#"["tiles@5,5"]"#);
        let paths = write_fixture("bad_ref", &object);
        let err = load_level(&paths.0).err().expect("unknown reference should fail");
        cleanup(paths);
        assert!(err.contains("Unknown sprite reference 'tiles@5,5'"));
    }

    #[test]
    fn empty_scene_is_allowed() {
        let paths = write_fixture("empty", "");
        let loaded = load_level(&paths.0).expect("empty scene loads");
        cleanup(paths);
        assert!(loaded.level.is_empty());
    }
}
