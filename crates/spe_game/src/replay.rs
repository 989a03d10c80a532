use serde::Deserialize;
use spe_core::Key;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Scripted keyboard input: each frame lists the keys held during it.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(default)]
    pub keys: Vec<Key>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ReplaySequence {
    /// One held-key set per tick.
    pub fn expanded_keys(&self) -> Vec<HashSet<Key>> {
        let mut out = Vec::new();
        for frame in &self.frames {
            let held: HashSet<Key> = frame.keys.iter().copied().collect();
            for _ in 0..frame.repeat.max(1) {
                out.push(held.clone());
            }
        }
        out
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let replay: ReplaySequence = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse replay JSON {}: {e}", path.display()))?;
    validate_replay(&replay)?;
    Ok(replay)
}

fn validate_replay(replay: &ReplaySequence) -> Result<(), String> {
    if replay.frames.is_empty() {
        return Err("Replay validation failed: frames list is empty".to_string());
    }
    Ok(())
}

const fn default_repeat() -> u32 {
    1
}
