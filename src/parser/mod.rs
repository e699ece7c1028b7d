//! Loader for the input template document.
//!
//! The template is a JSON document with arbitrary pass-through fields plus a
//! dedicated `memory` section that configures the generation. We pull the
//! `memory` section out into a typed struct, interpret the handful of
//! top-level fields the compiler needs (`product-id`, `language`, `welcome`,
//! `media-path`), and keep everything else as raw `serde_json` values so the
//! writer can copy it into the output unchanged and in order.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{GenError, Result};

/// Raw `memory` section, 1-to-1 with the JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MemorySection {
    pairs: Vec<String>,
    alternative_sounds: bool,
    max_players: Option<i64>,
    img_width: Option<f64>,
    img_height: Option<f64>,
    pixel_size: Option<f64>,
    dpi: Option<u32>,
    title: Option<String>,
    output_file: Option<String>,
    output_image: Option<String>,
}

/// Everything the compiler interprets, with defaults applied.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub pairs: Vec<String>,
    pub alternative_sounds: bool,
    /// Kept signed so the model builder can reject non-positive values.
    pub max_players: i64,
    pub title: String,
    pub img_width: f64,
    pub img_height: f64,
    pub pixel_size: f64,
    pub dpi: u32,
    pub output_file: String,
    pub output_image: String,
    pub language: String,
    pub welcome: String,
    pub media_path: String,
}

/// Parsed template: interpreted config plus the pass-through document
/// (everything except the consumed `memory` section).
#[derive(Debug)]
pub struct Template {
    pub doc: Map<String, Value>,
    pub game: GameConfig,
}

impl Template {
    /// The `speak` section, when the template carries one. Presence opts the
    /// build into TTS fallback for card clips without audio files.
    pub fn speak(&self) -> Option<&Map<String, Value>> {
        self.doc.get("speak").and_then(|v| v.as_object())
    }

    /// User-pinned entry codes (kept so already-printed boards stay valid).
    pub fn scriptcodes(&self) -> Option<&Map<String, Value>> {
        self.doc.get("scriptcodes").and_then(|v| v.as_object())
    }
}

/// Parse the whole input JSON string into a `Template`.
pub fn load(json: &str, input_path: &Path) -> Result<Template> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| GenError::config(format!("invalid JSON template: {e}")))?;

    let Value::Object(mut doc) = root else {
        return Err(GenError::config("template root must be an object"));
    };

    if !doc.contains_key("product-id") {
        return Err(GenError::config("no `product-id` found in the template"));
    }

    let memory = match doc.shift_remove("memory") {
        Some(v) => serde_json::from_value::<MemorySection>(v)
            .map_err(|e| GenError::config(format!("bad `memory` section: {e}")))?,
        None => {
            log::warn!("`memory` section not found in template, using defaults");
            MemorySection::default()
        }
    };

    let language = doc
        .get("language")
        .and_then(|v| v.as_str())
        .unwrap_or("en")
        .to_string();
    let welcome = doc
        .get("welcome")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{language}_welcome"));
    let media_path = doc
        .get("media-path")
        .and_then(|v| v.as_str())
        .unwrap_or("media/%s")
        .to_string();

    let dpi = memory.dpi.unwrap_or(1200);
    let pixel_size = memory.pixel_size.unwrap_or(2.0);
    let stem = input_path
        .with_extension("")
        .to_string_lossy()
        .into_owned();
    let output_file = memory
        .output_file
        .unwrap_or_else(|| format!("{stem}-generated.json"));
    let output_image = memory
        .output_image
        .unwrap_or_else(|| format!("{stem}-{dpi}dpi-{pixel_size}mm.png"));

    let input_name = input_path.to_string_lossy();
    if output_file == input_name {
        return Err(GenError::config(
            "output file and input file cannot have the same name",
        ));
    }
    if output_image == input_name {
        return Err(GenError::config(
            "output image and input file cannot have the same name",
        ));
    }

    let game = GameConfig {
        pairs: memory.pairs,
        alternative_sounds: memory.alternative_sounds,
        max_players: memory.max_players.unwrap_or(4),
        title: memory.title.unwrap_or_else(|| "Memory".into()),
        img_width: memory.img_width.unwrap_or(190.0),
        img_height: memory.img_height.unwrap_or(270.0),
        pixel_size,
        dpi,
        output_file,
        output_image,
        language,
        welcome,
        media_path,
    };

    Ok(Template { doc, game })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn minimal() -> String {
        r#"{
            "product-id": 950,
            "memory": { "pairs": ["dog", "cat"] }
        }"#
        .to_string()
    }

    #[test]
    fn test_defaults() {
        let t = load(&minimal(), &PathBuf::from("game.json")).unwrap();
        assert_eq!(t.game.pairs, vec!["dog", "cat"]);
        assert_eq!(t.game.max_players, 4);
        assert!(!t.game.alternative_sounds);
        assert_eq!(t.game.language, "en");
        assert_eq!(t.game.welcome, "en_welcome");
        assert_eq!(t.game.media_path, "media/%s");
        assert_eq!(t.game.output_file, "game-generated.json");
        assert_eq!(t.game.output_image, "game-1200dpi-2mm.png");
        assert_eq!(t.game.title, "Memory");
    }

    #[test]
    fn test_missing_product_id() {
        let err = load(r#"{"memory": {"pairs": ["a"]}}"#, &PathBuf::from("x.json")).unwrap_err();
        assert!(err.to_string().contains("product-id"), "got: {err}");
    }

    #[test]
    fn test_root_must_be_object() {
        let err = load("[1, 2]", &PathBuf::from("x.json")).unwrap_err();
        assert!(err.to_string().contains("object"), "got: {err}");
    }

    #[test]
    fn test_output_clash() {
        let json = r#"{
            "product-id": 1,
            "memory": { "pairs": ["a"], "outputFile": "x.json" }
        }"#;
        let err = load(json, &PathBuf::from("x.json")).unwrap_err();
        assert!(err.to_string().contains("same name"), "got: {err}");
    }

    #[test]
    fn test_passthrough_preserved() {
        let json = r#"{
            "product-id": 42,
            "comment": "hands off",
            "language": "de",
            "welcome": "hello",
            "memory": { "pairs": ["a"], "maxPlayers": 2 }
        }"#;
        let t = load(json, &PathBuf::from("x.json")).unwrap();
        // `memory` is consumed, the rest stays.
        assert!(!t.doc.contains_key("memory"));
        assert_eq!(t.doc["comment"], "hands off");
        assert_eq!(t.game.language, "de");
        assert_eq!(t.game.welcome, "hello");
        assert_eq!(t.game.max_players, 2);
    }
}
