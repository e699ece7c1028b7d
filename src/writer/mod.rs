//! Assemble the output document and write it to disk.
//!
//! Pure formatting: the compiled program is rendered into the document's
//! `scripts` mapping, `init` and `scriptcodes` are filled in, every
//! pass-through field is copied in its original order, and the consumed
//! `memory` section is replaced by a `board` section for the external board
//! renderer. Nothing is written to disk when any earlier stage failed.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::{Map, Number, Value, json};

use crate::model::GameModel;
use crate::parser::Template;
use crate::processor::CompiledGame;

/// Build the complete output document.
pub fn assemble(template: &Template, model: &GameModel, compiled: &CompiledGame) -> Value {
    let mut doc = template.doc.clone();

    doc.insert("init".into(), Value::String(compiled.init.clone()));

    let mut scripts = Map::new();
    for (label, lines) in compiled.program.render() {
        let lines = lines.into_iter().map(Value::String).collect();
        scripts.insert(label, Value::Array(lines));
    }
    doc.insert("scripts".into(), Value::Object(scripts));

    // Codes pinned in the template win over the compiler's defaults, so a
    // template edit never invalidates an already-printed board.
    let pinned = template.scriptcodes().cloned().unwrap_or_default();
    let mut codes = Map::new();
    for (label, code) in &compiled.codes {
        let value = pinned
            .get(label)
            .cloned()
            .unwrap_or_else(|| Value::Number(Number::from(*code)));
        codes.insert(label.clone(), value);
    }
    doc.insert("scriptcodes".into(), Value::Object(codes));

    if model.speak.is_empty() {
        doc.remove("speak");
    } else {
        if !model.missing.is_empty() {
            log::info!(
                "{} clip(s) without audio files will be spoken: {}",
                model.missing.len(),
                model.missing.join(", ")
            );
        }
        let speak = model
            .speak
            .iter()
            .map(|(clip, text)| (clip.clone(), Value::String(text.clone())))
            .collect();
        doc.insert("speak".into(), Value::Object(speak));
    }

    let game = &template.game;
    doc.insert(
        "board".into(),
        json!({
            "title": game.title,
            "imgWidth": game.img_width,
            "imgHeight": game.img_height,
            "pixelSize": game.pixel_size,
            "dpi": game.dpi,
            "outputImage": game.output_image,
        }),
    );

    Value::Object(doc)
}

/// Pretty-print the document to `path`.
pub fn write(doc: &Value, path: &Path) -> anyhow::Result<()> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("Writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
