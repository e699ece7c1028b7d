pub mod cli;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod sim;
pub mod writer;

use std::io::{self, BufRead, Write as _};
use std::path::Path;

use anyhow::Context;
use clap::Parser;

use crate::model::{AssetCatalog, GameModel};

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // 1. ── Parse ──────────────────────────────────────────────────────
    let json = std::fs::read_to_string(&args.template)
        .with_context(|| format!("Reading {}", args.template.display()))?;
    let template =
        parser::load(&json, &args.template).with_context(|| "Parsing input template")?;

    // Media files are looked up next to the template.
    let base = args
        .template
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let catalog = AssetCatalog::media(template.game.media_path.clone(), base);

    let model = GameModel::build(&template.game, &catalog, template.speak())
        .with_context(|| "Building the game model")?;
    log::info!(
        "game: {} pairs, up to {} players, language `{}`",
        model.num_pairs(),
        model.max_players(),
        model.language
    );

    // 2. ── Compile ────────────────────────────────────────────────────
    let compiled = processor::run(&model).with_context(|| "Compiling the game scripts")?;

    // 3. ── Write the output document ──────────────────────────────────
    if args.script_only {
        log::debug!("--script-only: board rendering is external, nothing skipped");
    }
    let doc = writer::assemble(&template, &model, &compiled);
    writer::write(&doc, Path::new(&template.game.output_file))
        .with_context(|| "Writing output document")?;

    if args.play {
        play(&compiled)?;
    }
    Ok(())
}

/// Interactive session on the generated program: one entry label per input
/// line, clips echoed back. Empty line quits.
fn play(compiled: &processor::CompiledGame) -> anyhow::Result<()> {
    let mut sim = sim::Simulator::new(&compiled.program);
    println!("entries: {}", compiled.touch_entries.join(" "));

    let stdin = io::stdin();
    let mut out = io::stdout();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut label = String::new();
        if stdin.lock().read_line(&mut label)? == 0 {
            return Ok(());
        }
        let label = label.trim();
        if label.is_empty() {
            return Ok(());
        }
        match sim.tip_audible(label) {
            Ok(clips) if clips.is_empty() => println!("(silence)"),
            Ok(clips) => println!("{}", clips.join(" ")),
            Err(e) => println!("error: {e}"),
        }
    }
}
