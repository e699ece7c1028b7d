//! The compiler core: FSM design, register allocation, lowering, the
//! latency peephole and the final self-checks, run as one pipeline.

pub mod ast;
pub mod emit;
pub mod fsm;
pub mod latency;
pub mod regalloc;
pub mod verify;

use indexmap::IndexMap;

use crate::error::Result;
use crate::model::GameModel;

/// Everything the writer needs to assemble the output document.
#[derive(Debug)]
pub struct CompiledGame {
    pub program: ast::Program,
    /// Document `init` field: all registers at reset values.
    pub init: String,
    /// Default touch code per entry label.
    pub codes: IndexMap<String, u16>,
    /// Entry labels backed by physical touch codes.
    pub touch_entries: Vec<String>,
}

/// Run every pass. No output escapes when any pass fails.
pub fn run(model: &GameModel) -> Result<CompiledGame> {
    let machine = fsm::design(model);
    let regs = regalloc::allocate(model)?;

    let mut program = emit::emit(model, &machine, &regs);
    let patched = latency::apply(&mut program);
    log::debug!("latency pass inserted {patched} silent plays");

    let touch_entries = emit::touch_entries(model);
    verify::check(&program, &touch_entries, &regs.phase)?;

    let codes = emit::entry_codes(model, &program);
    log::info!(
        "compiled {} blocks, {} registers, {} entry codes",
        program.blocks.len(),
        regs.count(),
        codes.len()
    );

    Ok(CompiledGame {
        program,
        init: emit::init_string(&regs),
        codes,
        touch_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetCatalog, GameModel};
    use crate::parser::GameConfig;

    fn compile(pairs: &[&str], players: i64) -> CompiledGame {
        let cfg = GameConfig {
            pairs: pairs.iter().map(|s| s.to_string()).collect(),
            alternative_sounds: false,
            max_players: players,
            title: "Memory".into(),
            img_width: 190.0,
            img_height: 270.0,
            pixel_size: 2.0,
            dpi: 1200,
            output_file: "out.json".into(),
            output_image: "out.png".into(),
            language: "en".into(),
            welcome: "en_welcome".into(),
            media_path: "media/%s".into(),
        };
        let catalog = AssetCatalog::fixed(pairs.iter().map(|s| s.to_string()));
        let model = GameModel::build(&cfg, &catalog, None).unwrap();
        run(&model).unwrap()
    }

    #[test]
    fn test_full_pipeline_is_deterministic() {
        let a = compile(&["dog", "cat", "duck"], 4);
        let b = compile(&["dog", "cat", "duck"], 4);
        assert_eq!(a.program, b.program);
        assert_eq!(a.init, b.init);
        assert_eq!(a.codes, b.codes);
    }

    #[test]
    fn test_no_bare_jumps_survive() {
        let compiled = compile(&["dog", "cat"], 2);
        for (label, block) in &compiled.program.blocks {
            for line in &block.lines {
                assert!(
                    !line.ends_in_bare_jump(),
                    "bare jump left in `{label}`: {line}"
                );
            }
        }
    }
}
