//! Latency workaround.
//!
//! The device stalls noticeably on a bare trailing jump: a `J(...)` at the
//! end of a line is only fast when a play instruction follows it in the same
//! line. This pass appends a minimal silent clip after every such jump. The
//! emitter leaves pure control-transfer lines bare on purpose and relies on
//! this pass to patch them.
//!
//! Running the pass on an already-patched program changes nothing.

use super::ast::{Action, Program, SILENT_CLIP};

/// Patch every bare trailing jump with the silent filler clip. Returns the
/// number of plays inserted.
pub fn apply(program: &mut Program) -> usize {
    let mut patched = 0;
    for block in program.blocks.values_mut() {
        for line in &mut block.lines {
            if line.ends_in_bare_jump() {
                line.actions.push(Action::Play(SILENT_CLIP.into()));
                patched += 1;
            }
        }
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ast::{Line, Program};

    fn sample() -> Program {
        let mut p = Program::new();
        p.block("start").push(Line::new().jump("reset0"));
        p.block("c1")
            .push(Line::new().set(crate::processor::ast::Reg("first".into()), 1).jump("idle").play("dog"));
        p.block("check").push(Line::new().jump("advance"));
        p
    }

    #[test]
    fn test_bare_jumps_get_silent_play() {
        let mut p = sample();
        let patched = apply(&mut p);
        assert_eq!(patched, 2);
        assert_eq!(
            p.get("start").unwrap().lines[0].to_string(),
            "J(reset0) P(nop)"
        );
        assert_eq!(
            p.get("check").unwrap().lines[0].to_string(),
            "J(advance) P(nop)"
        );
        // A jump already followed by a play is left alone.
        assert_eq!(
            p.get("c1").unwrap().lines[0].to_string(),
            "$first:=1 J(idle) P(dog)"
        );
    }

    #[test]
    fn test_idempotent() {
        let mut p = sample();
        apply(&mut p);
        let once = p.clone();
        let patched_again = apply(&mut p);
        assert_eq!(patched_again, 0);
        assert_eq!(p, once);
    }
}
