//! Self-checks over the fully emitted program.
//!
//! A malformed program can leave the deployed pen stuck, so generation
//! refuses to produce output that fails any of these:
//!
//!   * every jump resolves to an existing block
//!   * every block is reachable from a touch entry point
//!   * the jump graph has no silent cycle — any cycle must pass through a
//!     line that plays a real clip, the block's yield point back to idle
//!   * no line exceeds the device's command or condition budget
//!   * some line actually assigns the finished phase value
//!
//! Failures here are emitter bugs, never user errors.

use std::collections::{HashMap, HashSet};

use crate::error::{GenError, Result};
use crate::processor::fsm::Phase;

use super::ast::{Action, AluOp, Label, Operand, Program, Reg, MAX_LINE_ACTIONS, MAX_LINE_GUARDS};

pub fn check(program: &Program, touch_entries: &[String], phase: &Reg) -> Result<()> {
    check_budgets(program)?;
    check_targets(program)?;
    check_reachability(program, touch_entries)?;
    check_silent_cycles(program)?;
    check_finish_reachable(program, phase)?;
    Ok(())
}

fn check_budgets(program: &Program) -> Result<()> {
    for (label, block) in &program.blocks {
        for line in &block.lines {
            if line.actions.len() > MAX_LINE_ACTIONS {
                return Err(GenError::invariant(format!(
                    "block `{label}` has a line with {} commands (limit {MAX_LINE_ACTIONS}): {line}",
                    line.actions.len()
                )));
            }
            if line.guards.len() > MAX_LINE_GUARDS {
                return Err(GenError::invariant(format!(
                    "block `{label}` has a line with {} conditions (limit {MAX_LINE_GUARDS}): {line}",
                    line.guards.len()
                )));
            }
        }
    }
    Ok(())
}

fn check_targets(program: &Program) -> Result<()> {
    for (label, block) in &program.blocks {
        for line in &block.lines {
            for target in line.jump_targets() {
                if !program.blocks.contains_key(target) {
                    return Err(GenError::invariant(format!(
                        "block `{label}` jumps to unknown label `{target}`"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// BFS over jump edges from the touch entry points; every block must be
/// reachable or it is dead weight the emitter should not have produced.
fn check_reachability(program: &Program, touch_entries: &[String]) -> Result<()> {
    let mut reachable: HashSet<Label> = HashSet::new();
    let mut queue: Vec<Label> = Vec::new();
    for entry in touch_entries {
        let label = Label::new(entry.clone());
        if !program.blocks.contains_key(&label) {
            return Err(GenError::invariant(format!(
                "touch entry `{entry}` has no block"
            )));
        }
        queue.push(label);
    }

    while let Some(label) = queue.pop() {
        if !reachable.insert(label.clone()) {
            continue;
        }
        if let Some(block) = program.blocks.get(&label) {
            for line in &block.lines {
                queue.extend(line.jump_targets().cloned());
            }
        }
    }

    for label in program.blocks.keys() {
        if !reachable.contains(label) {
            return Err(GenError::invariant(format!(
                "block `{label}` is unreachable from any touch entry"
            )));
        }
    }
    Ok(())
}

/// Cycle detection over the subgraph of jump edges whose line plays nothing
/// audible. A cycle there would spin inside one touch event without ever
/// yielding; a cycle broken by a real play is a bounded announcement loop.
fn check_silent_cycles(program: &Program) -> Result<()> {
    let mut silent_edges: HashMap<&Label, Vec<&Label>> = HashMap::new();
    for (label, block) in &program.blocks {
        for line in &block.lines {
            if line.has_audible_play() {
                continue;
            }
            for target in line.jump_targets() {
                silent_edges.entry(label).or_default().push(target);
            }
        }
    }

    // Iterative DFS with colors: 0 unvisited, 1 on stack, 2 done.
    let mut color: HashMap<&Label, u8> = HashMap::new();
    for start in program.blocks.keys() {
        if color.get(start).copied().unwrap_or(0) != 0 {
            continue;
        }
        let mut stack: Vec<(&Label, usize)> = vec![(start, 0)];
        color.insert(start, 1);
        while let Some((node, next_child)) = stack.pop() {
            let children = silent_edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next_child < children.len() {
                stack.push((node, next_child + 1));
                let child = children[next_child];
                match color.get(child).copied().unwrap_or(0) {
                    0 => {
                        color.insert(child, 1);
                        stack.push((child, 0));
                    }
                    1 => {
                        return Err(GenError::invariant(format!(
                            "silent jump cycle through `{node}` -> `{child}`: \
                             a touch event could loop without yielding"
                        )));
                    }
                    _ => {}
                }
            } else {
                color.insert(node, 2);
            }
        }
    }
    Ok(())
}

fn check_finish_reachable(program: &Program, phase: &Reg) -> Result<()> {
    let finished = Phase::Finished.value();
    let assigns = program.blocks.values().any(|block| {
        block.lines.iter().any(|line| {
            line.actions.iter().any(|a| {
                matches!(
                    a,
                    Action::Alu { reg, op: AluOp::Set, value: Operand::Const(v) }
                        if *v == finished && reg == phase
                )
            })
        })
    });
    if assigns {
        Ok(())
    } else {
        Err(GenError::invariant(
            "no line ever assigns the finished phase; the game could not end",
        ))
    }
}
