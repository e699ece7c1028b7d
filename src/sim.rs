//! Simulator for the emitted program.
//!
//! Executes blocks the way the device does: one touch event at a time, lines
//! tried top to bottom, a line running only when all its guards hold, and a
//! jump finishing its line (so a trailing play still sounds) before
//! transferring and abandoning the remaining lines. Registers live in an
//! explicit map so tests can assert on game state directly.
//!
//! Used by the property tests and by the CLI `--play` mode.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

use crate::processor::ast::{Action, AluOp, Cmp, Line, Operand, Program};

/// Blocks one touch event may chain through before we call it a runaway.
const STEP_BUDGET: usize = 64;

pub struct Simulator<'a> {
    program: &'a Program,
    regs: BTreeMap<String, u16>,
}

impl<'a> Simulator<'a> {
    /// Registers power up at zero, like the device's.
    pub fn new(program: &'a Program) -> Self {
        Simulator {
            program,
            regs: BTreeMap::new(),
        }
    }

    pub fn reg(&self, name: &str) -> u16 {
        self.regs.get(name).copied().unwrap_or(0)
    }

    /// Run one touch event to completion and return the ordered clip log.
    pub fn tip(&mut self, entry: &str) -> Result<Vec<String>> {
        let mut plays = Vec::new();
        let mut label = entry.to_string();

        for _ in 0..STEP_BUDGET {
            let block = self
                .program
                .get(&label)
                .ok_or_else(|| anyhow!("no block `{label}`"))?;

            let mut next = None;
            'lines: for line in &block.lines {
                if !self.guards_hold(line) {
                    continue;
                }
                for action in &line.actions {
                    match action {
                        Action::Alu { reg, op, value } => self.apply(reg.name(), *op, value)?,
                        Action::Play(clip) => plays.push(clip.clone()),
                        Action::Jump(target) => next = Some(target.as_str().to_string()),
                    }
                }
                if next.is_some() {
                    break 'lines;
                }
            }

            match next {
                Some(target) => label = target,
                None => return Ok(plays),
            }
        }
        Err(anyhow!("touch event did not settle after {STEP_BUDGET} blocks"))
    }

    /// Like `tip`, but with the silent filler clips dropped — what a player
    /// actually hears.
    pub fn tip_audible(&mut self, entry: &str) -> Result<Vec<String>> {
        Ok(self
            .tip(entry)?
            .into_iter()
            .filter(|clip| clip != crate::processor::ast::SILENT_CLIP)
            .collect())
    }

    fn guards_hold(&self, line: &Line) -> bool {
        line.guards.iter().all(|g| {
            let lhs = self.reg(g.reg.name());
            let rhs = self.value(&g.value);
            match g.cmp {
                Cmp::Eq => lhs == rhs,
                Cmp::Ne => lhs != rhs,
                Cmp::Lt => lhs < rhs,
                Cmp::Le => lhs <= rhs,
                Cmp::Gt => lhs > rhs,
                Cmp::Ge => lhs >= rhs,
            }
        })
    }

    fn value(&self, operand: &Operand) -> u16 {
        match operand {
            Operand::Const(v) => *v,
            Operand::Reg(r) => self.reg(r.name()),
        }
    }

    fn apply(&mut self, reg: &str, op: AluOp, value: &Operand) -> Result<()> {
        let rhs = self.value(value);
        let lhs = self.reg(reg);
        let result = match op {
            AluOp::Set => rhs,
            AluOp::Add => lhs.wrapping_add(rhs),
            AluOp::Sub => lhs.wrapping_sub(rhs),
            AluOp::Mul => lhs.wrapping_mul(rhs),
            AluOp::Div => lhs
                .checked_div(rhs)
                .ok_or_else(|| anyhow!("division by zero on ${reg}"))?,
            AluOp::Mod => lhs
                .checked_rem(rhs)
                .ok_or_else(|| anyhow!("modulo by zero on ${reg}"))?,
        };
        self.regs.insert(reg.to_string(), result);
        Ok(())
    }
}
