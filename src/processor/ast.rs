//! Instruction-set IR for the target device, *after* FSM lowering.
//!
//! The device runs one script block per touch event: a block is an ordered
//! list of lines, a line is a guard chain plus actions. All guards must hold
//! for the line to run, otherwise control falls through to the next line —
//! a flat conditional-jump chain, not a tree. A `Jump` finishes its line
//! (so a trailing `PlayAudio` still sounds, which is also the device's
//! latency workaround) and then transfers to the target block, abandoning
//! the remaining lines.
//
//  Rendered syntax, one line:
//
//      $phase==1? $first:=3 $last:=3 J(idle) P(duck)
//
//  Guards end in '?', register ops are $r:=n / $r+=n / ..., P() plays a
//  clip, J() jumps to another block's label.

use std::fmt;

use indexmap::IndexMap;

/// Name of the minimal silent clip inserted by the latency pass.
pub const SILENT_CLIP: &str = "nop";

/// Device limit: commands per line.
pub const MAX_LINE_ACTIONS: usize = 8;
/// Device limit: conditions per line.
pub const MAX_LINE_GUARDS: usize = 8;

/// Entry-point name of a script block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named persistent integer cell on the device. Only the register
/// allocator constructs these, which keeps naming deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reg(pub(crate) String);

impl Reg {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cmp::Eq => "==",
            Cmp::Ne => "!=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Const(u16),
    Reg(Reg),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(v) => write!(f, "{v}"),
            Operand::Reg(r) => write!(f, "{r}"),
        }
    }
}

/// One condition of a line's guard chain. Semantically a conditional jump to
/// the next line when the comparison fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub reg: Reg,
    pub cmp: Cmp,
    pub value: Operand,
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}?", self.reg, self.cmp, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AluOp::Set => ":=",
            AluOp::Add => "+=",
            AluOp::Sub => "-=",
            AluOp::Mul => "*=",
            AluOp::Div => "/=",
            AluOp::Mod => "%=",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// RegisterOp: `$r:=n`, `$r+=n`, ...
    Alu { reg: Reg, op: AluOp, value: Operand },
    /// PlayAudio: `P(clip)`. Playback is fire-and-continue; a trailing play
    /// is also the block's yield point back to idle.
    Play(String),
    /// Jump: `J(label)`. Ends the line, then transfers.
    Jump(Label),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Alu { reg, op, value } => write!(f, "{reg}{op}{value}"),
            Action::Play(clip) => write!(f, "P({clip})"),
            Action::Jump(label) => write!(f, "J({label})"),
        }
    }
}

/// Guard chain plus actions; the unit the device dispatches on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub guards: Vec<Guard>,
    pub actions: Vec<Action>,
}

impl Line {
    pub fn new() -> Self {
        Line::default()
    }

    pub fn guard(mut self, reg: Reg, cmp: Cmp, value: Operand) -> Self {
        self.guards.push(Guard { reg, cmp, value });
        self
    }

    pub fn alu(mut self, reg: Reg, op: AluOp, value: Operand) -> Self {
        self.actions.push(Action::Alu { reg, op, value });
        self
    }

    pub fn set(self, reg: Reg, value: u16) -> Self {
        self.alu(reg, AluOp::Set, Operand::Const(value))
    }

    pub fn add(self, reg: Reg, value: u16) -> Self {
        self.alu(reg, AluOp::Add, Operand::Const(value))
    }

    pub fn play(mut self, clip: impl Into<String>) -> Self {
        self.actions.push(Action::Play(clip.into()));
        self
    }

    pub fn jump(mut self, label: impl Into<String>) -> Self {
        self.actions.push(Action::Jump(Label::new(label)));
        self
    }

    /// True when the line's last action is a jump with no play after it —
    /// the shape the latency pass must patch.
    pub fn ends_in_bare_jump(&self) -> bool {
        matches!(self.actions.last(), Some(Action::Jump(_)))
    }

    /// Plays any clip other than the silent filler.
    pub fn has_audible_play(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, Action::Play(clip) if clip != SILENT_CLIP))
    }

    pub fn jump_targets(&self) -> impl Iterator<Item = &Label> {
        self.actions.iter().filter_map(|a| match a {
            Action::Jump(label) => Some(label),
            _ => None,
        })
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for g in &self.guards {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{g}")?;
            first = false;
        }
        for a in &self.actions {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{a}")?;
            first = false;
        }
        Ok(())
    }
}

/// One script block; empty blocks are valid (the idle block is one).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub lines: Vec<Line>,
}

impl Block {
    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }
}

/// The whole program: a flat graph of labeled blocks. Insertion order is the
/// serialization order, so it must be a fixed function of the game model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub blocks: IndexMap<Label, Block>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn block(&mut self, label: impl Into<String>) -> &mut Block {
        self.blocks.entry(Label::new(label)).or_default()
    }

    pub fn get(&self, label: &str) -> Option<&Block> {
        self.blocks.get(&Label::new(label))
    }

    /// Render every block into device-syntax lines, keyed by entry label.
    pub fn render(&self) -> IndexMap<String, Vec<String>> {
        self.blocks
            .iter()
            .map(|(label, block)| {
                let lines = block.lines.iter().map(Line::to_string).collect();
                (label.0.clone(), lines)
            })
            .collect()
    }
}
