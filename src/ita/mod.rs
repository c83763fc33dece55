//! ITA: the quadruple intermediate representation.
//!
//! A flat sequence of `(Op, s1, s2, s3)` quadruples, target-independent,
//! produced by walking hoisted function and vector definitions once.

mod builder;

pub use builder::ItaBuilder;

use std::fmt;

/// The closed opcode set a quadruple's first field can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    FuncStart,
    FuncEnd,
    Label,
    Goto,
    Locl,
    Globl,
    If,
    JmpE,
    Push,
    Pop,
    Call,
    Cmp,
    Mov,
    Return,
    Leave,
    Noop,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Instruction::FuncStart => "BeginFunc",
            Instruction::FuncEnd => "EndFunc",
            Instruction::Label => "",
            Instruction::Goto => "GOTO",
            Instruction::Locl => "LOCL",
            Instruction::Globl => "GLOBL",
            Instruction::If => "IF",
            Instruction::JmpE => "JMP_E",
            Instruction::Push => "PUSH",
            Instruction::Pop => "POP",
            Instruction::Call => "CALL",
            Instruction::Cmp => "CMP",
            Instruction::Mov => "=",
            Instruction::Return => "RET",
            Instruction::Leave => "LEAVE",
            Instruction::Noop => "",
        };
        write!(f, "{}", s)
    }
}

/// One `(Op, s1, s2, s3)` instruction. Unused operand slots are empty
/// strings rather than `Option`, matching the textual quadruple form used
/// for listings and golden-file comparisons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quadruple {
    pub op: Instruction,
    pub s1: String,
    pub s2: String,
    pub s3: String,
}

impl Quadruple {
    pub fn new(op: Instruction, s1: impl Into<String>, s2: impl Into<String>, s3: impl Into<String>) -> Self {
        Self {
            op,
            s1: s1.into(),
            s2: s2.into(),
            s3: s3.into(),
        }
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.op, self.s1, self.s2, self.s3)
    }
}

pub type Instructions = Vec<Quadruple>;

/// Build a quadruple from an opcode and up to three operands.
pub fn make_quadruple(op: Instruction, s1: impl Into<String>, s2: impl Into<String>, s3: impl Into<String>) -> Quadruple {
    Quadruple::new(op, s1, s2, s3)
}

/// Name a fresh compiler temporary. Temporaries are numbered from zero and
/// reset at the start of each function.
pub fn make_temporary(counter: u32) -> String {
    format!("_t{}", counter)
}

/// Statement kinds that open a nested branch scope and therefore push a
/// label onto the branch stack.
pub const BRANCH_STATEMENTS: [&str; 3] = ["if", "while", "case"];

/// Tracks nested branch (if/while/case) label state during IR construction.
/// Every function reserves `_L1` for its single consolidated epilogue;
/// nested branches push further labels on top of that root.
#[derive(Clone, Debug, Default)]
pub struct Branch {
    stack: Vec<String>,
    root_branch: Option<String>,
    block_level: u32,
    level: u32,
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_root_branch(&mut self, label: impl Into<String>) {
        self.root_branch = Some(label.into());
    }

    pub fn root_branch(&self) -> Option<&str> {
        self.root_branch.as_deref()
    }

    pub fn push(&mut self, label: impl Into<String>) {
        self.stack.push(label.into());
        self.level += 1;
    }

    pub fn pop(&mut self) -> Option<String> {
        self.level = self.level.saturating_sub(1);
        self.stack.pop()
    }

    pub fn last(&self) -> Option<&str> {
        self.stack.last().map(|s| s.as_str())
    }

    pub fn increment_branch_level(&mut self) {
        self.block_level += 1;
    }

    pub fn decrement_branch_level(&mut self) {
        self.block_level = self.block_level.saturating_sub(1);
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn block_level(&self) -> u32 {
        self.block_level
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
