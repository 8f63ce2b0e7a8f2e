//! Register file and the FL status register.

use std::cmp::Ordering;
use std::fmt;

use crate::vm::{Space, VmError};

pub const REGISTER_COUNT: usize = 9; // R0-R7 plus one reserved slot
pub const GENERAL_PURPOSE_REGISTERS: usize = 8;

// --- Flags ---

/// Outcome of the most recent `CMP`. At most one of E/L/G can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flags {
    #[default]
    None,
    Equal,
    Less,
    Greater,
}

impl Flags {
    pub const EQUAL_BIT: u8 = 0b0000_0001;
    pub const GREATER_BIT: u8 = 0b0000_0010;
    pub const LESS_BIT: u8 = 0b0000_0100;

    /// FL as the architectural `00000LGE` byte.
    pub fn bits(self) -> u8 {
        match self {
            Flags::None => 0,
            Flags::Equal => Self::EQUAL_BIT,
            Flags::Greater => Self::GREATER_BIT,
            Flags::Less => Self::LESS_BIT,
        }
    }

    pub fn is_equal(self) -> bool {
        self == Flags::Equal
    }

    fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Equal => Flags::Equal,
            Ordering::Less => Flags::Less,
            Ordering::Greater => Flags::Greater,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.bits())
    }
}

// --- ALU ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
}

// --- Register File ---

/// General-purpose registers plus FL. Values are bytes; arithmetic wraps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterFile {
    regs: [u8; REGISTER_COUNT],
    flags: Flags,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn check(index: u8) -> Result<usize, VmError> {
        let index = index as usize;
        if index < REGISTER_COUNT {
            Ok(index)
        } else {
            Err(VmError::OutOfRange {
                space: Space::Register,
                index,
            })
        }
    }

    pub fn read(&self, index: u8) -> Result<u8, VmError> {
        Ok(self.regs[Self::check(index)?])
    }

    pub fn write(&mut self, index: u8, value: u8) -> Result<(), VmError> {
        self.regs[Self::check(index)?] = value;
        Ok(())
    }

    /// Sets FL to exactly one of Equal/Less/Greater for `R[a]` against `R[b]`.
    pub fn compare(&mut self, a: u8, b: u8) -> Result<(), VmError> {
        let lhs = self.read(a)?;
        let rhs = self.read(b)?;
        self.flags = Flags::from_ordering(lhs.cmp(&rhs));
        Ok(())
    }

    /// `R[a] = R[a] <op> R[b]`, modulo 256.
    pub fn alu(&mut self, op: AluOp, a: u8, b: u8) -> Result<(), VmError> {
        let lhs = self.read(a)?;
        let rhs = self.read(b)?;
        let result = match op {
            AluOp::Add => lhs.wrapping_add(rhs),
            AluOp::Sub => lhs.wrapping_sub(rhs),
            AluOp::Mul => lhs.wrapping_mul(rhs),
        };
        self.write(a, result)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The eight general-purpose registers, R0 first.
    pub fn general_purpose(&self) -> &[u8] {
        &self.regs[..GENERAL_PURPOSE_REGISTERS]
    }
}
