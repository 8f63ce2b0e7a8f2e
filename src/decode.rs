//! Opcode constants and the `AABCDDDD` field decoder.

use std::convert::TryFrom;
use std::fmt;

use crate::vm::VmError;

// --- Opcodes ---

/// The instructions understood by the LS-8 dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Control
    Hlt = 0b0000_0001, // Halt the machine
    Ldi = 0b1000_0010, // R[a] = b
    Prn = 0b0100_0111, // Print R[a] in decimal

    // ALU
    Mul = 0b1010_0010, // R[a] = R[a] * R[b]
    Cmp = 0b1010_0111, // FL = compare(R[a], R[b])

    // Jumps
    Jmp = 0b0101_0100, // PC = R[a]
    Jeq = 0b0101_0101, // PC = R[a] if E
    Jne = 0b0101_0110, // PC = R[a] if !E
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::Hlt,
        Opcode::Ldi,
        Opcode::Prn,
        Opcode::Mul,
        Opcode::Cmp,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
    ];

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
        }
    }

    /// Position of this opcode in `ALL`.
    pub fn index(self) -> usize {
        match self {
            Opcode::Hlt => 0,
            Opcode::Ldi => 1,
            Opcode::Prn => 2,
            Opcode::Mul => 3,
            Opcode::Cmp => 4,
            Opcode::Jmp => 5,
            Opcode::Jeq => 6,
            Opcode::Jne => 7,
        }
    }

    /// Decoded fields of this opcode's byte.
    pub fn decoded(self) -> Decoded {
        decode(self.byte())
    }
}

impl TryFrom<u8> for Opcode {
    type Error = VmError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.byte() == value)
            .ok_or(VmError::UnknownOpcode(value))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// --- Decoder ---

const OPERAND_COUNT_SHIFT: u8 = 6;
const ALU_BIT: u8 = 0b0010_0000;
const SETS_PC_BIT: u8 = 0b0001_0000;
const IDENTIFIER_MASK: u8 = 0b0000_1111;

/// Fields of an opcode byte laid out as `AABCDDDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// `AA`: number of operand bytes following the opcode (0-2 for valid encodings).
    pub operand_count: u8,
    /// `B`: the instruction is handled by the ALU.
    pub is_alu: bool,
    /// `C`: the instruction may set the PC directly.
    pub sets_pc: bool,
    /// `DDDD`: instruction identifier within its class.
    pub identifier: u8,
    /// Default PC advance when no redirect is applied (`AA + 1`).
    pub increment: usize,
}

impl Decoded {
    /// `(operand count, sets PC, default increment)`.
    pub fn triple(&self) -> (u8, bool, usize) {
        (self.operand_count, self.sets_pc, self.increment)
    }
}

/// Split an opcode byte into its `AABCDDDD` fields. Pure; never fails.
pub fn decode(opcode: u8) -> Decoded {
    let operand_count = opcode >> OPERAND_COUNT_SHIFT;
    Decoded {
        operand_count,
        is_alu: opcode & ALU_BIT != 0,
        sets_pc: opcode & SETS_PC_BIT != 0,
        identifier: opcode & IDENTIFIER_MASK,
        increment: operand_count as usize + 1,
    }
}
