//! Branch table mapping opcode bytes to instruction handlers.

use std::convert::TryFrom;
use std::fmt;
use std::io::Write;

use crate::decode::Opcode;
use crate::registers::{AluOp, RegisterFile};
use crate::vm::VmError;

/// What a handler asks the execution loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fall through to the default PC increment.
    Continue,
    /// Proposed new PC. Applied only for opcodes with the `C` bit set.
    Jump(u8),
    Halt,
}

/// Handlers see only the register file and the output stream; the PC is
/// owned by the loop.
pub type Handler = fn(&mut RegisterFile, &mut dyn Write, u8, u8) -> Result<Outcome, VmError>;

// --- Handlers ---

fn ldi(regs: &mut RegisterFile, _: &mut dyn Write, reg: u8, value: u8) -> Result<Outcome, VmError> {
    regs.write(reg, value)?;
    Ok(Outcome::Continue)
}

fn prn(regs: &mut RegisterFile, out: &mut dyn Write, reg: u8, _: u8) -> Result<Outcome, VmError> {
    let value = regs.read(reg)?;
    writeln!(out, "{}", value).map_err(|e| VmError::Output(e.to_string()))?;
    Ok(Outcome::Continue)
}

fn mul(regs: &mut RegisterFile, _: &mut dyn Write, a: u8, b: u8) -> Result<Outcome, VmError> {
    regs.alu(AluOp::Mul, a, b)?;
    Ok(Outcome::Continue)
}

fn cmp(regs: &mut RegisterFile, _: &mut dyn Write, a: u8, b: u8) -> Result<Outcome, VmError> {
    regs.compare(a, b)?;
    Ok(Outcome::Continue)
}

fn jmp(regs: &mut RegisterFile, _: &mut dyn Write, reg: u8, _: u8) -> Result<Outcome, VmError> {
    Ok(Outcome::Jump(regs.read(reg)?))
}

fn jeq(regs: &mut RegisterFile, _: &mut dyn Write, reg: u8, _: u8) -> Result<Outcome, VmError> {
    if regs.flags().is_equal() {
        Ok(Outcome::Jump(regs.read(reg)?))
    } else {
        Ok(Outcome::Continue)
    }
}

fn jne(regs: &mut RegisterFile, _: &mut dyn Write, reg: u8, _: u8) -> Result<Outcome, VmError> {
    if regs.flags().is_equal() {
        Ok(Outcome::Continue)
    } else {
        Ok(Outcome::Jump(regs.read(reg)?))
    }
}

fn hlt(_: &mut RegisterFile, _: &mut dyn Write, _: u8, _: u8) -> Result<Outcome, VmError> {
    Ok(Outcome::Halt)
}

fn handler_for(op: Opcode) -> Handler {
    match op {
        Opcode::Hlt => hlt,
        Opcode::Ldi => ldi,
        Opcode::Prn => prn,
        Opcode::Mul => mul,
        Opcode::Cmp => cmp,
        Opcode::Jmp => jmp,
        Opcode::Jeq => jeq,
        Opcode::Jne => jne,
    }
}

// --- Table ---

/// Immutable opcode -> handler mapping, built once per machine. Slots follow
/// `Opcode::ALL`; bytes outside it never reach the table.
#[derive(Clone)]
pub struct DispatchTable {
    handlers: [Handler; Opcode::ALL.len()],
}

impl DispatchTable {
    pub fn new() -> Self {
        DispatchTable {
            handlers: Opcode::ALL.map(handler_for),
        }
    }

    /// Handler for `opcode`, or `UnknownOpcode` if the byte is not an instruction.
    #[inline]
    pub fn lookup(&self, opcode: u8) -> Result<Handler, VmError> {
        let op = Opcode::try_from(opcode)?;
        Ok(self.handlers[op.index()])
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(Opcode::ALL.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(op: Opcode, regs: &mut RegisterFile, a: u8, b: u8) -> Result<Outcome, VmError> {
        let table = DispatchTable::new();
        let mut sink = Vec::<u8>::new();
        (table.lookup(op.byte())?)(regs, &mut sink, a, b)
    }

    #[test]
    fn table_rejects_bytes_outside_the_instruction_set() {
        let table = DispatchTable::new();
        for op in Opcode::ALL {
            assert!(table.lookup(op.byte()).is_ok(), "{}", op);
        }
        assert_eq!(table.lookup(0x00).err(), Some(VmError::UnknownOpcode(0x00)));
        assert_eq!(table.lookup(0xA0).err(), Some(VmError::UnknownOpcode(0xA0)));
    }

    #[test]
    fn jne_falls_through_when_equal() {
        let mut regs = RegisterFile::new();
        regs.write(2, 40).unwrap();
        regs.compare(0, 1).unwrap(); // both zero
        assert_eq!(invoke(Opcode::Jne, &mut regs, 2, 0), Ok(Outcome::Continue));
        assert_eq!(invoke(Opcode::Jeq, &mut regs, 2, 0), Ok(Outcome::Jump(40)));
    }

    #[test]
    fn jne_jumps_before_any_compare() {
        let mut regs = RegisterFile::new();
        regs.write(0, 7).unwrap();
        assert_eq!(invoke(Opcode::Jne, &mut regs, 0, 0), Ok(Outcome::Jump(7)));
    }

    #[test]
    fn halt_ignores_operands() {
        let mut regs = RegisterFile::new();
        assert_eq!(invoke(Opcode::Hlt, &mut regs, 0xFF, 0xFF), Ok(Outcome::Halt));
    }
}
