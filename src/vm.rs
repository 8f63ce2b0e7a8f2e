// src/vm.rs

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::decode::decode;
use crate::dispatch::{DispatchTable, Outcome};
use crate::loader::MemoryImage;
use crate::registers::{Flags, RegisterFile};

// --- Types and Constants ---

pub const MEMORY_SIZE: usize = 256; // Addressable RAM, 0x00..=0xFF.
pub const SP_INIT: u8 = 0xF4; // Conventional LS-8 top of stack. Nothing moves it yet.

// --- Errors ---

/// Which address space an out-of-range index was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Register,
    Memory,
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Space::Register => f.write_str("register"),
            Space::Memory => f.write_str("memory address"),
        }
    }
}

/// Fatal conditions raised while executing a program. None are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// A decoded operand or the operand fetch itself left its address space.
    #[error("{space} {index} out of range")]
    OutOfRange { space: Space, index: usize },
    /// The byte at PC has no entry in the dispatch table.
    #[error("unknown opcode {0:#010b} ({0:#04x})")]
    UnknownOpcode(u8),
    /// `MachineConfig::step_limit` was reached before a halt.
    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
    /// Writing PRN output failed.
    #[error("failed to write program output: {0}")]
    Output(String),
}

// --- Configuration ---

/// Execution options. The defaults reproduce the reference machine exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Halt when execution returns to a PC that has already been the origin of
    /// a taken jump.
    pub revisit_guard: bool,
    /// Fail with `StepLimitExceeded` after this many executed instructions.
    pub step_limit: Option<u64>,
    /// Emit `trace_line()` at info level before every step.
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            revisit_guard: true,
            step_limit: None,
            trace: false,
        }
    }
}

impl MachineConfig {
    pub fn with_revisit_guard(mut self, enabled: bool) -> Self {
        self.revisit_guard = enabled;
        self
    }

    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

// --- Virtual Machine ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

/// The LS-8 machine. PRN output goes to `W`.
#[derive(Debug)]
pub struct Machine<W: Write> {
    pc: usize,                       // Index of the next opcode in `ram`.
    sp: u8,                          // Stack pointer. Inert: no stack instructions.
    registers: RegisterFile,         // R0-R7, reserved slot, FL.
    ram: [u8; MEMORY_SIZE],
    dispatch: DispatchTable,         // Built once in `new`, never mutated.
    jump_origins: BTreeSet<usize>,   // PCs of every taken jump so far.
    state: State,
    steps: u64,
    config: MachineConfig,
    output: W,
}

impl<W: Write> Machine<W> {
    pub fn new(output: W) -> Self {
        Self::with_config(output, MachineConfig::default())
    }

    pub fn with_config(output: W, config: MachineConfig) -> Self {
        Machine {
            pc: 0,
            sp: SP_INIT,
            registers: RegisterFile::new(),
            ram: [0; MEMORY_SIZE],
            dispatch: DispatchTable::new(),
            jump_origins: BTreeSet::new(),
            state: State::Running,
            steps: 0,
            config,
            output,
        }
    }

    /// Resets every piece of machine state and installs `image` at address 0.
    pub fn load(&mut self, image: &MemoryImage) {
        self.ram = *image.bytes();
        self.pc = 0;
        self.sp = SP_INIT;
        self.registers = RegisterFile::new();
        self.jump_origins.clear();
        self.state = State::Running;
        self.steps = 0;
        debug!(bytes = image.program_len(), "program loaded");
    }

    // --- Memory ---

    pub fn ram_read(&self, address: usize) -> Result<u8, VmError> {
        self.ram.get(address).copied().ok_or(VmError::OutOfRange {
            space: Space::Memory,
            index: address,
        })
    }

    pub fn ram_write(&mut self, address: usize, value: u8) -> Result<(), VmError> {
        match self.ram.get_mut(address) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(VmError::OutOfRange {
                space: Space::Memory,
                index: address,
            }),
        }
    }

    // --- Execution Loop ---

    /// Runs until HLT, the revisit guard, or a fatal error. A halted machine
    /// stays halted until the next `load`.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.step()? == State::Running {}
        Ok(())
    }

    /// Executes one fetch-decode-execute cycle.
    pub fn step(&mut self) -> Result<State, VmError> {
        if self.state == State::Halted {
            return Ok(State::Halted);
        }
        if let Some(limit) = self.config.step_limit {
            if self.steps >= limit {
                return Err(VmError::StepLimitExceeded(limit));
            }
        }
        if self.config.trace {
            info!("{}", self.trace_line());
        }

        let pc = self.pc;
        // Both operand slots are always fetched, whatever the opcode declares.
        let opcode = self.ram_read(pc)?;
        let operand_a = self.ram_read(pc + 1)?;
        let operand_b = self.ram_read(pc + 2)?;

        let handler = self.dispatch.lookup(opcode)?;
        trace!(pc, opcode, operand_a, operand_b, "dispatch");
        let outcome = handler(&mut self.registers, &mut self.output, operand_a, operand_b)?;
        self.steps += 1;

        if outcome == Outcome::Halt {
            debug!(pc, steps = self.steps, "halted");
            return Ok(self.halt());
        }
        if self.config.revisit_guard && self.jump_origins.contains(&pc) {
            warn!(pc, "revisited a jump origin, stopping");
            return Ok(self.halt());
        }

        let decoded = decode(opcode);
        match outcome {
            Outcome::Jump(target) if decoded.sets_pc => {
                self.jump_origins.insert(pc);
                self.pc = target as usize;
            }
            _ => self.pc += decoded.increment,
        }
        Ok(State::Running)
    }

    fn halt(&mut self) -> State {
        self.state = State::Halted;
        self.state
    }

    // --- Inspection ---

    /// `TRACE: PC | M[PC] M[PC+1] M[PC+2] | R0 .. R7`, all hex.
    pub fn trace_line(&self) -> String {
        let peek = |offset: usize| self.ram.get(self.pc + offset).copied().unwrap_or(0);
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            peek(0),
            peek(1),
            peek(2)
        );
        for value in self.registers.general_purpose() {
            line.push_str(&format!(" {:02X}", value));
        }
        line
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn flags(&self) -> Flags {
        self.registers.flags()
    }

    pub fn jump_origins(&self) -> &BTreeSet<usize> {
        &self.jump_origins
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
