// tests/integration_test.rs

use std::process::Command;

use ls8_vm::loader::parse_program;
use ls8_vm::vm::{Machine, MachineConfig, VmError};

// Returns Ok(stdout) or the runtime error.
type RunResult = Result<String, VmError>;

/// Runs program text through the full pipeline (loader -> machine).
fn run_ls8_source(source: &str, config: MachineConfig) -> RunResult {
    let image = parse_program(source).expect("program parses");
    let mut vm = Machine::with_config(Vec::new(), config);
    vm.load(&image);
    vm.run()?;
    Ok(String::from_utf8(vm.into_output()).expect("PRN output is ascii"))
}

fn run_default(source: &str) -> RunResult {
    run_ls8_source(source, MachineConfig::default())
}

const PRINT8: &str = include_str!("../programs/print8.ls8");
const MULT: &str = include_str!("../programs/mult.ls8");
const CMPJUMP: &str = include_str!("../programs/cmpjump.ls8");
const DOUBLING: &str = include_str!("../programs/doubling.ls8");

// --- Library pipeline ---

#[test]
fn test_print8() {
    assert_eq!(run_default(PRINT8), Ok("8\n".to_string()));
}

#[test]
fn test_mult() {
    assert_eq!(run_default(MULT), Ok("27\n".to_string()));
}

#[test]
fn test_cmp_then_jeq_reaches_print() {
    assert_eq!(run_default(CMPJUMP), Ok("5\n".to_string()));
}

#[test]
fn test_doubling_with_and_without_revisit_guard() {
    assert_eq!(run_default(DOUBLING), Ok("1\n2\n".to_string()));
    let relaxed = MachineConfig::default().with_revisit_guard(false);
    assert_eq!(run_ls8_source(DOUBLING, relaxed), Ok("1\n2\n4\n".to_string()));
}

#[test]
fn test_unrecognised_first_byte() {
    let source = "11111111\n00000000\n00000000\n00000001\n";
    assert_eq!(run_default(source), Err(VmError::UnknownOpcode(0b1111_1111)));
}

#[test]
fn test_add_byte_is_not_an_instruction() {
    // ADD R0,R1 then HLT: the ALU can add, but 0xA0 is not dispatched.
    let source = "10100000\n00000000\n00000001\n00000001\n";
    assert_eq!(run_default(source), Err(VmError::UnknownOpcode(0xA0)));
}

#[test]
fn test_loading_twice_is_deterministic() {
    let image = parse_program(MULT).unwrap();
    let mut vm = Machine::new(Vec::<u8>::new());

    vm.load(&image);
    vm.run().unwrap();
    let first = std::mem::take(vm.output_mut());

    vm.load(&image);
    vm.run().unwrap();
    let second = std::mem::take(vm.output_mut());

    assert_eq!(first, b"27\n");
    assert_eq!(first, second);
}

// --- Binary ---

fn ls8() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ls8"))
}

#[test]
fn test_cli_runs_program() {
    let out = ls8()
        .arg(concat!(env!("CARGO_MANIFEST_DIR"), "/programs/mult.ls8"))
        .output()
        .expect("spawn ls8");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "27\n");
}

#[test]
fn test_cli_allow_revisits() {
    let out = ls8()
        .arg("--allow-revisits")
        .arg(concat!(env!("CARGO_MANIFEST_DIR"), "/programs/doubling.ls8"))
        .output()
        .expect("spawn ls8");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "1\n2\n4\n");
}

#[test]
fn test_cli_trace_logs_each_step() {
    let out = ls8()
        .env_remove("RUST_LOG")
        .arg("--trace")
        .arg(concat!(env!("CARGO_MANIFEST_DIR"), "/programs/print8.ls8"))
        .output()
        .expect("spawn ls8");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "8\n");

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("TRACE: 00 | 82 00 08"), "{}", stderr);
    assert!(stderr.contains("TRACE: 03"), "{}", stderr);
}

#[test]
fn test_cli_missing_program_argument() {
    let out = ls8().output().expect("spawn ls8");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("PROGRAM"));
}

#[test]
fn test_cli_reports_malformed_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.ls8");
    std::fs::write(&path, "10000010\nnot-binary\n").unwrap();
    let out = ls8().arg(&path).output().expect("spawn ls8");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("line 2"));
}
