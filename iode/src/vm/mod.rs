//! The stack virtual machine (spec.md §4.5): call frames, locals
//! addressed by stack base, global table, opcode dispatch, I/O builtins,
//! runtime type conversion.
//!
//! Grounded directly on the original source's `vm::VirtualMachine::run`
//! (`src/vm/vm.cpp`) — frame/stack/globals shape and the opcode switch
//! are carried over unchanged; the departures are the tagged `Value`
//! (see `value.rs`) in place of an all-strings stack, a checked-error
//! division by zero, and `POP` (see `common::opcode`) to consume the
//! generator's `ExprStmt` cleanup.

pub mod value;

use std::{
    collections::HashMap,
    convert::TryFrom,
    io::Write,
};

use tracing::debug;

use crate::common::{chunk::Chunk, error::IodeError, opcode::Opcode, symbol::DataType};
use value::{NumericError, Value};

/// One activation record (spec.md §3 "CallFrame"). `stack_base` is an
/// index into the VM's value stack; parameters occupy
/// `stack_base..stack_base + argc`, locals follow in declaration order.
struct CallFrame {
    ip:         usize,
    stack_base: usize,
}

pub struct VirtualMachine {
    call_stack: Vec<CallFrame>,
    stack:      Vec<Value>,
    globals:    HashMap<String, Value>,
    /// Advisory memory-limit hint (spec.md §4.5); not enforced against
    /// the process's actual memory use, since the VM has no allocator
    /// hooks to measure it by.
    memory_limit: Option<u64>,
    stdout:       Box<dyn Write>,
    stderr:       Box<dyn Write>,
}

impl VirtualMachine {
    pub fn new(memory_limit: Option<u64>) -> VirtualMachine {
        VirtualMachine::with_writers(memory_limit, Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    /// Builds a VM over arbitrary `WRITE_OUT`/`WRITE_ERR`/`FLUSH` sinks —
    /// used by tests to capture a program's output without touching the
    /// process's real standard streams.
    pub fn with_writers(memory_limit: Option<u64>, stdout: Box<dyn Write>, stderr: Box<dyn Write>) -> VirtualMachine {
        VirtualMachine { call_stack: Vec::new(), stack: Vec::new(), globals: HashMap::new(), memory_limit, stdout, stderr }
    }

    /// Executes `chunk` to completion: either a clean halt (the call
    /// stack empties) or a runtime error.
    pub fn run(&mut self, chunk: &Chunk) -> Result<(), IodeError> {
        debug!(code_len = chunk.code.len(), memory_limit = ?self.memory_limit, "vm: starting run");
        self.call_stack.clear();
        self.call_stack.push(CallFrame { ip: 0, stack_base: 0 });
        self.stack.clear();
        self.globals.clear();

        loop {
            let ip = self.call_stack.last().unwrap().ip;
            let Some(&byte) = chunk.code.get(ip) else {
                return Err(IodeError::runtime("instruction pointer ran past the end of the code section"));
            };
            self.call_stack.last_mut().unwrap().ip += 1;

            let opcode = Opcode::try_from(byte).map_err(|b| IodeError::runtime(format!("unknown opcode: {b:#04x}")))?;
            debug!(?opcode, ip, stack_depth = self.stack.len(), "vm: step");

            if self.step(chunk, opcode)? {
                return Ok(());
            }
        }
    }

    /// Runs one instruction. Returns `Ok(true)` when the program has
    /// halted cleanly (the call stack emptied on `RETURN`).
    fn step(&mut self, chunk: &Chunk, opcode: Opcode) -> Result<bool, IodeError> {
        match opcode {
            Opcode::Return => {
                let value = self.pop()?;
                self.call_stack.pop();
                let Some(caller) = self.call_stack.last() else {
                    return Ok(true);
                };
                self.stack.truncate(caller.stack_base);
                self.push(value);
                Ok(false)
            },
            Opcode::Call => {
                let argc = self.read_byte(chunk)? as usize;
                let address = self.read_u16(chunk)?;
                if self.stack.len() < argc {
                    return Err(IodeError::runtime("stack underflow: not enough arguments for call"));
                }
                let stack_base = self.stack.len() - argc;
                self.call_stack.push(CallFrame { ip: address as usize, stack_base });
                Ok(false)
            },
            Opcode::Const => {
                let index = self.read_byte(chunk)?;
                let text = self.constant(chunk, index)?;
                self.push(Value::from_text(text));
                Ok(false)
            },
            Opcode::Pop => {
                self.pop()?;
                Ok(false)
            },
            Opcode::WriteOut => {
                let value = self.pop()?;
                write!(self.stdout, "{}", value.to_text()).map_err(IodeError::Io)?;
                Ok(false)
            },
            Opcode::WriteErr => {
                let value = self.pop()?;
                write!(self.stderr, "{}", value.to_text()).map_err(IodeError::Io)?;
                Ok(false)
            },
            Opcode::Flush => {
                self.stdout.flush().map_err(IodeError::Io)?;
                self.stderr.flush().map_err(IodeError::Io)?;
                Ok(false)
            },
            Opcode::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                let result = value::add(&a, &b).map_err(|e| Self::numeric_error(e, &a, &b))?;
                self.push(result);
                Ok(false)
            },
            Opcode::Subtract => self.binary_numeric(i64::checked_sub, |x, y| x - y),
            Opcode::Multiply => self.binary_numeric(i64::checked_mul, |x, y| x * y),
            Opcode::Divide => {
                let b = self.pop()?;
                let a = self.pop()?;
                if !a.is_numeric() || !b.is_numeric() {
                    return Err(IodeError::runtime(format!(
                        "unsupported operands for DIVIDE: {} and {}",
                        a.type_tag(),
                        b.type_tag()
                    )));
                }
                if matches!(&b, Value::Int(0)) || matches!(&b, Value::Double(d) if *d == 0.0) {
                    return Err(IodeError::runtime("division by zero"));
                }
                let result = value::numeric_op(&a, &b, i64::checked_div, |x, y| x / y).map_err(|e| Self::numeric_error(e, &a, &b))?;
                self.push(result);
                Ok(false)
            },
            Opcode::DefineGlobal => {
                let index = self.read_byte(chunk)?;
                let name = self.constant(chunk, index)?.to_string();
                let value = self.pop()?;
                self.globals.insert(name, value);
                Ok(false)
            },
            Opcode::GetGlobal => {
                let index = self.read_byte(chunk)?;
                let name = self.constant(chunk, index)?;
                let value = self
                    .globals
                    .get(name)
                    .cloned()
                    .ok_or_else(|| IodeError::runtime(format!("undefined global '{name}'")))?;
                self.push(value);
                Ok(false)
            },
            Opcode::SetGlobal => {
                let index = self.read_byte(chunk)?;
                let name = self.constant(chunk, index)?.to_string();
                let value = self.peek()?.clone();
                self.globals.insert(name, value);
                Ok(false)
            },
            Opcode::GetLocal => {
                let slot = self.read_byte(chunk)? as usize;
                let base = self.call_stack.last().unwrap().stack_base;
                let value = self
                    .stack
                    .get(base + slot)
                    .cloned()
                    .ok_or_else(|| IodeError::runtime("stack underflow: local slot out of range"))?;
                self.push(value);
                Ok(false)
            },
            Opcode::SetLocal => {
                let slot = self.read_byte(chunk)? as usize;
                let base = self.call_stack.last().unwrap().stack_base;
                let value = self.peek()?.clone();
                let index = base + slot;
                if index >= self.stack.len() {
                    return Err(IodeError::runtime("stack underflow: local slot out of range"));
                }
                self.stack[index] = value;
                Ok(false)
            },
            Opcode::Convert => {
                let target = self.read_byte(chunk)?;
                let target =
                    DataType::try_from(target).map_err(|b| IodeError::runtime(format!("unknown conversion target tag: {b}")))?;
                let value = self.pop()?;
                self.push(self.convert(value, target)?);
                Ok(false)
            },
        }
    }

    fn convert(&self, value: Value, target: DataType) -> Result<Value, IodeError> {
        match target {
            DataType::String => Ok(Value::Str(value.to_text().into())),
            DataType::Int => {
                let text = value.to_text();
                let parsed: f64 = text
                    .parse()
                    .map_err(|_| IodeError::runtime(format!("cannot convert '{text}' to the requested numeric type")))?;
                Ok(Value::Int(parsed as i64))
            },
            DataType::Double => {
                let text = value.to_text();
                let parsed: f64 = text
                    .parse()
                    .map_err(|_| IodeError::runtime(format!("cannot convert '{text}' to the requested numeric type")))?;
                Ok(Value::Double(parsed))
            },
            other => Err(IodeError::runtime(format!("unsupported conversion target: {other}"))),
        }
    }

    fn binary_numeric(
        &mut self,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<bool, IodeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = value::numeric_op(&a, &b, int_op, float_op).map_err(|e| Self::numeric_error(e, &a, &b))?;
        self.push(result);
        Ok(false)
    }

    /// Turns a `NumericError` into the runtime error message for the
    /// operand pair that produced it — `Overflow` only ever happens once
    /// both operands are already known to be numeric, so it gets its own
    /// message distinct from "wrong type."
    fn numeric_error(error: NumericError, a: &Value, b: &Value) -> IodeError {
        match error {
            NumericError::NotNumeric => {
                IodeError::runtime(format!("unsupported operands of type '{}' and '{}'", a.type_tag(), b.type_tag()))
            },
            NumericError::Overflow => IodeError::runtime("integer overflow"),
        }
    }

    fn constant<'c>(&self, chunk: &'c Chunk, index: u8) -> Result<&'c str, IodeError> {
        chunk
            .constants
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| IodeError::runtime(format!("constant index {index} out of range")))
    }

    fn read_byte(&mut self, chunk: &Chunk) -> Result<u8, IodeError> {
        let frame = self.call_stack.last_mut().unwrap();
        let byte = *chunk
            .code
            .get(frame.ip)
            .ok_or_else(|| IodeError::runtime("instruction pointer ran past the end of the code section"))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self, chunk: &Chunk) -> Result<u16, IodeError> {
        let hi = self.read_byte(chunk)?;
        let lo = self.read_byte(chunk)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn push(&mut self, value: Value) { self.stack.push(value) }

    fn pop(&mut self) -> Result<Value, IodeError> {
        self.stack.pop().ok_or_else(|| IodeError::runtime("stack underflow"))
    }

    fn peek(&self) -> Result<&Value, IodeError> {
        self.stack.last().ok_or_else(|| IodeError::runtime("stack underflow"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyzer::analyze, generator, lexer::lex, parser::parse};
    use std::path::Path;

    fn run_src(source: &str) -> Chunk {
        let stmts = parse(lex(source).unwrap()).unwrap();
        let analysis = analyze(&stmts, Path::new(".")).unwrap();
        generator::compile(&stmts, analysis.imports, false).unwrap()
    }

    #[test]
    fn stack_underflow_on_empty_pop() {
        let mut vm = VirtualMachine::new(None);
        let chunk = Chunk { code: vec![Opcode::Return.to_byte()], ..Chunk::empty() };
        assert!(vm.run(&chunk).is_err());
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let chunk = run_src("val x: Int = 1 / 0\nwriteOut(x)");
        let mut vm = VirtualMachine::new(None);
        assert!(vm.run(&chunk).is_err());
    }

    #[test]
    fn unknown_opcode_is_a_runtime_error() {
        let mut vm = VirtualMachine::new(None);
        let chunk = Chunk { code: vec![0xEE], ..Chunk::empty() };
        assert!(vm.run(&chunk).is_err());
    }

    #[test]
    fn integer_overflow_is_a_runtime_error_not_a_wraparound() {
        let chunk = run_src(&format!("val x: Int = {} + 1\nwriteOut(x)", i64::MAX));
        let mut vm = VirtualMachine::new(None);
        assert!(vm.run(&chunk).is_err());
    }
}
