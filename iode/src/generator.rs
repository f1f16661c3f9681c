//! The bytecode generator (spec.md §4.4): chunk assembly, constant
//! interning, local-slot allocation, forward-call fixups, and the
//! function entry-point table.
//!
//! Grounded directly on the original source's `compiler::codegen::
//! BytecodeCompiler` (`src/compiler/codegen.cpp`) — the locals-stack /
//! scope-depth / fixup-map shape is carried over unchanged; this
//! reimplementation's one behavioral departure is `ExprStmt`, which emits
//! an explicit `POP` after any expression that leaves a value on the
//! stack, resolving spec.md §9's open question about statement sequences
//! unbalancing the stack.
//!
//! Top-level non-function statements are emitted before any function body
//! (see `Generator::compile_program`), so `ip = 0` — where the VM always
//! begins (spec.md §4.5) — always lands on the program's own code, never
//! inside a function that happened to be declared early in the source.

use std::collections::HashMap;

use crate::common::{
    ast::{Expr, Literal, Stmt},
    chunk::Chunk,
    error::IodeError,
    opcode::Opcode,
    symbol::DataType,
    token::Token,
};

const PLACEHOLDER_ADDRESS: u16 = 0xFFFF;

pub struct Generator {
    chunk:                Chunk,
    function_ips:         HashMap<String, usize>,
    call_fixups:          HashMap<String, Vec<usize>>,
    locals:               Vec<(String, usize)>,
    scope_depth:          usize,
    obfuscate:            bool,
    obfuscation_map:      HashMap<String, String>,
    obfuscation_counter:  usize,
}

/// Compiles a fully-analyzed program into a `Chunk`. `imports` comes from
/// the analyzer's ordered import list (spec.md §3 "Chunk"); `obfuscate`
/// enables the deterministic identifier-renaming pass (spec.md §4.4).
pub fn compile(statements: &[Stmt], imports: Vec<String>, obfuscate: bool) -> Result<Chunk, IodeError> {
    let mut generator = Generator {
        chunk:               Chunk { imports, ..Chunk::empty() },
        function_ips:        HashMap::new(),
        call_fixups:         HashMap::new(),
        locals:              Vec::new(),
        scope_depth:         0,
        obfuscate,
        obfuscation_map:     HashMap::new(),
        obfuscation_counter: 0,
    };
    generator.compile_program(statements)
}

impl Generator {
    /// The VM always begins execution at `ip = 0` (spec.md §4.5), so the
    /// first byte of `code` must be the first top-level statement, not a
    /// function body. This emits every top-level statement *except*
    /// function definitions first, then the program's terminal halt, and
    /// only then the function bodies themselves — a function is only ever
    /// reached via a (possibly backpatched) `CALL addr`, so nothing falls
    /// into one from `ip = 0` by mistake.
    fn compile_program(&mut self, statements: &[Stmt]) -> Result<Chunk, IodeError> {
        for stmt in statements {
            if !matches!(stmt, Stmt::FunctionDef { .. }) {
                self.gen_stmt(stmt)?;
            }
        }

        // A terminal RETURN after the top-level program (spec.md §4.4). The
        // preceding CONST "" mirrors the per-function trailer so this
        // RETURN always has something to pop, keeping the stack balanced
        // even though `ExprStmt` already pops its own leftover values.
        let empty = self.make_constant("")?;
        self.chunk.emit(Opcode::Const);
        self.chunk.emit_byte(empty);
        self.chunk.emit(Opcode::Return);

        for stmt in statements {
            if matches!(stmt, Stmt::FunctionDef { .. }) {
                self.gen_stmt(stmt)?;
            }
        }

        for (name, offsets) in self.call_fixups.clone() {
            let address = *self.function_ips.get(&name).ok_or_else(|| {
                IodeError::generator(format!("internal compiler error: undefined function '{name}' in fixup pass"))
            })?;
            let address = u16::try_from(address)
                .map_err(|_| IodeError::generator(format!("function '{name}' entry point exceeds 16-bit address space")))?;
            for offset in offsets {
                self.patch_u16(offset, address);
            }
        }

        // Populate the library export table (spec.md §3 "Chunk", §6
        // "Library container"): only top-level, exported function
        // definitions publish an entry IP. `iode-cli` discards this field
        // when writing an executable container.
        for stmt in statements {
            if let Stmt::FunctionDef { name, exported: true, .. } = stmt {
                if let Some(&ip) = self.function_ips.get(&name.lexeme) {
                    self.chunk.exports.insert(name.lexeme.clone(), ip as u64);
                }
            }
        }

        Ok(std::mem::take(&mut self.chunk))
    }

    fn begin_scope(&mut self) { self.scope_depth += 1; }

    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while self.locals.last().map_or(false, |(_, depth)| *depth > self.scope_depth) {
            self.locals.pop();
        }
    }

    fn resolve_local(&self, name: &str) -> Option<u8> {
        self.locals.iter().rposition(|(local, _)| local == name).map(|i| i as u8)
    }

    fn obfuscated_name(&mut self, name: &str) -> String {
        if !self.obfuscate {
            return name.to_string();
        }
        if let Some(existing) = self.obfuscation_map.get(name) {
            return existing.clone();
        }
        let renamed = format!("_o{}", self.obfuscation_counter);
        self.obfuscation_counter += 1;
        self.obfuscation_map.insert(name.to_string(), renamed.clone());
        renamed
    }

    fn make_constant(&mut self, value: impl AsRef<str>) -> Result<u8, IodeError> {
        self.chunk.intern(value).map_err(IodeError::generator)
    }

    /// The analyzer rejects a wrong arity for these same built-ins first
    /// (`analyzer::type_of_call`), but the generator must not trust that as
    /// its only guard: `compile()` is a public entry point in its own right,
    /// so this re-checks before indexing `arguments[0]`/`arguments[1]`
    /// rather than risk an out-of-bounds panic if it is ever called on
    /// statements that bypassed semantic analysis.
    fn check_arity(name: &str, arguments: &[Expr], expected: usize) -> Result<(), IodeError> {
        if arguments.len() != expected {
            return Err(IodeError::generator(format!(
                "{name}() expects {expected} argument{}, got {}",
                if expected == 1 { "" } else { "s" },
                arguments.len()
            )));
        }
        Ok(())
    }

    fn patch_u16(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.chunk.code[offset] = hi;
        self.chunk.code[offset + 1] = lo;
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), IodeError> {
        match stmt {
            Stmt::Import { .. } => Ok(()),
            Stmt::VarDecl { name, initializer, .. } => {
                match initializer {
                    Some(expr) => self.gen_expr(expr)?,
                    None => {
                        let idx = self.make_constant("")?;
                        self.chunk.emit(Opcode::Const);
                        self.chunk.emit_byte(idx);
                    },
                }
                if self.scope_depth == 0 {
                    let obfuscated = self.obfuscated_name(&name.lexeme);
                    let idx = self.make_constant(obfuscated)?;
                    self.chunk.emit(Opcode::DefineGlobal);
                    self.chunk.emit_byte(idx);
                } else {
                    self.locals.push((name.lexeme.clone(), self.scope_depth));
                }
                Ok(())
            },
            Stmt::FunctionDef { name, params, body, .. } => {
                self.function_ips.insert(name.lexeme.clone(), self.chunk.code.len());
                self.begin_scope();
                for param in params {
                    self.locals.push((param.name.lexeme.clone(), self.scope_depth));
                }
                for inner in body {
                    self.gen_stmt(inner)?;
                }
                let empty = self.make_constant("")?;
                self.chunk.emit(Opcode::Const);
                self.chunk.emit_byte(empty);
                self.chunk.emit(Opcode::Return);
                self.end_scope();
                Ok(())
            },
            // A declaration without a body contributes a symbol at the
            // analysis stage but emits zero code bytes (spec.md §8).
            Stmt::FunctionDecl { .. } => Ok(()),
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.gen_expr(expr)?,
                    None => {
                        let idx = self.make_constant("")?;
                        self.chunk.emit(Opcode::Const);
                        self.chunk.emit_byte(idx);
                    },
                }
                self.chunk.emit(Opcode::Return);
                Ok(())
            },
            Stmt::ExprStmt { expr } => {
                self.gen_expr(expr)?;
                if Self::produces_value(expr) {
                    self.chunk.emit(Opcode::Pop);
                }
                Ok(())
            },
        }
    }

    /// Every expression leaves exactly one value on the stack when
    /// evaluated, except the three void builtins, which consume their own
    /// arguments and push nothing.
    fn produces_value(expr: &Expr) -> bool {
        !matches!(
            expr,
            Expr::Call { callee, .. }
                if matches!(&**callee, Expr::Variable { name } if matches!(name.lexeme.as_str(), "writeOut" | "writeErr" | "flush"))
        )
    }

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), IodeError> {
        match expr {
            Expr::Literal { value, .. } => {
                let text = match value {
                    Literal::Str(s) => s.clone(),
                    Literal::Number(n) => n.clone(),
                };
                let idx = self.make_constant(text)?;
                self.chunk.emit(Opcode::Const);
                self.chunk.emit_byte(idx);
                Ok(())
            },
            Expr::Variable { name } => {
                if let Some(slot) = self.resolve_local(&name.lexeme) {
                    self.chunk.emit(Opcode::GetLocal);
                    self.chunk.emit_byte(slot);
                } else {
                    let obfuscated = self.obfuscated_name(&name.lexeme);
                    let idx = self.make_constant(obfuscated)?;
                    self.chunk.emit(Opcode::GetGlobal);
                    self.chunk.emit_byte(idx);
                }
                Ok(())
            },
            Expr::Grouping { inner } => self.gen_expr(inner),
            Expr::Binary { left, op, right } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                let opcode = match op.lexeme.as_str() {
                    "+" => Opcode::Add,
                    "-" => Opcode::Subtract,
                    "*" => Opcode::Multiply,
                    "/" => Opcode::Divide,
                    other => {
                        return Err(IodeError::generator(format!("unsupported binary operator '{other}'")));
                    },
                };
                self.chunk.emit(opcode);
                Ok(())
            },
            Expr::Assign { name, value, .. } => {
                self.gen_expr(value)?;
                if let Some(slot) = self.resolve_local(&name.lexeme) {
                    self.chunk.emit(Opcode::SetLocal);
                    self.chunk.emit_byte(slot);
                } else {
                    let obfuscated = self.obfuscated_name(&name.lexeme);
                    let idx = self.make_constant(obfuscated)?;
                    self.chunk.emit(Opcode::SetGlobal);
                    self.chunk.emit_byte(idx);
                }
                Ok(())
            },
            Expr::Call { callee, paren, arguments } => self.gen_call(callee, paren, arguments),
        }
    }

    fn gen_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<(), IodeError> {
        let Expr::Variable { name } = callee else {
            return Err(IodeError::generator("invalid callee expression"));
        };

        match name.lexeme.as_str() {
            "writeOut" => {
                Self::check_arity("writeOut", arguments, 1)?;
                self.gen_expr(&arguments[0])?;
                self.chunk.emit(Opcode::WriteOut);
                return Ok(());
            },
            "writeErr" => {
                Self::check_arity("writeErr", arguments, 1)?;
                self.gen_expr(&arguments[0])?;
                self.chunk.emit(Opcode::WriteErr);
                return Ok(());
            },
            "flush" => {
                Self::check_arity("flush", arguments, 0)?;
                self.chunk.emit(Opcode::Flush);
                return Ok(());
            },
            "convert" => {
                Self::check_arity("convert", arguments, 2)?;
                self.gen_expr(&arguments[0])?;
                let Expr::Variable { name: type_name } = &arguments[1] else {
                    return Err(IodeError::generator("second argument to convert() must be a type name"));
                };
                let target = DataType::from_annotation(&type_name.lexeme)
                    .ok_or_else(|| IodeError::generator(format!("unknown type '{}'", type_name.lexeme)))?;
                self.chunk.emit(Opcode::Convert);
                self.chunk.emit_byte(target.to_byte());
                return Ok(());
            },
            _ => {},
        }

        for arg in arguments {
            self.gen_expr(arg)?;
        }

        self.chunk.emit(Opcode::Call);
        self.chunk.emit_byte(arguments.len() as u8);

        if let Some(&ip) = self.function_ips.get(&name.lexeme) {
            let address = u16::try_from(ip)
                .map_err(|_| IodeError::generator(format!("function '{}' entry point exceeds 16-bit address space", name.lexeme)))?;
            self.chunk.emit_u16(address);
        } else {
            let offset = self.chunk.code.len();
            self.chunk.emit_u16(PLACEHOLDER_ADDRESS);
            self.call_fixups.entry(name.lexeme.clone()).or_default().push(offset);
        }
        let _ = paren;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyzer::analyze, lexer::lex, parser::parse};
    use std::path::Path;

    fn compile_src(source: &str) -> Chunk {
        let stmts = parse(lex(source).unwrap()).unwrap();
        let analysis = analyze(&stmts, Path::new(".")).unwrap();
        compile(&stmts, analysis.imports, false).unwrap()
    }

    #[test]
    fn hello_world_ends_with_return() {
        let chunk = compile_src("writeOut(\"hi\")\nflush()");
        assert_eq!(*chunk.code.last().unwrap(), Opcode::Return.to_byte());
    }

    #[test]
    fn forward_call_is_backpatched() {
        let chunk = compile_src("def main() { writeOut(f()) flush() }\ndef f(): String { return \"ok\" }\nmain()");
        assert!(!chunk.code.windows(2).any(|w| w == [0xFF, 0xFF]));
    }

    #[test]
    fn too_many_constants_is_an_error() {
        let mut src = String::new();
        for i in 0..257 {
            src.push_str(&format!("val v{i}: Int = {i}\n"));
        }
        let stmts = parse(lex(&src).unwrap()).unwrap();
        let analysis = analyze(&stmts, Path::new(".")).unwrap();
        assert!(compile(&stmts, analysis.imports, false).is_err());
    }

    #[test]
    fn obfuscation_is_deterministic_within_a_compile() {
        let stmts = parse(lex("val x: Int = 1\nval y: Int = x").unwrap()).unwrap();
        let analysis = analyze(&stmts, Path::new(".")).unwrap();
        let chunk = compile(&stmts, analysis.imports, true).unwrap();
        assert!(chunk.constants.iter().any(|c| c == "_o0"));
    }

    /// A function declared *before* the first top-level statement must not
    /// leave its body at offset 0: `ip = 0` would then start execution
    /// inside the function rather than at the program's own code.
    #[test]
    fn function_declared_before_top_level_code_does_not_sit_at_entry_point() {
        let chunk = compile_src("def f(): String { return \"from f\" }\nwriteOut(\"top level\")\nflush()");
        // `writeOut("top level")` is the first non-function statement, so
        // its literal load (`CONST`) must be the very first emitted byte,
        // not `f`'s body (which, were it emitted first, would start with
        // `f`'s own code — `f` has no parameters or locals to `GET_LOCAL`,
        // so this also rules out execution silently falling into its body).
        assert_eq!(chunk.code[0], Opcode::Const.to_byte());
        assert!(!chunk.code.is_empty());
    }

    #[test]
    fn write_out_with_wrong_arity_is_a_generator_error() {
        let stmts = parse(lex("writeOut()").unwrap()).unwrap();
        assert!(compile(&stmts, Vec::new(), false).is_err());
    }

    #[test]
    fn flush_with_an_argument_is_a_generator_error() {
        let stmts = parse(lex("flush(\"x\")").unwrap()).unwrap();
        assert!(compile(&stmts, Vec::new(), false).is_err());
    }
}
