//! Credence: a middle-to-back-end compiler for the B programming language.
//!
//! The pipeline: JSON AST and hoisted symbol table in, x86-64/ARM64
//! assembly text out. `compile` wires together the Expression Parser, the
//! ITA quadruple builder, the Table Builder, and the selected back-end.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod expr;
pub mod ita;
pub mod runtime;
pub mod span;
pub mod symbol;
pub mod table;
pub mod target;
pub mod value;

use ast::{HoistedSymbols, Node};
use codegen::arm64::Arm64Backend;
use codegen::x86_64::X86Backend;
use codegen::StorageEmitter;
use error::{CompileError, CompileResult};
use ita::ItaBuilder;
use table::{Object, TableBuilder};
use target::{Host, Platform, TargetConfig};

/// Run the full pipeline and return the emitted assembly text.
pub fn compile(ast_json: &str, symbols_json: &str, platform: Platform, host: Host) -> CompileResult<String> {
    let definitions: Vec<Node> = serde_json::from_str(ast_json)
        .map_err(|e| CompileError::parse(format!("malformed AST JSON: {}", e), ""))?;
    let hoisted: HoistedSymbols = serde_json::from_str(symbols_json)
        .map_err(|e| CompileError::parse(format!("malformed symbol-table JSON: {}", e), ""))?;

    let instructions = ItaBuilder::new(&hoisted).build_program(&definitions)?;
    let object = TableBuilder::new(&hoisted).build(&instructions)?;
    let config = TargetConfig::resolve(platform, host)?;

    emit_assembly(&object, config)
}

fn emit_assembly(object: &Object, config: TargetConfig) -> CompileResult<String> {
    match config.platform {
        Platform::X86_64 => {
            let mut backend = X86Backend::new(config);
            backend.emit_program_preamble();
            for (name, func) in &object.functions {
                backend.lower_function(name, &func.body, object)?;
            }
            backend.emit_literal_pool(object);
            Ok(backend.finish())
        }
        Platform::Arm64 => {
            let mut backend = Arm64Backend::new(config);
            backend.emit_program_preamble();
            for (name, func) in &object.functions {
                backend.lower_function(name, &func.body, object)?;
            }
            backend.emit_literal_pool(object);
            Ok(backend.finish())
        }
        Platform::Z80 => Err(CompileError::runtime(
            "the z80 platform has no code-generation back-end",
            "z80",
        )),
    }
}
