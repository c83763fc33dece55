//! Target-independent code generation scaffolding shared by the x86-64
//! and ARM64 back-ends: storage classification, per-instruction flags, the
//! memory accessor mediator, the push-down stack allocator, and the
//! `IRVisitor`/instruction-inserter/storage-emitter trait triad each
//! back-end implements.

pub mod arm64;
pub mod x86_64;

use crate::error::CompileResult;
use crate::ita::Quadruple;
use crate::table::Object;
use crate::value::TypeLiteral;

/// The shape of an operand's textual form, as produced by the ITA
/// builder: a bare name, an immediate `"(value:type:size)"` literal, a
/// pointer dereference (`*name`), an address-of (`&name`), or an indexed
/// vector element (`base[index]`).
#[derive(Clone, Debug, PartialEq)]
pub enum OperandShape {
    Name(String),
    Immediate(String, TypeLiteral, u32),
    AddressOf(String),
    Indirect(String),
    Index(String, String),
}

/// Classify one of the ITA's textual operand forms. `"_flags"` and the
/// empty string both come back as a bare `Name` — callers that care about
/// `"_flags"`'s special meaning (the result of the preceding `CMP`) check
/// for it explicitly.
pub fn classify_operand(operand: &str) -> OperandShape {
    if let Some(rest) = operand.strip_prefix('(') {
        if let Some(end) = rest.find(')') {
            let inner = &rest[..end];
            let parts: Vec<&str> = inner.splitn(3, ':').collect();
            if parts.len() == 3 {
                let ty = match parts[1] {
                    "int" => TypeLiteral::Int,
                    "long" => TypeLiteral::Long,
                    "byte" => TypeLiteral::Byte,
                    "float" => TypeLiteral::Float,
                    "double" => TypeLiteral::Double,
                    "bool" => TypeLiteral::Bool,
                    "char" => TypeLiteral::Char,
                    "null" => TypeLiteral::Null,
                    "string" => TypeLiteral::String(parts[2].parse().unwrap_or(1)),
                    _ => TypeLiteral::Word,
                };
                let size = parts[2].parse().unwrap_or(ty.size());
                return OperandShape::Immediate(parts[0].to_string(), ty, size);
            }
        }
    }
    if let Some(name) = operand.strip_prefix('&') {
        return OperandShape::AddressOf(name.to_string());
    }
    if let Some(name) = operand.strip_prefix('*') {
        return OperandShape::Indirect(name.to_string());
    }
    if let Some(open) = operand.find('[') {
        let (base, rest) = operand.split_at(open);
        let index = rest.trim_start_matches('[').trim_end_matches(']');
        return OperandShape::Index(base.to_string(), index.to_string());
    }
    OperandShape::Name(operand.to_string())
}

/// The byte size a back-end should allocate/move for `name` within
/// `function`, looked up from the Object model's declared locals,
/// temporaries, or globals. Falls back to a pointer-width word for names
/// the type checker never narrowed (parameters, pointers).
pub fn lookup_size(object: &Object, function: &str, name: &str) -> u32 {
    if let Some(func) = object.functions.get(function) {
        if let Ok(local) = func.locals.get_symbol(name) {
            return local.ty.size();
        }
        if let Some(ty) = func.temporaries.get(name) {
            return ty.size();
        }
    }
    if let Ok(global) = object.globals.get_symbol(name) {
        return global.ty.size();
    }
    TypeLiteral::Word.size()
}

/// Where an operand's value currently lives.
#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    Empty,
    StackOffset(i64),
    Register(String),
    Immediate(String, TypeLiteral, u32),
}

impl Storage {
    pub fn is_empty(&self) -> bool {
        matches!(self, Storage::Empty)
    }
}

/// Per-quadruple flags the memory accessor consults while lowering an
/// operand into an addressing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstructionFlags(u16);

impl InstructionFlags {
    pub const ADDRESS: InstructionFlags = InstructionFlags(1 << 0);
    pub const INDIRECT: InstructionFlags = InstructionFlags(1 << 1);
    pub const INDIRECT_SOURCE: InstructionFlags = InstructionFlags(1 << 2);
    pub const LOAD: InstructionFlags = InstructionFlags(1 << 3);
    pub const ARGUMENT: InstructionFlags = InstructionFlags(1 << 4);
    pub const ALIGN: InstructionFlags = InstructionFlags(1 << 5);
    pub const QWORD_DEST: InstructionFlags = InstructionFlags(1 << 6);

    pub const NONE: InstructionFlags = InstructionFlags(0);

    pub fn contains(self, other: InstructionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(self, other: InstructionFlags) -> InstructionFlags {
        InstructionFlags(self.0 | other.0)
    }

    pub fn clear(self, other: InstructionFlags) -> InstructionFlags {
        InstructionFlags(self.0 & !other.0)
    }
}

impl std::ops::BitOr for InstructionFlags {
    type Output = InstructionFlags;
    fn bitor(self, rhs: InstructionFlags) -> InstructionFlags {
        self.set(rhs)
    }
}

/// Mediates between the Object model's frame/vector offsets and an
/// operand string, so back-ends never reach into `Object` directly.
pub trait MemoryAccessor {
    fn resolve_operand(&self, object: &Object, function: &str, operand: &str, flags: InstructionFlags) -> Storage;
    fn resolve_vector_base(&self, object: &Object, name: &str) -> Option<Storage>;
}

/// Push-down stack allocation for a function's locals and spill slots.
pub trait Stack {
    fn allocate(&mut self, name: &str, size: i64) -> i64;
    fn get(&self, name: &str) -> Option<i64>;
    fn frame_size(&self) -> i64;
    fn stack_offset_from_vector_index(&self, base: i64, index: i64, element_size: i64) -> i64 {
        base + index * element_size
    }
    fn clear(&mut self);
}

/// One method per ITA opcode. A back-end's lowering pass implements this
/// and calls `InstructionInserter`/`StorageEmitter` methods from each.
pub trait IRVisitor {
    fn from_func_start_ita(&mut self, name: &str) -> CompileResult<()>;
    fn from_func_end_ita(&mut self) -> CompileResult<()>;
    fn from_cmp_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_mov_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_return_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_leave_ita(&mut self) -> CompileResult<()>;
    fn from_label_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_call_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_goto_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_if_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_jmp_e_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_push_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_locl_ita(&mut self, inst: &Quadruple) -> CompileResult<()>;
    fn from_pop_ita(&mut self) -> CompileResult<()>;
}

/// Emits individual target instructions into the back-end's text buffer.
pub trait InstructionInserter {
    fn insert_raw(&mut self, line: impl Into<String>);
    fn insert_label(&mut self, label: &str);
    fn insert_comment(&mut self, text: &str);
}

/// Emits whole sections (program preamble, function prologue/epilogue,
/// literal pools) rather than single instructions.
pub trait StorageEmitter {
    fn emit_program_preamble(&mut self);
    fn emit_function_prologue(&mut self, name: &str, frame_size: i64);
    fn emit_function_epilogue(&mut self, name: &str);
    fn emit_literal_pool(&mut self, object: &Object);
    fn finish(self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_flags_compose() {
        let flags = InstructionFlags::ADDRESS | InstructionFlags::LOAD;
        assert!(flags.contains(InstructionFlags::ADDRESS));
        assert!(flags.contains(InstructionFlags::LOAD));
        assert!(!flags.contains(InstructionFlags::INDIRECT));
    }

    #[test]
    fn instruction_flags_clear() {
        let flags = InstructionFlags::ADDRESS | InstructionFlags::ARGUMENT;
        let cleared = flags.clear(InstructionFlags::ARGUMENT);
        assert!(cleared.contains(InstructionFlags::ADDRESS));
        assert!(!cleared.contains(InstructionFlags::ARGUMENT));
    }

    #[test]
    fn classify_operand_recognizes_every_shape() {
        assert_eq!(classify_operand("x"), OperandShape::Name("x".to_string()));
        assert_eq!(
            classify_operand("(5:int:4)"),
            OperandShape::Immediate("5".to_string(), TypeLiteral::Int, 4)
        );
        assert_eq!(classify_operand("&x"), OperandShape::AddressOf("x".to_string()));
        assert_eq!(classify_operand("*p"), OperandShape::Indirect("p".to_string()));
        assert_eq!(
            classify_operand("v[3]"),
            OperandShape::Index("v".to_string(), "3".to_string())
        );
    }

    #[test]
    fn lookup_size_falls_back_to_word_for_unknown_names() {
        let object = Object::new();
        assert_eq!(lookup_size(&object, "main", "ghost"), TypeLiteral::Word.size());
    }
}
