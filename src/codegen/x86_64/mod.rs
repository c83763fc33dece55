//! x86-64 back-end: Intel-syntax assembly text, SysV ABI calling
//! convention, Linux and Darwin host variants.

use std::collections::BTreeMap;

use crate::codegen::{classify_operand, lookup_size, IRVisitor, InstructionFlags, InstructionInserter, MemoryAccessor, OperandShape, Stack, Storage, StorageEmitter};
use crate::error::{CompileError, CompileResult};
use crate::ita::{Instruction, Quadruple};
use crate::runtime;
use crate::table::Object;
use crate::target::{Host, TargetConfig};

/// SysV argument-passing order for the first six integer/pointer
/// arguments.
const ARG_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

#[derive(Clone, Debug, Default)]
pub struct X86StackFrame {
    size: i64,
    offsets: BTreeMap<String, i64>,
}

impl Stack for X86StackFrame {
    fn allocate(&mut self, name: &str, size: i64) -> i64 {
        if let Some(existing) = self.offsets.get(name) {
            return *existing;
        }
        self.size += size;
        let offset = -self.size;
        self.offsets.insert(name.to_string(), offset);
        offset
    }

    fn get(&self, name: &str) -> Option<i64> {
        self.offsets.get(name).copied()
    }

    fn frame_size(&self) -> i64 {
        // 16-byte aligned, minus 8 for the pushed return address.
        let raw = self.size;
        let aligned = ((raw + 15) / 16) * 16;
        aligned - 8
    }

    fn clear(&mut self) {
        self.size = 0;
        self.offsets.clear();
    }
}

pub struct X86Accessor;

impl MemoryAccessor for X86Accessor {
    fn resolve_operand(
        &self,
        _object: &Object,
        _function: &str,
        operand: &str,
        flags: InstructionFlags,
    ) -> Storage {
        if flags.contains(InstructionFlags::ADDRESS) {
            Storage::Register(operand.to_string())
        } else {
            Storage::Empty
        }
    }

    fn resolve_vector_base(&self, object: &Object, name: &str) -> Option<Storage> {
        object
            .vectors
            .get(name)
            .map(|_| Storage::Register(format!("{}(%rip)", name)))
    }
}

/// The `dword ptr`-style size keyword x86 needs on every memory operand.
fn ptr_keyword(size: u32) -> &'static str {
    match size {
        1 => "byte ptr",
        2 => "word ptr",
        8 => "qword ptr",
        _ => "dword ptr",
    }
}

/// The register name sized for `size` bytes, derived from the 64-bit
/// register family (`rax` -> `eax`/`al`).
fn reg_sized(reg64: &str, size: u32) -> String {
    let (q, d, w, b) = match reg64 {
        "rax" => ("rax", "eax", "ax", "al"),
        "rcx" => ("rcx", "ecx", "cx", "cl"),
        "rdi" => ("rdi", "edi", "di", "dil"),
        "rsi" => ("rsi", "esi", "si", "sil"),
        "rdx" => ("rdx", "edx", "dx", "dl"),
        "r8" => ("r8", "r8d", "r8w", "r8b"),
        "r9" => ("r9", "r9d", "r9w", "r9b"),
        other => (other, other, other, other),
    };
    match size {
        1 => b.to_string(),
        2 => w.to_string(),
        8 => q.to_string(),
        _ => d.to_string(),
    }
}

fn arith_mnemonic(op: &str) -> &'static str {
    match op {
        "+" => "add",
        "-" => "sub",
        "*" => "imul",
        "&" => "and",
        "|" => "or",
        "^" => "xor",
        "<<" => "shl",
        ">>" => "shr",
        _ => "add",
    }
}

/// The `setCC` suffix for the comparison operator the preceding `CMP`
/// recorded.
fn set_suffix(op: &str) -> &'static str {
    match op {
        "==" => "e",
        "!=" => "ne",
        "<" => "l",
        "<=" => "le",
        ">" => "g",
        ">=" => "ge",
        _ => "ne",
    }
}

/// Walks one function's quadruples and emits Intel-syntax text.
pub struct X86Backend {
    config: TargetConfig,
    text: Vec<String>,
    frame: X86StackFrame,
    accessor: X86Accessor,
    object: Object,
    current_function: String,
    label_seq: u32,
    pending_args: Vec<String>,
    last_cmp_op: String,
}

impl X86Backend {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            text: Vec::new(),
            frame: X86StackFrame::default(),
            accessor: X86Accessor,
            object: Object::new(),
            current_function: String::new(),
            label_seq: 0,
            pending_args: Vec::new(),
            last_cmp_op: String::new(),
        }
    }

    fn formatted_label(&self, label: &str) -> String {
        format!(".{}__{}", label, self.current_function)
    }

    fn entry_name(&self, name: &str) -> String {
        if name == "main" {
            self.config.entry_symbol().to_string()
        } else {
            self.config.symbol_name(name)
        }
    }

    /// Ensure `name` has a stack slot sized for it and return the sized
    /// `dword ptr [rbp - N]`-style operand text.
    fn mem_operand(&mut self, name: &str, size: u32) -> String {
        let offset = self.frame.allocate(name, size as i64);
        format!("{} [rbp - {}]", ptr_keyword(size), -offset)
    }

    /// Like `mem_operand` but without the size keyword, for `lea`.
    fn address_text(&mut self, name: &str, size: u32) -> String {
        let offset = self.frame.allocate(name, size as i64);
        format!("[rbp - {}]", -offset)
    }

    /// Resolve an operand's value into register text, emitting whatever
    /// load is needed. Bare numeric strings (as `CMP`'s zero-test rhs, or
    /// an increment delta) pass through without a memory lookup.
    fn operand_value_text(&mut self, operand: &str, size: u32) -> CompileResult<String> {
        match classify_operand(operand) {
            OperandShape::Immediate(value, _, _) => Ok(value),
            OperandShape::Name(name) => {
                if let Ok(v) = name.parse::<i64>() {
                    return Ok(v.to_string());
                }
                let op_size = lookup_size(&self.object, &self.current_function, &name).max(size);
                Ok(self.mem_operand(&name, op_size))
            }
            _ => Ok("0".to_string()),
        }
    }

    /// Load `operand`'s value into the `base` register family, sized for
    /// `size`, emitting the `mov` and returning the register text used.
    fn load_operand_into(&mut self, operand: &str, base: &str, size: u32) -> CompileResult<String> {
        let reg = reg_sized(base, size);
        match classify_operand(operand) {
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    mov {}, {}", reg, value));
            }
            OperandShape::Name(name) => {
                if let Ok(v) = name.parse::<i64>() {
                    self.insert_raw(format!("    mov {}, {}", reg, v));
                } else if name == "_flags" {
                    let cc = set_suffix(&self.last_cmp_op);
                    self.insert_raw(format!("    set{} al", cc));
                    self.insert_raw(format!("    movzx {}, al", reg_sized(base, size.max(4))));
                } else {
                    let op_size = lookup_size(&self.object, &self.current_function, &name).max(size);
                    let mem = self.mem_operand(&name, op_size);
                    self.insert_raw(format!("    mov {}, {}", reg, mem));
                }
            }
            _ => {}
        }
        Ok(reg)
    }

    fn lower_scalar_mov(&mut self, name: &str, rhs: &str) -> CompileResult<()> {
        match classify_operand(rhs) {
            OperandShape::Immediate(value, _, _) => {
                let size = lookup_size(&self.object, &self.current_function, name).max(4);
                let dest = self.mem_operand(name, size);
                self.insert_raw(format!("    mov {}, {}", dest, value));
            }
            OperandShape::AddressOf(target) => {
                let flags = InstructionFlags::ADDRESS;
                let _ = self.accessor.resolve_operand(&self.object, &self.current_function, &target, flags);
                let reg = if let Some(Storage::Register(vector_addr)) =
                    self.accessor.resolve_vector_base(&self.object, &target)
                {
                    self.insert_raw(format!("    lea rax, [{}]", vector_addr));
                    "rax".to_string()
                } else {
                    let target_size = lookup_size(&self.object, &self.current_function, &target).max(4);
                    let addr = self.address_text(&target, target_size);
                    self.insert_raw(format!("    lea rax, {}", addr));
                    "rax".to_string()
                };
                let dest = self.mem_operand(name, 8);
                self.insert_raw(format!("    mov {}, {}", dest, reg));
            }
            OperandShape::Name(src) if src == "_retval" => {
                let size = lookup_size(&self.object, &self.current_function, name).max(4);
                let dest = self.mem_operand(name, size);
                let reg = if size == 8 { "rax" } else { "eax" };
                self.insert_raw(format!("    mov {}, {}", dest, reg));
            }
            OperandShape::Name(src) if src == "_flags" => {
                let size = 4;
                let cc = set_suffix(&self.last_cmp_op);
                self.insert_raw(format!("    set{} al", cc));
                self.insert_raw("    movzx eax, al".to_string());
                let dest = self.mem_operand(name, size);
                self.insert_raw(format!("    mov {}, eax", dest));
            }
            OperandShape::Name(src) => {
                if let Ok(v) = src.parse::<i64>() {
                    let size = lookup_size(&self.object, &self.current_function, name).max(4);
                    let dest = self.mem_operand(name, size);
                    self.insert_raw(format!("    mov {}, {}", dest, v));
                } else {
                    let size = lookup_size(&self.object, &self.current_function, name)
                        .max(lookup_size(&self.object, &self.current_function, &src))
                        .max(4);
                    let reg = self.load_operand_into(&src, "rax", size)?;
                    let dest = self.mem_operand(name, size);
                    self.insert_raw(format!("    mov {}, {}", dest, reg));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn lower_indirect_mov(&mut self, pointer: &str, rhs: &str) -> CompileResult<()> {
        let flags = InstructionFlags::INDIRECT;
        let ptr_size = lookup_size(&self.object, &self.current_function, pointer).max(8);
        let ptr_mem = self.mem_operand(pointer, ptr_size);
        self.insert_raw(format!("    mov rax, {}", ptr_mem));
        let rhs_text = self.operand_value_text(rhs, 4)?;
        let rhs_size = match classify_operand(rhs) {
            OperandShape::Immediate(_, ty, _) => ty.size(),
            _ => 4,
        };
        let _ = self.accessor.resolve_operand(&self.object, &self.current_function, pointer, flags);
        self.insert_raw(format!("    mov {} [rax], {}", ptr_keyword(rhs_size), rhs_text));
        Ok(())
    }

    fn lower_vector_mov(&mut self, base: &str, index: &str, rhs: &str) -> CompileResult<()> {
        let element_size = 4;
        let index_text = self.operand_value_text(index, 4)?;
        if let Ok(i) = index_text.parse::<i64>() {
            self.insert_raw(format!("    # {}[{}]", base, i));
        }
        let rhs_text = self.operand_value_text(rhs, element_size)?;
        if let Some(Storage::Register(vector_addr)) = self.accessor.resolve_vector_base(&self.object, base) {
            self.insert_raw(format!("    lea rcx, [{}]", vector_addr));
        } else {
            let addr = self.address_text(base, 8);
            self.insert_raw(format!("    lea rcx, {}", addr));
        }
        self.insert_raw(format!("    mov rdx, {}", index_text));
        self.insert_raw(format!(
            "    mov {} [rcx + rdx*{}], {}",
            ptr_keyword(element_size),
            element_size,
            rhs_text
        ));
        Ok(())
    }

    fn lower_vector_read(&mut self, target: &str, base: &str, index: &str) -> CompileResult<()> {
        let element_size = 4;
        let index_text = self.operand_value_text(index, 4)?;
        if let Some(Storage::Register(vector_addr)) = self.accessor.resolve_vector_base(&self.object, base) {
            self.insert_raw(format!("    lea rcx, [{}]", vector_addr));
        } else {
            let addr = self.address_text(base, 8);
            self.insert_raw(format!("    lea rcx, {}", addr));
        }
        self.insert_raw(format!("    mov rdx, {}", index_text));
        self.insert_raw(format!(
            "    mov eax, {} [rcx + rdx*{}]",
            ptr_keyword(element_size),
            element_size
        ));
        let size = lookup_size(&self.object, &self.current_function, target).max(4);
        let dest = self.mem_operand(target, size);
        self.insert_raw(format!("    mov {}, eax", dest));
        Ok(())
    }

    fn lower_binary_mov(&mut self, target: &str, lhs: &str, op: &str, rhs: &str) -> CompileResult<()> {
        let size = lookup_size(&self.object, &self.current_function, target).max(4);
        let lhs_reg = self.load_operand_into(lhs, "rax", size)?;
        let rhs_text = self.operand_value_text(rhs, size)?;
        self.insert_raw(format!("    {} {}, {}", arith_mnemonic(op), lhs_reg, rhs_text));
        let dest = self.mem_operand(target, size);
        self.insert_raw(format!("    mov {}, {}", dest, lhs_reg));
        Ok(())
    }

    fn lower_compound_mov(&mut self, q: &Quadruple) -> CompileResult<()> {
        if self.object.vectors.contains_key(&q.s2) {
            return self.lower_vector_read(&q.s1, &q.s2, &q.s3);
        }
        if let Some((op, rhs)) = q.s3.split_once(' ') {
            return self.lower_binary_mov(&q.s1, &q.s2, op, rhs);
        }
        // Bare numeric delta: pre/post increment or decrement.
        self.lower_binary_mov(&q.s1, &q.s2, "+", &q.s3)
    }

    pub fn lower_function(&mut self, name: &str, body: &[Quadruple], object: &Object) -> CompileResult<()> {
        self.current_function = name.to_string();
        self.object = object.clone();
        self.frame.clear();
        self.pending_args.clear();
        self.last_cmp_op.clear();

        let mut alloc_plan: Vec<(String, i64)> = Vec::new();
        if let Some(func) = self.object.functions.get(name) {
            for local in func.locals.symbols() {
                alloc_plan.push((local.clone(), lookup_size(&self.object, name, local) as i64));
            }
            for temp in func.temporaries.keys() {
                alloc_plan.push((temp.clone(), lookup_size(&self.object, name, temp) as i64));
            }
        }
        for (n, size) in alloc_plan {
            self.frame.allocate(&n, size);
        }

        let has_call = body.iter().any(|q| q.op == Instruction::Call);
        let flags = if has_call { InstructionFlags::ALIGN } else { InstructionFlags::NONE };
        self.emit_function_prologue(name, self.frame.frame_size());
        if flags.contains(InstructionFlags::ALIGN) && self.frame.frame_size() <= 0 {
            self.insert_raw("    sub rsp, 8".to_string());
        }
        for q in body {
            self.dispatch(q)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, q: &Quadruple) -> CompileResult<()> {
        match q.op {
            Instruction::FuncStart => self.from_func_start_ita(&q.s1),
            Instruction::FuncEnd => self.from_func_end_ita(),
            Instruction::Locl => self.from_locl_ita(q),
            Instruction::Globl | Instruction::Noop => Ok(()),
            Instruction::If => self.from_if_ita(q),
            Instruction::Label => self.from_label_ita(q),
            Instruction::Goto => self.from_goto_ita(q),
            Instruction::JmpE => self.from_jmp_e_ita(q),
            Instruction::Cmp => self.from_cmp_ita(q),
            Instruction::Mov => self.from_mov_ita(q),
            Instruction::Push => self.from_push_ita(q),
            Instruction::Pop => self.from_pop_ita(),
            Instruction::Call => self.from_call_ita(q),
            Instruction::Return => self.from_return_ita(q),
            Instruction::Leave => self.from_leave_ita(),
        }
    }

    fn call_arg_setup(&mut self, reg64: &str, arg: &str) -> CompileResult<()> {
        match classify_operand(arg) {
            OperandShape::Immediate(value, crate::value::TypeLiteral::String(_), _) => {
                if let Some(idx) = self.object.string_pool.iter().position(|s| *s == value) {
                    self.insert_raw(format!("    lea {}, [rip + ._L_str{}__]", reg64, idx + 1));
                }
            }
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    mov {}, {}", reg64, value));
            }
            OperandShape::Name(name) => {
                let size = lookup_size(&self.object, &self.current_function, &name);
                let mem = self.mem_operand(&name, size);
                let dest = reg_sized(reg64, size);
                self.insert_raw(format!("    mov {}, {}", dest, mem));
            }
            _ => {}
        }
        Ok(())
    }

}

impl IRVisitor for X86Backend {
    fn from_func_start_ita(&mut self, _name: &str) -> CompileResult<()> {
        Ok(())
    }

    fn from_func_end_ita(&mut self) -> CompileResult<()> {
        Ok(())
    }

    fn from_locl_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        let size = lookup_size(&self.object, &self.current_function, &q.s1);
        self.frame.allocate(&q.s1, size as i64);
        Ok(())
    }

    fn from_if_ita(&mut self, _inst: &Quadruple) -> CompileResult<()> {
        Ok(())
    }

    fn from_label_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        let label = self.formatted_label(&q.s1);
        self.insert_label(&label);
        Ok(())
    }

    fn from_goto_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        let label = self.formatted_label(&q.s1);
        self.insert_raw(format!("    jmp {}", label));
        Ok(())
    }

    fn from_jmp_e_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        let label = self.formatted_label(&q.s1);
        self.insert_raw(format!("    je {}", label));
        Ok(())
    }

    fn from_cmp_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        if !q.s3.is_empty() {
            self.last_cmp_op = q.s3.clone();
        }
        let lhs_reg = self.load_operand_into(&q.s1, "rax", 4)?;
        let rhs_text = self.operand_value_text(&q.s2, 4)?;
        self.insert_raw(format!("    cmp {}, {}", lhs_reg, rhs_text));
        Ok(())
    }

    fn from_mov_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        if !q.s3.is_empty() {
            return self.lower_compound_mov(q);
        }
        match classify_operand(&q.s1) {
            OperandShape::Name(name) => self.lower_scalar_mov(&name, &q.s2),
            OperandShape::Indirect(ptr) => self.lower_indirect_mov(&ptr, &q.s2),
            OperandShape::Index(base, index) => self.lower_vector_mov(&base, &index, &q.s2),
            _ => Ok(()),
        }
    }

    fn from_push_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        self.pending_args.push(q.s1.clone());
        Ok(())
    }

    fn from_pop_ita(&mut self) -> CompileResult<()> {
        self.insert_raw("    pop rax".to_string());
        Ok(())
    }

    fn from_call_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        let args: Vec<String> = self.pending_args.drain(..).collect();
        let forward: Vec<String> = args.into_iter().rev().collect();
        for (i, arg) in forward.iter().enumerate() {
            if let Ok(reg) = argument_register(i) {
                let flags = InstructionFlags::ARGUMENT;
                let _ = self.accessor.resolve_operand(&self.object, &self.current_function, arg, flags);
                self.call_arg_setup(reg, arg)?;
            }
        }
        self.insert_raw(format!("    call {}", self.config.symbol_name(&q.s1)));
        Ok(())
    }

    fn from_return_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        if q.s1.is_empty() {
            return Ok(());
        }
        match classify_operand(&q.s1) {
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    mov eax, {}", value));
            }
            OperandShape::Name(name) => {
                let size = lookup_size(&self.object, &self.current_function, &name).max(4);
                let mem = self.mem_operand(&name, size);
                let reg = if size == 8 { "rax" } else { "eax" };
                self.insert_raw(format!("    mov {}, {}", reg, mem));
            }
            _ => {}
        }
        Ok(())
    }

    fn from_leave_ita(&mut self) -> CompileResult<()> {
        if self.current_function == "main" {
            for line in runtime::exit_sequence(self.config.platform, self.config.host, 0) {
                self.insert_raw(line);
            }
        } else {
            let name = self.current_function.clone();
            self.emit_function_epilogue(&name);
        }
        Ok(())
    }
}

impl InstructionInserter for X86Backend {
    fn insert_raw(&mut self, line: impl Into<String>) {
        self.text.push(line.into());
    }

    fn insert_label(&mut self, label: &str) {
        self.text.push(format!("{}:", label));
    }

    fn insert_comment(&mut self, text: &str) {
        self.text.push(format!("    # {}", text));
    }
}

impl StorageEmitter for X86Backend {
    fn emit_program_preamble(&mut self) {
        self.text.push(".intel_syntax noprefix".to_string());
        match self.config.host {
            Host::Linux => self.text.push(".text".to_string()),
            Host::Darwin => self.text.push(".section __TEXT,__text,regular,pure_instructions".to_string()),
        }
    }

    fn emit_function_prologue(&mut self, name: &str, frame_size: i64) {
        let entry = self.entry_name(name);
        self.text.push(format!(".globl {}", entry));
        self.text.push(format!("{}:", entry));
        self.text.push("    push rbp".to_string());
        self.text.push("    mov rbp, rsp".to_string());
        if frame_size > 0 {
            self.text.push(format!("    sub rsp, {}", frame_size));
        }
    }

    fn emit_function_epilogue(&mut self, name: &str) {
        let _ = name;
        self.text.push("    mov rsp, rbp".to_string());
        self.text.push("    pop rbp".to_string());
        self.text.push("    ret".to_string());
    }

    fn emit_literal_pool(&mut self, object: &Object) {
        if object.string_pool.is_empty() && object.float_pool.is_empty() && object.double_pool.is_empty() {
            return;
        }
        match self.config.host {
            Host::Linux => self.text.push(".section .rodata".to_string()),
            Host::Darwin => self.text.push(".section __TEXT,__cstring,cstring_literals".to_string()),
        }
        self.text.push(".align 3".to_string());
        for (idx, s) in object.string_pool.iter().enumerate() {
            self.text.push(format!("._L_str{}__:", idx + 1));
            self.text.push(format!("    .asciz \"{}\"", s));
        }
        for (idx, f) in object.float_pool.iter().enumerate() {
            self.text.push(format!("._L_float{}__:", idx + 1));
            self.text.push(format!("    .float {}", f));
        }
        for (idx, d) in object.double_pool.iter().enumerate() {
            self.text.push(format!("._L_double{}__:", idx + 1));
            self.text.push(format!("    .double {}", d));
        }
    }

    fn finish(self) -> String {
        self.text.join("\n") + "\n"
    }
}

/// The SysV register used to pass the `n`th (0-indexed) integer argument,
/// when fewer than six arguments are passed.
pub fn argument_register(index: usize) -> CompileResult<&'static str> {
    ARG_REGISTERS
        .get(index)
        .copied()
        .ok_or_else(|| CompileError::ir(format!("argument index {} spills to stack", index), ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Platform;

    #[test]
    fn frame_size_aligns_to_16_minus_return_address() {
        let mut frame = X86StackFrame::default();
        frame.allocate("x", 8);
        assert_eq!(frame.frame_size(), 8);
        frame.allocate("y", 8);
        assert_eq!(frame.frame_size(), 8);
    }

    #[test]
    fn preamble_differs_by_host() {
        let linux_cfg = TargetConfig::resolve(Platform::X86_64, Host::Linux).unwrap();
        let mut backend = X86Backend::new(linux_cfg);
        backend.emit_program_preamble();
        assert!(backend.text.iter().any(|l| l == ".text"));
    }

    #[test]
    fn main_is_renamed_to_entry_symbol() {
        let cfg = TargetConfig::resolve(Platform::X86_64, Host::Linux).unwrap();
        let mut backend = X86Backend::new(cfg);
        let object = Object::new();
        backend.lower_function("main", &[], &object).unwrap();
        let output = backend.finish();
        assert!(output.contains("_start:"));
    }

    #[test]
    fn argument_register_table_matches_sysv_order() {
        assert_eq!(argument_register(0).unwrap(), "rdi");
        assert_eq!(argument_register(5).unwrap(), "r9");
        assert!(argument_register(6).is_err());
    }

    #[test]
    fn main_leave_emits_exit_syscall_not_ret() {
        use crate::ita::make_quadruple;
        let cfg = TargetConfig::resolve(Platform::X86_64, Host::Linux).unwrap();
        let mut backend = X86Backend::new(cfg);
        let object = Object::new();
        let body = vec![make_quadruple(Instruction::Leave, "", "", "")];
        backend.lower_function("main", &body, &object).unwrap();
        let output = backend.finish();
        assert!(output.contains("mov rax, 60"));
        assert!(output.contains("syscall"));
        assert!(!output.contains("    ret"));
    }
}
