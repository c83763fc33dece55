//! ARM64 (AArch64) back-end: GNU assembler text, AAPCS64 calling
//! convention, Linux and Darwin host variants.

use std::collections::BTreeMap;

use crate::codegen::{classify_operand, lookup_size, IRVisitor, InstructionFlags, InstructionInserter, MemoryAccessor, OperandShape, Stack, Storage, StorageEmitter};
use crate::error::{CompileError, CompileResult};
use crate::ita::{Instruction, Quadruple};
use crate::runtime;
use crate::table::Object;
use crate::target::{Host, TargetConfig};

/// AAPCS64 argument-passing order for the first eight integer/pointer
/// arguments.
const ARG_REGISTERS: [&str; 8] = ["x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7"];

/// Callee-saved registers this back-end reserves alongside the frame
/// pointer (`x29`) and link register (`x30`).
const RESERVED_CALLEE_SAVED: [&str; 2] = ["x23", "x26"];

/// Bytes reserved ahead of every local: the saved `x29`/`x30` pair plus the
/// two callee-saved registers this back-end always spills.
const RESERVED_BYTES: i64 = 16 + (RESERVED_CALLEE_SAVED.len() as i64) * 8;

/// Locals grow upward from `sp` (positive offsets), distinct from the
/// x86-64 back-end's frame-pointer-relative negative offsets.
#[derive(Clone, Debug, Default)]
pub struct Arm64StackFrame {
    size: i64,
    offsets: BTreeMap<String, i64>,
}

impl Stack for Arm64StackFrame {
    fn allocate(&mut self, name: &str, size: i64) -> i64 {
        if let Some(existing) = self.offsets.get(name) {
            return *existing;
        }
        let offset = RESERVED_BYTES + self.size;
        self.offsets.insert(name.to_string(), offset);
        self.size += size;
        offset
    }

    fn get(&self, name: &str) -> Option<i64> {
        self.offsets.get(name).copied()
    }

    fn frame_size(&self) -> i64 {
        let raw = self.size + RESERVED_BYTES;
        ((raw + 15) / 16) * 16
    }

    fn clear(&mut self) {
        self.size = 0;
        self.offsets.clear();
    }
}

pub struct Arm64Accessor;

impl MemoryAccessor for Arm64Accessor {
    fn resolve_operand(&self, _object: &Object, _function: &str, operand: &str, flags: InstructionFlags) -> Storage {
        if flags.contains(InstructionFlags::ADDRESS) {
            Storage::Register(operand.to_string())
        } else {
            Storage::Empty
        }
    }

    fn resolve_vector_base(&self, object: &Object, name: &str) -> Option<Storage> {
        object.vectors.get(name).map(|_| Storage::Register(format!("{}@PAGE", name)))
    }
}

/// The register family member sized for `size` bytes (`x0` -> `w0`).
fn reg_sized(reg: &str, size: u32) -> String {
    if size == 8 {
        reg.to_string()
    } else if let Some(rest) = reg.strip_prefix('x') {
        format!("w{}", rest)
    } else {
        reg.to_string()
    }
}

fn arith_mnemonic(op: &str) -> &'static str {
    match op {
        "+" => "add",
        "-" => "sub",
        "*" => "mul",
        "&" => "and",
        "|" => "orr",
        "^" => "eor",
        "<<" => "lsl",
        ">>" => "lsr",
        _ => "add",
    }
}

/// The `cset`/branch condition-code suffix for the comparison operator the
/// preceding `CMP` recorded.
fn cond_suffix(op: &str) -> &'static str {
    match op {
        "==" => "eq",
        "!=" => "ne",
        "<" => "lt",
        "<=" => "le",
        ">" => "gt",
        ">=" => "ge",
        _ => "ne",
    }
}

/// Walks one function's quadruples and emits AArch64 assembly text.
pub struct Arm64Backend {
    config: TargetConfig,
    text: Vec<String>,
    frame: Arm64StackFrame,
    accessor: Arm64Accessor,
    object: Object,
    current_function: String,
    pending_args: Vec<String>,
    last_cmp_op: String,
}

impl Arm64Backend {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            text: Vec::new(),
            frame: Arm64StackFrame::default(),
            accessor: Arm64Accessor,
            object: Object::new(),
            current_function: String::new(),
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

    fn mem_operand(&mut self, name: &str, size: u32) -> String {
        let offset = self.frame.allocate(name, size as i64);
        format!("[sp, #{}]", offset)
    }

    fn operand_value_text(&mut self, operand: &str, size: u32) -> CompileResult<String> {
        match classify_operand(operand) {
            OperandShape::Immediate(value, _, _) => Ok(format!("#{}", value)),
            OperandShape::Name(name) => {
                if let Ok(v) = name.parse::<i64>() {
                    return Ok(format!("#{}", v));
                }
                let op_size = lookup_size(&self.object, &self.current_function, &name).max(size);
                Ok(self.mem_operand(&name, op_size))
            }
            _ => Ok("#0".to_string()),
        }
    }

    fn load_operand_into(&mut self, operand: &str, base: &str, size: u32) -> CompileResult<String> {
        let reg = reg_sized(base, size);
        match classify_operand(operand) {
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    mov {}, #{}", reg, value));
            }
            OperandShape::Name(name) => {
                if let Ok(v) = name.parse::<i64>() {
                    self.insert_raw(format!("    mov {}, #{}", reg, v));
                } else if name == "_flags" {
                    let cc = cond_suffix(&self.last_cmp_op);
                    self.insert_raw(format!("    cset {}, {}", reg_sized(base, size.max(4)), cc));
                } else {
                    let op_size = lookup_size(&self.object, &self.current_function, &name).max(size);
                    let mem = self.mem_operand(&name, op_size);
                    self.insert_raw(format!("    ldr {}, {}", reg, mem));
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
                let reg = reg_sized("x0", size);
                self.insert_raw(format!("    mov {}, #{}", reg, value));
                let dest = self.mem_operand(name, size);
                self.insert_raw(format!("    str {}, {}", reg, dest));
            }
            OperandShape::AddressOf(target) => {
                let flags = InstructionFlags::ADDRESS;
                let _ = self.accessor.resolve_operand(&self.object, &self.current_function, &target, flags);
                if let Some(Storage::Register(vector_addr)) = self.accessor.resolve_vector_base(&self.object, &target) {
                    self.insert_raw(format!("    adrp x9, {}", vector_addr));
                } else {
                    let target_size = lookup_size(&self.object, &self.current_function, &target).max(4);
                    let offset = self.frame.allocate(&target, target_size as i64);
                    self.insert_raw(format!("    add x9, sp, #{}", offset));
                }
                let dest = self.mem_operand(name, 8);
                self.insert_raw(format!("    str x9, {}", dest));
            }
            OperandShape::Name(src) if src == "_retval" => {
                let size = lookup_size(&self.object, &self.current_function, name).max(4);
                let reg = reg_sized("x0", size);
                let dest = self.mem_operand(name, size);
                self.insert_raw(format!("    str {}, {}", reg, dest));
            }
            OperandShape::Name(src) if src == "_flags" => {
                let cc = cond_suffix(&self.last_cmp_op);
                self.insert_raw(format!("    cset w9, {}", cc));
                let size = 4;
                let dest = self.mem_operand(name, size);
                self.insert_raw(format!("    str w9, {}", dest));
            }
            OperandShape::Name(src) => {
                if let Ok(v) = src.parse::<i64>() {
                    let size = lookup_size(&self.object, &self.current_function, name).max(4);
                    let reg = reg_sized("x0", size);
                    self.insert_raw(format!("    mov {}, #{}", reg, v));
                    let dest = self.mem_operand(name, size);
                    self.insert_raw(format!("    str {}, {}", reg, dest));
                } else {
                    let size = lookup_size(&self.object, &self.current_function, name)
                        .max(lookup_size(&self.object, &self.current_function, &src))
                        .max(4);
                    let reg = self.load_operand_into(&src, "x9", size)?;
                    let dest = self.mem_operand(name, size);
                    self.insert_raw(format!("    str {}, {}", reg, dest));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn lower_indirect_mov(&mut self, pointer: &str, rhs: &str) -> CompileResult<()> {
        let ptr_size = lookup_size(&self.object, &self.current_function, pointer).max(8);
        let ptr_mem = self.mem_operand(pointer, ptr_size);
        self.insert_raw(format!("    ldr x9, {}", ptr_mem));
        let rhs_text = match classify_operand(rhs) {
            OperandShape::Immediate(value, _, _) => format!("#{}", value),
            _ => self.operand_value_text(rhs, 4)?,
        };
        let flags = InstructionFlags::INDIRECT;
        let _ = self.accessor.resolve_operand(&self.object, &self.current_function, pointer, flags);
        if let Some(stripped) = rhs_text.strip_prefix('#') {
            self.insert_raw(format!("    mov w10, #{}", stripped));
            self.insert_raw("    str w10, [x9]".to_string());
        } else {
            self.insert_raw(format!("    ldr w10, {}", rhs_text));
            self.insert_raw("    str w10, [x9]".to_string());
        }
        Ok(())
    }

    fn lower_vector_mov(&mut self, base: &str, index: &str, rhs: &str) -> CompileResult<()> {
        let index_text = self.operand_value_text(index, 4)?;
        if let Some(Storage::Register(vector_addr)) = self.accessor.resolve_vector_base(&self.object, base) {
            self.insert_raw(format!("    adrp x9, {}", vector_addr));
        } else {
            let offset = self.frame.allocate(base, 8);
            self.insert_raw(format!("    add x9, sp, #{}", offset));
        }
        self.insert_raw(format!("    mov x10, {}", index_text));
        let rhs_text = self.operand_value_text(rhs, 4)?;
        if let Some(stripped) = rhs_text.strip_prefix('#') {
            self.insert_raw(format!("    mov w11, #{}", stripped));
        } else {
            self.insert_raw(format!("    ldr w11, {}", rhs_text));
        }
        self.insert_raw("    str w11, [x9, x10, lsl #2]".to_string());
        Ok(())
    }

    fn lower_vector_read(&mut self, target: &str, base: &str, index: &str) -> CompileResult<()> {
        let index_text = self.operand_value_text(index, 4)?;
        if let Some(Storage::Register(vector_addr)) = self.accessor.resolve_vector_base(&self.object, base) {
            self.insert_raw(format!("    adrp x9, {}", vector_addr));
        } else {
            let offset = self.frame.allocate(base, 8);
            self.insert_raw(format!("    add x9, sp, #{}", offset));
        }
        self.insert_raw(format!("    mov x10, {}", index_text));
        self.insert_raw("    ldr w11, [x9, x10, lsl #2]".to_string());
        let size = lookup_size(&self.object, &self.current_function, target).max(4);
        let dest = self.mem_operand(target, size);
        self.insert_raw(format!("    str w11, {}", dest));
        Ok(())
    }

    fn lower_binary_mov(&mut self, target: &str, lhs: &str, op: &str, rhs: &str) -> CompileResult<()> {
        let size = lookup_size(&self.object, &self.current_function, target).max(4);
        let lhs_reg = self.load_operand_into(lhs, "x9", size)?;
        match classify_operand(rhs) {
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    {} {}, {}, #{}", arith_mnemonic(op), lhs_reg, lhs_reg, value));
            }
            OperandShape::Name(name) if name.parse::<i64>().is_ok() => {
                self.insert_raw(format!("    {} {}, {}, #{}", arith_mnemonic(op), lhs_reg, lhs_reg, name));
            }
            _ => {
                let rhs_reg = self.load_operand_into(rhs, "x10", size)?;
                self.insert_raw(format!("    {} {}, {}, {}", arith_mnemonic(op), lhs_reg, lhs_reg, rhs_reg));
            }
        }
        let dest = self.mem_operand(target, size);
        self.insert_raw(format!("    str {}, {}", lhs_reg, dest));
        Ok(())
    }

    fn lower_compound_mov(&mut self, q: &Quadruple) -> CompileResult<()> {
        if self.object.vectors.contains_key(&q.s2) {
            return self.lower_vector_read(&q.s1, &q.s2, &q.s3);
        }
        if let Some((op, rhs)) = q.s3.split_once(' ') {
            return self.lower_binary_mov(&q.s1, &q.s2, op, rhs);
        }
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

        self.emit_function_prologue(name, self.frame.frame_size());
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

    fn call_arg_setup(&mut self, reg: &str, arg: &str) -> CompileResult<()> {
        match classify_operand(arg) {
            OperandShape::Immediate(value, crate::value::TypeLiteral::String(_), _) => {
                if let Some(idx) = self.object.string_pool.iter().position(|s| *s == value) {
                    self.insert_raw(format!("    adrp {}, ._L_str{}__@PAGE", reg, idx + 1));
                    self.insert_raw(format!("    add {}, {}, ._L_str{}__@PAGEOFF", reg, reg, idx + 1));
                }
            }
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    mov {}, #{}", reg, value));
            }
            OperandShape::Name(name) => {
                let size = lookup_size(&self.object, &self.current_function, &name);
                let mem = self.mem_operand(&name, size);
                let dest = reg_sized(reg, size);
                self.insert_raw(format!("    ldr {}, {}", dest, mem));
            }
            _ => {}
        }
        Ok(())
    }
}

impl IRVisitor for Arm64Backend {
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
        self.insert_raw(format!("    b {}", self.formatted_label(&q.s1)));
        Ok(())
    }

    fn from_jmp_e_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        self.insert_raw(format!("    b.eq {}", self.formatted_label(&q.s1)));
        Ok(())
    }

    fn from_cmp_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        if !q.s3.is_empty() {
            self.last_cmp_op = q.s3.clone();
        }
        let lhs_reg = self.load_operand_into(&q.s1, "x9", 4)?;
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
        self.insert_raw("    ldr x0, [sp], #16".to_string());
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
        self.insert_raw(format!("    bl {}", self.config.symbol_name(&q.s1)));
        Ok(())
    }

    fn from_return_ita(&mut self, q: &Quadruple) -> CompileResult<()> {
        if q.s1.is_empty() {
            return Ok(());
        }
        match classify_operand(&q.s1) {
            OperandShape::Immediate(value, _, _) => {
                self.insert_raw(format!("    mov w0, #{}", value));
            }
            OperandShape::Name(name) => {
                let size = lookup_size(&self.object, &self.current_function, &name).max(4);
                let mem = self.mem_operand(&name, size);
                let reg = reg_sized("x0", size);
                self.insert_raw(format!("    ldr {}, {}", reg, mem));
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

impl InstructionInserter for Arm64Backend {
    fn insert_raw(&mut self, line: impl Into<String>) {
        self.text.push(line.into());
    }

    fn insert_label(&mut self, label: &str) {
        self.text.push(format!("{}:", label));
    }

    fn insert_comment(&mut self, text: &str) {
        self.text.push(format!("    // {}", text));
    }
}

impl StorageEmitter for Arm64Backend {
    fn emit_program_preamble(&mut self) {
        match self.config.host {
            Host::Linux => self.text.push(".text".to_string()),
            Host::Darwin => self.text.push(".section __TEXT,__text,regular,pure_instructions".to_string()),
        }
    }

    fn emit_function_prologue(&mut self, name: &str, frame_size: i64) {
        let entry = self.entry_name(name);
        self.text.push(format!(".globl {}", entry));
        self.text.push(format!("{}:", entry));
        self.text.push(format!("    stp x29, x30, [sp, #-{}]!", frame_size));
        self.text.push("    mov x29, sp".to_string());
        for (i, reg) in RESERVED_CALLEE_SAVED.iter().enumerate() {
            self.text.push(format!("    str {}, [sp, #{}]", reg, 16 + i as i64 * 8));
        }
    }

    fn emit_function_epilogue(&mut self, name: &str) {
        let frame_size = self.frame.frame_size();
        let _ = name;
        self.text.push(format!("    ldp x29, x30, [sp], #{}", frame_size));
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

/// The AAPCS64 register used to pass the `n`th (0-indexed) integer
/// argument, when fewer than eight arguments are passed.
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
    fn frame_size_reserves_callee_saved_and_frame_pointer() {
        let frame = Arm64StackFrame::default();
        assert_eq!(frame.frame_size(), 32);
    }

    #[test]
    fn locals_grow_upward_from_reserved_region() {
        let mut frame = Arm64StackFrame::default();
        let first = frame.allocate("x", 4);
        let second = frame.allocate("y", 4);
        assert_eq!(first, 32);
        assert_eq!(second, 36);
    }

    #[test]
    fn main_is_renamed_to_entry_symbol() {
        let cfg = TargetConfig::resolve(Platform::Arm64, Host::Linux).unwrap();
        let mut backend = Arm64Backend::new(cfg);
        let object = Object::new();
        backend.lower_function("main", &[], &object).unwrap();
        let output = backend.finish();
        assert!(output.contains("_start:"));
    }

    #[test]
    fn argument_register_table_has_eight_slots() {
        assert_eq!(argument_register(0).unwrap(), "x0");
        assert_eq!(argument_register(7).unwrap(), "x7");
        assert!(argument_register(8).is_err());
    }

    #[test]
    fn main_leave_emits_exit_syscall_not_ret() {
        use crate::ita::make_quadruple;
        let cfg = TargetConfig::resolve(Platform::Arm64, Host::Linux).unwrap();
        let mut backend = Arm64Backend::new(cfg);
        let object = Object::new();
        let body = vec![make_quadruple(Instruction::Leave, "", "", "")];
        backend.lower_function("main", &body, &object).unwrap();
        let output = backend.finish();
        assert!(output.contains("mov x8, #93"));
        assert!(output.contains("svc #0"));
        assert!(!output.contains("    ret"));
    }
}
