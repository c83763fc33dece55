use crate::ast::{HoistedSymbols, SymbolKind};
use crate::error::{CompileError, CompileResult};
use crate::ita::{Instruction, Instructions, Quadruple};
use crate::table::{Function, Object, Vector};
use crate::value::{Literal, TypeLiteral};

/// Walks a flat quadruple stream exactly once, splitting it into function
/// bodies and top-level vector/global declarations, and checking every
/// assignment and call it dispatches along the way.
pub struct TableBuilder<'a> {
    hoisted: &'a HoistedSymbols,
    object: Object,
}

impl<'a> TableBuilder<'a> {
    pub fn new(hoisted: &'a HoistedSymbols) -> Self {
        Self {
            hoisted,
            object: Object::new(),
        }
    }

    pub fn build(mut self, instructions: &Instructions) -> CompileResult<Object> {
        let mut current: Option<Function> = None;

        for q in instructions {
            match q.op {
                Instruction::FuncStart => {
                    current = Some(Function::new(q.s1.clone()));
                }
                Instruction::FuncEnd => {
                    if let Some(func) = current.take() {
                        self.object.functions.insert(func.name.clone(), func);
                    } else {
                        return Err(CompileError::ir("func_end without matching func_start", &q.s1));
                    }
                }
                Instruction::Globl if current.is_none() => {
                    self.build_top_level_global(&q.s1)?;
                }
                Instruction::Mov if current.is_none() => {
                    self.build_top_level_vector_element(q)?;
                }
                _ => {
                    if let Some(func) = current.as_mut() {
                        func.body.push(q.clone());
                        self.dispatch_in_function(func, q)?;
                    }
                }
            }
        }

        if current.is_some() {
            return Err(CompileError::ir("function body missing func_end", ""));
        }

        Ok(self.object)
    }

    fn build_top_level_global(&mut self, name: &str) -> CompileResult<()> {
        match self.hoisted.get(name).map(|e| e.kind) {
            Some(SymbolKind::VectorDefinition) => {
                self.object
                    .vectors
                    .entry(name.to_string())
                    .or_insert_with(|| Vector::new(name));
            }
            _ => {
                self.object.globals.set_symbol(name, Literal::word());
            }
        }
        Ok(())
    }

    /// A top-level `mov v[index] value` quadruple records one element of a
    /// vector's static initializer list.
    fn build_top_level_vector_element(&mut self, q: &Quadruple) -> CompileResult<()> {
        let Some(open) = q.s1.find('[') else {
            return Ok(());
        };
        let (base, rest) = q.s1.split_at(open);
        let index_str = rest.trim_start_matches('[').trim_end_matches(']');
        let Ok(index) = index_str.parse::<u32>() else {
            return Ok(());
        };
        if let Some(s) = string_literal_from_operand(&q.s2) {
            self.object.intern_string(&s);
        }
        let literal = literal_from_operand(&q.s2);
        self.object
            .vectors
            .entry(base.to_string())
            .or_insert_with(|| Vector::new(base))
            .elements
            .insert(index, literal);
        Ok(())
    }

    fn dispatch_in_function(&mut self, func: &mut Function, q: &Quadruple) -> CompileResult<()> {
        match q.op {
            Instruction::Locl => {
                func.locals.set_symbol(&q.s1, Literal::word());
                if q.s2 == "pointer" {
                    func.locals.set_pointer(&q.s1, Vec::new());
                }
                func.frame.allocate(&q.s1, TypeLiteral::Word.size() as i64);
            }
            Instruction::Label => {
                func.labels.push(q.s1.clone());
            }
            Instruction::Mov => self.from_mov_ita_instruction(func, q)?,
            Instruction::Call => self.from_call_ita_instruction(q)?,
            Instruction::Push => {
                if let Some(s) = string_literal_from_operand(&q.s1) {
                    self.object.intern_string(&s);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The four assignment shapes a `mov` quadruple can take: a compiler
    /// temporary, a plain scalar, an indexed vector element, or a pointer
    /// indirection.
    fn from_mov_ita_instruction(&mut self, func: &mut Function, q: &Quadruple) -> CompileResult<()> {
        if let Some(s) = string_literal_from_operand(&q.s2) {
            self.object.intern_string(&s);
        }
        if q.s1.starts_with("_t") {
            func.temporaries.insert(q.s1.clone(), infer_operand_type(&q.s2));
            if self.object.vectors.contains_key(&q.s2) {
                self.check_vector_assignment(&q.s2, &q.s3, q)?;
            }
            return Ok(());
        }
        if let Some(target) = q.s1.strip_prefix('*') {
            return self.check_indirect_assignment(func, target, q);
        }
        if let Some(open) = q.s1.find('[') {
            let (base, rest) = q.s1.split_at(open);
            let index_str = rest.trim_start_matches('[').trim_end_matches(']');
            return self.check_vector_assignment(base, index_str, q);
        }
        self.check_scalar_assignment(func, &q.s1, &q.s2, q)
    }

    fn check_scalar_assignment(
        &self,
        func: &mut Function,
        name: &str,
        rhs: &str,
        q: &Quadruple,
    ) -> CompileResult<()> {
        let declared = func
            .locals
            .get_symbol(name)
            .ok()
            .cloned()
            .or_else(|| self.object.globals.get_symbol(name).ok().cloned());
        let Some(declared) = declared else {
            return Ok(());
        };
        if matches!(declared.ty, TypeLiteral::Word) {
            // Untyped until the first concrete assignment narrows it; a
            // back-end needs the real size to size its stack slot.
            let rhs_ty = infer_operand_type(rhs);
            if !matches!(rhs_ty, TypeLiteral::Word) && func.locals.is_defined(name) {
                func.locals.set_symbol(name, Literal { value: crate::value::ValueKind::Monostate, ty: rhs_ty });
            }
            return Ok(());
        }
        let rhs_ty = infer_operand_type(rhs);
        if !declared.ty.same_size_class(&rhs_ty) {
            return Err(CompileError::type_mismatch(
                format!(
                    "cannot assign '{}' ({}) to '{}' ({})",
                    rhs, rhs_ty, name, declared.ty
                ),
                name,
            ));
        }
        let _ = q;
        Ok(())
    }

    fn check_vector_assignment(&self, base: &str, index_str: &str, q: &Quadruple) -> CompileResult<()> {
        let Some(vector) = self.object.vectors.get(base) else {
            return Ok(());
        };
        if let Some(index) = parse_index_operand(index_str) {
            if !vector.is_empty() && !vector.in_bounds(index) {
                return Err(CompileError::out_of_range(
                    format!("index {} exceeds declared size of '{}'", index, base),
                    base,
                ));
            }
        }
        let _ = q;
        Ok(())
    }

    fn check_indirect_assignment(&self, func: &Function, target: &str, q: &Quadruple) -> CompileResult<()> {
        let is_pointer = func.locals.is_pointer(target) || self.object.globals.is_pointer(target);
        let is_known_local = func.locals.is_defined(target) || self.object.globals.is_defined(target);
        if is_known_local && !is_pointer {
            return Err(CompileError::type_mismatch(
                format!("'{}' is not a pointer and cannot be dereferenced for assignment", target),
                target,
            ));
        }
        let _ = q;
        Ok(())
    }

    /// Validates call arity; `printf` is the sole variadic exception, and
    /// `print` requires exactly one buffer argument.
    fn from_call_ita_instruction(&self, q: &Quadruple) -> CompileResult<()> {
        let name = q.s1.as_str();
        if name == "printf" {
            return Ok(());
        }
        let argc: usize = q.s2.parse().unwrap_or(0);
        if name == "print" {
            if argc != 1 {
                return Err(CompileError::arity_mismatch(
                    format!("'print' expects exactly one buffer argument, got {}", argc),
                    name,
                ));
            }
            return Ok(());
        }
        if let Some(entry) = self.hoisted.get(name) {
            if let Some(declared) = entry.extra.get("params").and_then(|v| v.as_array()) {
                if declared.len() != argc {
                    return Err(CompileError::arity_mismatch(
                        format!(
                            "'{}' expects {} argument(s), got {}",
                            name,
                            declared.len(),
                            argc
                        ),
                        name,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Parse a vector index operand, accepting both a bare integer and the
/// `"(value:type:size)"` immediate-operand form.
fn parse_index_operand(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let rest = s.strip_prefix('(')?;
    let end = rest.find(')')?;
    rest[..end].split(':').next()?.parse().ok()
}

/// Extract the string payload from a `"(value:string:size)"` operand, for
/// interning call arguments and assignments into the literal pool.
fn string_literal_from_operand(operand: &str) -> Option<String> {
    let rest = operand.strip_prefix('(')?;
    let end = rest.find(')')?;
    let parts: Vec<&str> = rest[..end].splitn(3, ':').collect();
    if parts.len() == 3 && parts[1] == "string" {
        Some(parts[0].to_string())
    } else {
        None
    }
}

/// Parse the `"(value:type:size)"` operand form back into a `Literal`, for
/// recording vector initializer elements.
fn literal_from_operand(operand: &str) -> Literal {
    let Some(rest) = operand.strip_prefix('(') else {
        return Literal::word();
    };
    let Some(end) = rest.find(')') else {
        return Literal::word();
    };
    let parts: Vec<&str> = rest[..end].splitn(3, ':').collect();
    if parts.len() != 3 {
        return Literal::word();
    }
    match parts[1] {
        "int" => parts[0].parse().map(Literal::int).unwrap_or_else(|_| Literal::word()),
        "long" => parts[0].parse().map(Literal::long).unwrap_or_else(|_| Literal::word()),
        "float" => parts[0].parse().map(Literal::float).unwrap_or_else(|_| Literal::word()),
        "double" => parts[0].parse().map(Literal::double).unwrap_or_else(|_| Literal::word()),
        "bool" => Literal::bool(parts[0] == "1"),
        "char" => parts[0].chars().next().map(Literal::char).unwrap_or_else(Literal::null),
        "string" => Literal::string(parts[0]),
        _ => Literal::word(),
    }
}

fn infer_operand_type(operand: &str) -> TypeLiteral {
    if let Some(rest) = operand.strip_prefix('(') {
        if let Some(end) = rest.find(')') {
            let inner = &rest[..end];
            let parts: Vec<&str> = inner.splitn(3, ':').collect();
            if parts.len() == 3 {
                return match parts[1] {
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
            }
        }
    }
    TypeLiteral::Word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ita::make_quadruple;

    fn quads(ops: Vec<Quadruple>) -> Instructions {
        ops
    }

    #[test]
    fn splits_function_bodies_by_func_start_end() {
        let hoisted = HoistedSymbols::new();
        let instrs = quads(vec![
            make_quadruple(Instruction::FuncStart, "main", "", ""),
            make_quadruple(Instruction::Locl, "x", "", ""),
            make_quadruple(Instruction::FuncEnd, "main", "", ""),
        ]);
        let object = TableBuilder::new(&hoisted).build(&instrs).unwrap();
        assert!(object.functions.contains_key("main"));
        assert!(object.functions["main"].locals.is_defined("x"));
    }

    #[test]
    fn func_end_without_start_is_error() {
        let hoisted = HoistedSymbols::new();
        let instrs = quads(vec![make_quadruple(Instruction::FuncEnd, "main", "", "")]);
        assert!(TableBuilder::new(&hoisted).build(&instrs).is_err());
    }

    #[test]
    fn temporary_assignment_is_recorded_not_type_checked() {
        let hoisted = HoistedSymbols::new();
        let instrs = quads(vec![
            make_quadruple(Instruction::FuncStart, "f", "", ""),
            make_quadruple(Instruction::Mov, "_t0", "(1:int:4)", ""),
            make_quadruple(Instruction::FuncEnd, "f", "", ""),
        ]);
        let object = TableBuilder::new(&hoisted).build(&instrs).unwrap();
        assert_eq!(object.functions["f"].temporaries["_t0"], TypeLiteral::Int);
    }

    #[test]
    fn print_requires_single_argument() {
        let hoisted = HoistedSymbols::new();
        let instrs = quads(vec![
            make_quadruple(Instruction::FuncStart, "f", "", ""),
            make_quadruple(Instruction::Push, "(1:int:4)", "", ""),
            make_quadruple(Instruction::Push, "(2:int:4)", "", ""),
            make_quadruple(Instruction::Call, "print", "2", ""),
            make_quadruple(Instruction::FuncEnd, "f", "", ""),
        ]);
        let err = TableBuilder::new(&hoisted).build(&instrs).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ArityMismatch);
    }

    #[test]
    fn printf_is_exempt_from_arity_checking() {
        let hoisted = HoistedSymbols::new();
        let instrs = quads(vec![
            make_quadruple(Instruction::FuncStart, "f", "", ""),
            make_quadruple(Instruction::Call, "printf", "5", ""),
            make_quadruple(Instruction::FuncEnd, "f", "", ""),
        ]);
        assert!(TableBuilder::new(&hoisted).build(&instrs).is_ok());
    }

    #[test]
    fn vector_index_out_of_range_is_caught() {
        let hoisted = HoistedSymbols::new();
        let mut builder = TableBuilder::new(&hoisted);
        let mut v = Vector::new("table");
        v.elements.insert(0, Literal::int(1));
        v.elements.insert(1, Literal::int(2));
        builder.object.vectors.insert("table".to_string(), v);
        let instrs = quads(vec![
            make_quadruple(Instruction::FuncStart, "f", "", ""),
            make_quadruple(Instruction::Mov, "table[5]", "(9:int:4)", ""),
            make_quadruple(Instruction::FuncEnd, "f", "", ""),
        ]);
        let err = builder.build(&instrs).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::OutOfRange);
    }

    #[test]
    fn pushed_string_literal_is_interned_once() {
        let hoisted = HoistedSymbols::new();
        let instrs = quads(vec![
            make_quadruple(Instruction::FuncStart, "main", "", ""),
            make_quadruple(Instruction::Push, "(hi:string:3)", "", ""),
            make_quadruple(Instruction::Call, "print", "1", ""),
            make_quadruple(Instruction::Push, "(hi:string:3)", "", ""),
            make_quadruple(Instruction::Call, "print", "1", ""),
            make_quadruple(Instruction::FuncEnd, "main", "", ""),
        ]);
        let object = TableBuilder::new(&hoisted).build(&instrs).unwrap();
        assert_eq!(object.string_pool, vec!["hi".to_string()]);
    }
}
