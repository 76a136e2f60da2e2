//! Implements the VM's `eval`/`apply`/`qq` opcodes. Also carries the
//! smaller Lisp-integrated opcodes that don't fit `vm::dispatch`'s
//! register-arithmetic shape: `type`, `list`, `error`, `write`, `const`,
//! `get`, `set`.
//!
//! Deliberately does not grow into a full Scheme evaluator -- nested
//! function-call arguments (`(f (g x))`) are out of scope, since reading
//! and printing Lisp source is a job for an external reader/printer, not
//! this crate. `eval` only resolves the subset the VM's other opcodes can
//! already build without one: self-evaluating forms, bound symbols, and
//! single-level applications of a symbol-bound primitive or closure.

use alloc::vec::Vec;

use crate::value::{Cell, Heap, Value};
use crate::vm::{pack, reg, set_reg, unpack, Flow, Instr, Opcode, Vm, VmFault};

/// The `write` opcode's sink. Printing itself is the external
/// reader/printer's job; the VM only owns this interface.
pub trait Printer: Send {
    fn write_value(&mut self, heap: &Heap, v: Value);
}

/// `type`'s result code, one per `Cell` variant plus the three singletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum TypeTag {
    Nil = 0,
    True = 1,
    False = 2,
    Symbol = 3,
    Str = 4,
    Pair = 5,
    Fixnum = 6,
    Flonum = 7,
    Closure = 8,
    Macro = 9,
    Primitive = 10,
    Environment = 11,
    Error = 12,
    Pointer = 13,
}

fn type_tag(heap: &Heap, v: Value) -> TypeTag {
    match v {
        Value::Nil => TypeTag::Nil,
        Value::True => TypeTag::True,
        Value::False => TypeTag::False,
        Value::Ref(_) => match heap.get(v) {
            Some(Cell::Symbol(_)) => TypeTag::Symbol,
            Some(Cell::Str(_)) => TypeTag::Str,
            Some(Cell::Pair(..)) => TypeTag::Pair,
            Some(Cell::Fixnum(_)) => TypeTag::Fixnum,
            Some(Cell::Flonum(_)) => TypeTag::Flonum,
            Some(Cell::Closure { .. }) => TypeTag::Closure,
            Some(Cell::Macro { .. }) => TypeTag::Macro,
            Some(Cell::Primitive(_)) => TypeTag::Primitive,
            Some(Cell::Environment { .. }) => TypeTag::Environment,
            Some(Cell::Error(_)) => TypeTag::Error,
            Some(Cell::Pointer(_)) => TypeTag::Pointer,
            None => TypeTag::Nil,
        },
    }
}

/// Walks the environment chain (innermost frame first) for a binding.
fn lookup_env(heap: &Heap, env: Value, sym_id: u32) -> Option<Value> {
    let mut frame = env;
    loop {
        match heap.get(frame) {
            Some(Cell::Environment { parent, bindings }) => {
                if let Some((_, v)) = bindings.iter().find(|(id, _)| *id == sym_id) {
                    return Some(*v);
                }
                frame = *parent;
            }
            _ => return None,
        }
    }
}

/// `define`/assign semantics: overwrite an existing binding in `env`'s own
/// frame, or insert a new one. Does not walk `parent` -- matching `set`
/// being the VM's primitive for binding into the *current* frame, the way
/// `env` allocates one frame at a time rather than mutating an ancestor's.
fn bind_in_frame(heap: &mut Heap, env: Value, sym_id: u32, value: Value) -> Result<(), VmFault> {
    match heap.get_mut(env) {
        Some(Cell::Environment { bindings, .. }) => {
            if let Some(slot) = bindings.iter_mut().find(|(id, _)| *id == sym_id) {
                slot.1 = value;
            } else {
                bindings.push((sym_id, value));
            }
            Ok(())
        }
        _ => Err(VmFault::NotAPair),
    }
}

fn symbol_id(heap: &Heap, v: Value) -> Result<u32, VmFault> {
    match heap.get(v) {
        Some(Cell::Symbol(id)) => Ok(*id),
        _ => Err(VmFault::NotApplicable),
    }
}

/// Zips a parameter list with an argument list into binding pairs, both
/// proper lists of equal length; anything else is an arity mismatch.
fn bind_params(heap: &Heap, params: Value, args: Value) -> Result<Vec<(u32, Value)>, VmFault> {
    let mut bindings = Vec::new();
    let mut p = params;
    let mut a = args;
    loop {
        if p.is_nil() && a.is_nil() {
            return Ok(bindings);
        }
        match (heap.get(p), heap.get(a)) {
            (Some(Cell::Pair(ph, pt)), Some(Cell::Pair(ah, at))) => {
                let sym_id = symbol_id(heap, *ph)?;
                bindings.push((sym_id, *ah));
                p = *pt;
                a = *at;
            }
            _ => return Err(VmFault::ArityMismatch),
        }
    }
}

/// Shared by `apply` and `eval`'s pair case: invokes `fn_val` with an
/// already-evaluated `args` list, writing the result/new frame into `dst`.
///
/// Primitives follow the same calling convention as `trap`: the operand is
/// the packed `args` list, and by convention the host callback leaves its
/// return value in `r0` before returning (the VM has no other channel to
/// hand a value back from an opaque host call).
///
/// Closures push a new environment frame (parent = the closure's captured
/// environment, bindings = zipped params/args) into `dst`, set `LR` to the
/// instruction after this one, and jump `PC` to the closure's entry point
/// (the closure body is a boxed fixnum holding that entry's instruction
/// index). `ret` later restores the caller via `LR`, exactly as `blr` does.
fn apply_value(vm: &mut Vm, dst: u8, fn_val: Value, args: Value) -> Result<Flow, VmFault> {
    match vm.values.get(fn_val) {
        Some(Cell::Primitive(trap_id)) => {
            let trap_id = *trap_id;
            let operand = pack(args);
            if !vm.trap_table.contains(trap_id) {
                return Err(VmFault::TrapMiss(trap_id));
            }
            let mut table = core::mem::take(&mut vm.trap_table);
            let ok = table.invoke(vm, trap_id, operand).unwrap_or(false);
            vm.trap_table = table;
            if !ok {
                return Ok(Flow::Halt(false));
            }
            let result = reg(vm, 0)?;
            set_reg(vm, dst, result)?;
            Ok(Flow::Next)
        }
        Some(Cell::Closure { params, body, env }) => {
            let (params, body, env) = (*params, *body, *env);
            let bindings = bind_params(&vm.values, params, args)?;
            let frame = vm.values.alloc(Cell::Environment { parent: env, bindings });
            set_reg(vm, dst, pack(frame))?;
            let entry = match vm.values.get(body) {
                Some(Cell::Fixnum(n)) => *n as u32,
                _ => return Err(VmFault::NotApplicable),
            };
            vm.lr = vm.pc.wrapping_add(1);
            Ok(Flow::Jump(entry))
        }
        _ => Err(VmFault::NotApplicable),
    }
}

/// Self-evaluating forms and bound symbols, with no VM control-flow
/// effects -- the pure subset of `eval` that doesn't require a jump.
fn eval_simple(vm: &Vm, v: Value) -> Result<Value, VmFault> {
    match v {
        Value::Nil | Value::True | Value::False => Ok(v),
        Value::Ref(_) => match vm.values.get(v) {
            Some(Cell::Symbol(id)) => {
                lookup_env(&vm.values, vm.global_env, *id).ok_or(VmFault::UnboundSymbol(*id))
            }
            Some(Cell::Pair(..)) => Err(VmFault::NotApplicable),
            _ => Ok(v),
        },
    }
}

fn list_to_vec(heap: &Heap, mut list: Value) -> Result<Vec<Value>, VmFault> {
    let mut out = Vec::new();
    loop {
        if list.is_nil() {
            return Ok(out);
        }
        match heap.get(list) {
            Some(Cell::Pair(car, cdr)) => {
                out.push(*car);
                list = *cdr;
            }
            _ => return Err(VmFault::NotAPair),
        }
    }
}

fn vec_to_list(heap: &mut Heap, items: &[Value]) -> Value {
    let mut list = Value::Nil;
    for item in items.iter().rev() {
        list = heap.cons(*item, list);
    }
    list
}

/// If `v` is `(unquote x)` or `(unquote-splicing x)`, returns
/// `(is_splicing, x)`.
fn as_unquote(heap: &Heap, v: Value) -> Option<(bool, Value)> {
    let Cell::Pair(head, tail) = heap.get(v)? else { return None };
    let Cell::Symbol(id) = heap.get(*head)? else { return None };
    let name = heap.interner.get(*id)?;
    let is_unquote = name.as_ref() == "unquote".as_bytes();
    let is_splicing = name.as_ref() == "unquote-splicing".as_bytes();
    if !is_unquote && !is_splicing {
        return None;
    }
    let Cell::Pair(arg, _) = heap.get(*tail)? else { return None };
    Some((is_splicing, *arg))
}

fn append_lists(heap: &mut Heap, a: Value, b: Value) -> Result<Value, VmFault> {
    let items = list_to_vec(heap, a)?;
    let mut result = b;
    for item in items.iter().rev() {
        result = heap.cons(*item, result);
    }
    Ok(result)
}

/// Quasiquote: a non-pair is returned unchanged (as `qt` does). A pair is
/// walked recursively; a sub-form `(unquote x)` is replaced by `eval(x)`;
/// `(unquote-splicing x)` evaluates `x` (which must produce a proper list)
/// and splices it into the surrounding list in place of the one element.
/// Nested quasiquote is not unwound -- an inner `quasiquote` sub-form is
/// walked like any other list, not specially depth-tracked (matching the
/// crate's explicit non-goal of a full reader).
fn quasiquote(vm: &mut Vm, form: Value) -> Result<Value, VmFault> {
    let (head, tail) = match vm.values.get(form) {
        Some(Cell::Pair(head, tail)) => (*head, *tail),
        _ => return Ok(form),
    };
    if let Some((_, arg)) = as_unquote(&vm.values, form) {
        // `form` itself is an unquote form in a position with no
        // surrounding list to splice into (e.g. a dotted pair's tail) --
        // evaluate directly, same as plain unquote.
        return eval_simple(vm, arg);
    }
    if let Some((true, arg)) = as_unquote(&vm.values, head) {
        let spliced = eval_simple(vm, arg)?;
        let rest = quasiquote(vm, tail)?;
        return append_lists(&mut vm.values, spliced, rest);
    }
    let head_q = if let Some((false, arg)) = as_unquote(&vm.values, head) {
        eval_simple(vm, arg)?
    } else {
        quasiquote(vm, head)?
    };
    let rest = quasiquote(vm, tail)?;
    Ok(vm.values.cons(head_q, rest))
}

pub(crate) fn dispatch(vm: &mut Vm, instr: &Instr) -> Result<Flow, VmFault> {
    match instr.opcode {
        Opcode::TypeOf => {
            let v = unpack(reg(vm, instr.regs[1])?);
            let tag = type_tag(&vm.values, v) as u64;
            set_reg(vm, instr.regs[0], tag)?;
            Ok(Flow::Next)
        }
        Opcode::ListOp => {
            let start = instr.regs[1];
            let count = instr.imm as usize;
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                let r = start
                    .checked_add(i as u8)
                    .ok_or(VmFault::RegisterOutOfRange(start))?;
                items.push(unpack(reg(vm, r)?));
            }
            let list = vec_to_list(&mut vm.values, &items);
            set_reg(vm, instr.regs[0], pack(list))?;
            Ok(Flow::Next)
        }
        Opcode::Eval => {
            let src = unpack(reg(vm, instr.regs[1])?);
            match vm.values.get(src) {
                Some(Cell::Pair(head, tail)) => {
                    let (head, tail) = (*head, *tail);
                    let sym_id = symbol_id(&vm.values, head)?;
                    let fn_val = lookup_env(&vm.values, vm.global_env, sym_id)
                        .ok_or(VmFault::UnboundSymbol(sym_id))?;
                    let arg_forms = list_to_vec(&vm.values, tail)?;
                    let mut evaluated = Vec::with_capacity(arg_forms.len());
                    for form in arg_forms {
                        evaluated.push(eval_simple(vm, form)?);
                    }
                    let args = vec_to_list(&mut vm.values, &evaluated);
                    apply_value(vm, instr.regs[0], fn_val, args)
                }
                _ => {
                    let result = eval_simple(vm, src)?;
                    set_reg(vm, instr.regs[0], pack(result))?;
                    Ok(Flow::Next)
                }
            }
        }
        Opcode::Apply => {
            let src = unpack(reg(vm, instr.regs[1])?);
            let (fn_val, args) = match vm.values.get(src) {
                Some(Cell::Pair(car, cdr)) => (*car, *cdr),
                _ => return Err(VmFault::NotAPair),
            };
            apply_value(vm, instr.regs[0], fn_val, args)
        }
        Opcode::ErrorOp => {
            let id = reg(vm, instr.regs[1])? as u32;
            let v = vm.values.alloc(Cell::Error(id));
            set_reg(vm, instr.regs[0], pack(v))?;
            Ok(Flow::Next)
        }
        Opcode::Write => {
            let v = unpack(reg(vm, instr.regs[1])?);
            let mut printer = vm.printer.take();
            let had_sink = printer.is_some();
            if let Some(p) = printer.as_mut() {
                p.write_value(&vm.values, v);
            }
            vm.printer = printer;
            set_reg(vm, instr.regs[0], had_sink as u64)?;
            Ok(Flow::Next)
        }
        Opcode::Const => {
            let id = instr.imm as u32;
            let v = vm.values.constant(id).unwrap_or(Value::Nil);
            set_reg(vm, instr.regs[0], pack(v))?;
            Ok(Flow::Next)
        }
        Opcode::Get => {
            let sym = unpack(reg(vm, instr.regs[1])?);
            let id = symbol_id(&vm.values, sym)?;
            let v = lookup_env(&vm.values, vm.global_env, id).ok_or(VmFault::UnboundSymbol(id))?;
            set_reg(vm, instr.regs[0], pack(v))?;
            Ok(Flow::Next)
        }
        Opcode::Set => {
            let sym = unpack(reg(vm, instr.regs[0])?);
            let id = symbol_id(&vm.values, sym)?;
            let value = unpack(reg(vm, instr.regs[1])?);
            let env = vm.global_env;
            bind_in_frame(&mut vm.values, env, id, value)?;
            Ok(Flow::Next)
        }
        Opcode::Qq => {
            let src = unpack(reg(vm, instr.regs[1])?);
            let result = quasiquote(vm, src)?;
            set_reg(vm, instr.regs[0], pack(result))?;
            Ok(Flow::Next)
        }
        _ => Err(VmFault::UnknownOpcode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc_rt::Allocator;
    use crate::vm::{Instr, Opcode as Op, VmConfig};

    fn vm() -> Vm {
        Vm::new(VmConfig::default(), Allocator::new_system())
    }

    #[test]
    fn eval_self_evaluating_fixnum_is_identity() {
        let mut vm = vm();
        vm.reset();
        let n = vm.values.alloc(Cell::Fixnum(42));
        vm.regs[1] = pack(n);
        let instr = Instr::reg2(Op::Eval, 0, 1);
        dispatch(&mut vm, &instr).unwrap();
        assert!(matches!(vm.values.get(unpack(vm.regs[0])), Some(Cell::Fixnum(42))));
    }

    #[test]
    fn get_set_round_trip_through_global_env() {
        let mut vm = vm();
        vm.reset();
        let sym = vm.values.symbol("x");
        let val = vm.values.alloc(Cell::Fixnum(7));
        vm.regs[0] = pack(sym);
        vm.regs[1] = pack(val);
        dispatch(&mut vm, &Instr::reg2(Op::Set, 0, 1)).unwrap();

        vm.regs[1] = pack(sym);
        dispatch(&mut vm, &Instr::reg2(Op::Get, 2, 1)).unwrap();
        assert!(matches!(vm.values.get(unpack(vm.regs[2])), Some(Cell::Fixnum(7))));
    }

    #[test]
    fn get_unbound_symbol_fails() {
        let mut vm = vm();
        vm.reset();
        let sym = vm.values.symbol("undefined");
        vm.regs[1] = pack(sym);
        assert!(matches!(
            dispatch(&mut vm, &Instr::reg2(Op::Get, 0, 1)),
            Err(VmFault::UnboundSymbol(_))
        ));
    }

    #[test]
    fn type_of_distinguishes_pair_and_fixnum() {
        let mut vm = vm();
        vm.reset();
        let n = vm.values.alloc(Cell::Fixnum(1));
        let pair = vm.values.cons(n, Value::Nil);
        vm.regs[1] = pack(n);
        dispatch(&mut vm, &Instr::reg2(Op::TypeOf, 0, 1)).unwrap();
        assert_eq!(vm.regs[0], TypeTag::Fixnum as u64);
        vm.regs[1] = pack(pair);
        dispatch(&mut vm, &Instr::reg2(Op::TypeOf, 0, 1)).unwrap();
        assert_eq!(vm.regs[0], TypeTag::Pair as u64);
    }

    #[test]
    fn qq_without_unquote_is_structural_copy() {
        let mut vm = vm();
        vm.reset();
        let a = vm.values.alloc(Cell::Fixnum(1));
        let b = vm.values.alloc(Cell::Fixnum(2));
        let list = vm.values.cons(a, vm.values.cons(b, Value::Nil));
        vm.regs[1] = pack(list);
        dispatch(&mut vm, &Instr::reg2(Op::Qq, 0, 1)).unwrap();
        assert!(vm.values.equal(unpack(vm.regs[0]), list));
    }

    #[test]
    fn apply_primitive_uses_r0_return_convention() {
        let mut vm = vm();
        vm.reset();
        let trap_id = 9;
        vm.trap_table.register(
            trap_id,
            alloc::boxed::Box::new(move |vm: &mut Vm, operand: u64| {
                let args = unpack(operand);
                let doubled = match vm.values.get(args) {
                    Some(Cell::Pair(car, _)) => match vm.values.get(*car) {
                        Some(Cell::Fixnum(n)) => *n * 2,
                        _ => 0,
                    },
                    _ => 0,
                };
                let v = vm.values.alloc(Cell::Fixnum(doubled));
                vm.regs[0] = pack(v);
                true
            }),
        );
        let primitive = vm.values.alloc(Cell::Primitive(trap_id));
        let arg = vm.values.alloc(Cell::Fixnum(21));
        let args = vm.values.cons(arg, Value::Nil);
        let call = vm.values.cons(primitive, args);
        vm.regs[1] = pack(call);
        dispatch(&mut vm, &Instr::reg2(Op::Apply, 2, 1)).unwrap();
        assert!(matches!(vm.values.get(unpack(vm.regs[2])), Some(Cell::Fixnum(42))));
    }
}
