/// Generated-Code Surface
///
/// The code generator emits calls keyed on operator token strings. Those
/// strings stop here: they are parsed once into `InfixOp` / `PrefixOp`
/// and everything below dispatches on the enum. Unknown operator names
/// log a debug line and fall back to the left operand (infix) or the
/// operand itself (prefix).
///
/// The `&`/`|`/`^` family is bitwise when both operands are integers and
/// logical (on truthiness) as soon as a non-integer operand, typically a
/// boolean, is involved.

use std::io::{Read, Write};

use num_bigint::BigInt;
use num_traits::{Pow, Signed, ToPrimitive};

use crate::core::arena::Arena;
use crate::core::bignum::{decimal_scale, load_int, rational_parts, wrap_int};
use crate::core::value::{
    self, bool_value, is_integer, is_truthy, make_buffer, str_slice, str_to_string, type_name,
    HeapTag, Value, ERROR, FALSE, TRUE, UNUSED,
};
use crate::errors::RtError;
use crate::flow;
use crate::ops;
use crate::resource;
use crate::runtime;
use crate::table;

pub use crate::core::value::call;

// ---------------------------------------------------------------------------
// Operator tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Dot,
    Query,
    Coalesce,
    Elvis,
    Pair,
    Comma,
    Flow,
}

impl InfixOp {
    pub fn parse(name: &str) -> Option<InfixOp> {
        Some(match name {
            "+" => InfixOp::Add,
            "-" => InfixOp::Sub,
            "*" => InfixOp::Mul,
            "/" => InfixOp::Div,
            "%" => InfixOp::Mod,
            "**" => InfixOp::Pow,
            "=" => InfixOp::Eq,
            "<>" => InfixOp::Ne,
            "<" => InfixOp::Lt,
            "<=" => InfixOp::Le,
            ">" => InfixOp::Gt,
            ">=" => InfixOp::Ge,
            "&&" => InfixOp::AndAnd,
            "||" => InfixOp::OrOr,
            "&" => InfixOp::BitAnd,
            "|" => InfixOp::BitOr,
            "^" => InfixOp::BitXor,
            "<<" => InfixOp::Shl,
            ">>" => InfixOp::Shr,
            "." => InfixOp::Dot,
            "?" => InfixOp::Query,
            "??" => InfixOp::Coalesce,
            "?:" => InfixOp::Elvis,
            ":" => InfixOp::Pair,
            "," => InfixOp::Comma,
            "->" => InfixOp::Flow,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Neg,
    Not,
    BitNot,
    Inc,
    Dec,
    Instantiate,
}

impl PrefixOp {
    pub fn parse(name: &str) -> Option<PrefixOp> {
        Some(match name {
            "-" => PrefixOp::Neg,
            "!" => PrefixOp::Not,
            "~" => PrefixOp::BitNot,
            "++" => PrefixOp::Inc,
            "--" => PrefixOp::Dec,
            "@" => PrefixOp::Instantiate,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Infix dispatch
// ---------------------------------------------------------------------------

pub fn op_infix(arena: &Arena, op: InfixOp, left: Value, right: Value) -> Value {
    match op {
        InfixOp::Add => ops::add(arena, left, right),
        InfixOp::Sub => ops::sub(arena, left, right),
        InfixOp::Mul => ops::mul(arena, left, right),
        InfixOp::Div => ops::div(arena, left, right),
        InfixOp::Mod => ops::modulo(arena, left, right),
        InfixOp::Pow => ops::pow(arena, left, right),

        InfixOp::Eq => ops::eq(arena, left, right),
        InfixOp::Ne => ops::ne(arena, left, right),
        InfixOp::Lt => ops::lt(arena, left, right),
        InfixOp::Le => ops::le(arena, left, right),
        InfixOp::Gt => ops::gt(arena, left, right),
        InfixOp::Ge => ops::ge(arena, left, right),

        InfixOp::AndAnd => logical(left, right, |a, b| a && b),
        InfixOp::OrOr => logical(left, right, |a, b| a || b),
        InfixOp::BitAnd => bitwise(arena, left, right, |a, b| a & b, |a, b| a & b, |a, b| a && b),
        InfixOp::BitOr => bitwise(arena, left, right, |a, b| a | b, |a, b| a | b, |a, b| a || b),
        InfixOp::BitXor => bitwise(arena, left, right, |a, b| a ^ b, |a, b| a ^ b, |a, b| a ^ b),
        InfixOp::Shl => shift(arena, left, right, true),
        InfixOp::Shr => shift(arena, left, right, false),

        InfixOp::Dot => table::get(left, right),
        InfixOp::Query => table::get(right, left),

        // `??` treats the error sentinel as the fallback trigger; `?:`
        // falls back on anything falsy.
        InfixOp::Coalesce => {
            if left.is_error() {
                right
            } else {
                left
            }
        }
        InfixOp::Elvis => {
            if is_truthy(left) {
                left
            } else {
                right
            }
        }

        InfixOp::Pair => table::make_pair(arena, left, right),
        InfixOp::Comma => {
            if left.is_heap(HeapTag::Table) && !table::is_pair(left) {
                table::push(arena, left, right);
                left
            } else {
                table::make_list(arena, &[left, right])
            }
        }

        InfixOp::Flow => flow::flow(arena, left, right),
    }
}

/// String-keyed entry point for generated code.
pub fn op_infix_str(arena: &Arena, name: &str, left: Value, right: Value) -> Value {
    match InfixOp::parse(name) {
        Some(op) => op_infix(arena, op, left, right),
        None => {
            tracing::debug!(op = name, "unknown infix operator");
            left
        }
    }
}

fn logical(left: Value, right: Value, f: fn(bool, bool) -> bool) -> Value {
    if left.is_error() || right.is_error() {
        return ERROR;
    }
    bool_value(f(is_truthy(left), is_truthy(right)))
}

/// Bitwise for integer pairs, logical otherwise.
fn bitwise(
    arena: &Arena,
    left: Value,
    right: Value,
    ints: fn(i64, i64) -> i64,
    bigs: fn(BigInt, BigInt) -> BigInt,
    bools: fn(bool, bool) -> bool,
) -> Value {
    if left.is_error() || right.is_error() {
        return ERROR;
    }
    if is_integer(left) && is_integer(right) {
        if left.is_small() && right.is_small() {
            // Bitwise combinations of sign-extended 62-bit values stay in
            // range.
            return Value::small(ints(left.as_small(), right.as_small()));
        }
        let z = bigs(load_int(left), load_int(right));
        return wrap_int(arena, &z);
    }
    bool_value(bools(is_truthy(left), is_truthy(right)))
}

fn shift(arena: &Arena, left: Value, right: Value, shl: bool) -> Value {
    if left.is_error() || right.is_error() {
        return ERROR;
    }
    if !is_integer(left) || !is_integer(right) {
        return ERROR;
    }
    let count = if right.is_small() {
        let n = right.as_small();
        if n < 0 {
            return ERROR;
        }
        n as u64
    } else {
        match load_int(right).to_u64() {
            Some(n) => n,
            None => return ERROR,
        }
    };
    // A shift count beyond u32 is a domain violation, not a request for
    // gigabytes of limbs.
    let Ok(count) = u32::try_from(count) else {
        return ERROR;
    };
    let z = load_int(left);
    let r = if shl { z << count as usize } else { z >> count as usize };
    wrap_int(arena, &r)
}

// ---------------------------------------------------------------------------
// Prefix dispatch
// ---------------------------------------------------------------------------

pub fn op_prefix(arena: &Arena, op: PrefixOp, operand: Value) -> Value {
    match op {
        PrefixOp::Neg => ops::neg(arena, operand),
        PrefixOp::Not => {
            if operand.is_error() {
                ERROR
            } else {
                bool_value(!is_truthy(operand))
            }
        }
        PrefixOp::BitNot => {
            if operand.is_error() || !is_integer(operand) {
                return ERROR;
            }
            if operand.is_small() {
                // !n == -n - 1; closed over the 62-bit range.
                return Value::small(!operand.as_small());
            }
            wrap_int(arena, &!load_int(operand))
        }
        PrefixOp::Inc => ops::add(arena, operand, Value::small(1)),
        PrefixOp::Dec => ops::sub(arena, operand, Value::small(1)),
        PrefixOp::Instantiate => {
            if resource::is_def(operand) {
                resource::instantiate(arena, operand)
            } else {
                // `@` on anything but a definition is identity.
                operand
            }
        }
    }
}

pub fn op_prefix_str(arena: &Arena, name: &str, operand: Value) -> Value {
    match PrefixOp::parse(name) {
        Some(op) => op_prefix(arena, op, operand),
        None => {
            tracing::debug!(op = name, "unknown prefix operator");
            operand
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic formatter
// ---------------------------------------------------------------------------

fn format_decimal(v: Value) -> String {
    let (n, d) = rational_parts(v);
    let scale = decimal_scale(v) as u32;
    if scale == 0 {
        return (n / d).to_string();
    }
    let scaled = n * BigInt::from(10u32).pow(scale) / d;
    let sign = if scaled.is_negative() { "-" } else { "" };
    let mag = scaled.abs().to_string();
    let mag = format!("{:0>width$}", mag, width = scale as usize + 1);
    let split = mag.len() - scale as usize;
    format!("{}{}.{}", sign, &mag[..split], &mag[split..])
}

fn format_item(v: Value) -> String {
    match v.heap_tag() {
        Some(HeapTag::Str) => format!("\"{}\"", str_to_string(v)),
        Some(HeapTag::Table) => "[...]".to_string(),
        _ => format_value(v),
    }
}

/// Render a value for diagnostics: numbers and strings as content, lists
/// bracketed, resources and iterators as opaque tags.
pub fn format_value(v: Value) -> String {
    if v.is_small() {
        return v.as_small().to_string();
    }
    if v == TRUE {
        return "true".to_string();
    }
    if v == FALSE {
        return "false".to_string();
    }
    if v == ERROR {
        return "Error".to_string();
    }
    if v == UNUSED {
        return "Unused".to_string();
    }
    match v.heap_tag() {
        Some(HeapTag::BigInt) => load_int(v).to_string(),
        Some(HeapTag::Rational) => {
            let (n, d) = rational_parts(v);
            format!("{}/{}", n, d)
        }
        Some(HeapTag::Decimal) => format_decimal(v),
        Some(HeapTag::Str) => str_to_string(v),
        Some(HeapTag::Table) => {
            let len = table::next_index(v);
            let items: Vec<String> = (0..len)
                .map(|i| format_item(table::get(v, Value::small(i as i64))))
                .collect();
            format!("[{}]", items.join(" "))
        }
        Some(HeapTag::Func) => "<Function>".to_string(),
        Some(HeapTag::Closure) => "<Closure>".to_string(),
        Some(HeapTag::ResourceDef) => "<Resource Definition>".to_string(),
        Some(HeapTag::ResourceInst) => "<Resource Instance>".to_string(),
        Some(HeapTag::Iter) => "<Iterator>".to_string(),
        Some(HeapTag::ArenaHandle) => "<Arena>".to_string(),
        Some(HeapTag::ErrorObj) => "Error".to_string(),
        None => format!("<{}>", type_name(v)),
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_value(*self))
    }
}

pub fn print(v: Value) -> Value {
    println!("{}", format_value(v));
    v
}

// ---------------------------------------------------------------------------
// Syscall bridge
// ---------------------------------------------------------------------------

/// Zero-filled string buffer for `read`.
pub fn buffer_new(arena: &Arena, size: i64) -> Value {
    if size < 0 {
        return ERROR;
    }
    make_buffer(arena, size as usize)
}

fn arg(args: Value, i: i64) -> Value {
    table::get(args, Value::small(i))
}

fn arg_small(args: Value, i: i64) -> Result<i64, RtError> {
    let v = arg(args, i);
    if v.is_small() {
        Ok(v.as_small())
    } else {
        Err(RtError::BadSyscallArgs)
    }
}

/// Thin host bridge. `args` is a table whose first element names the
/// call: "read", "write", "arena_create", "arena_release". Failures fold
/// into the error sentinel.
pub fn syscall(arena: &Arena, args: Value) -> Value {
    match syscall_impl(arena, args) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "syscall failed");
            ERROR
        }
    }
}

fn syscall_impl(arena: &Arena, args: Value) -> Result<Value, RtError> {
    if !args.is_heap(HeapTag::Table) {
        return Err(RtError::BadSyscallArgs);
    }
    let name_v = arg(args, 0);
    if !name_v.is_heap(HeapTag::Str) {
        return Err(RtError::BadSyscallArgs);
    }
    let name = str_to_string(name_v);

    match name.as_str() {
        // ("read", fd, buffer, size)
        "read" => {
            let fd = arg_small(args, 1)?;
            let buf = arg(args, 2);
            let size = arg_small(args, 3)?;
            if fd != 0 {
                return Err(RtError::BadFd(fd));
            }
            if !buf.is_heap(HeapTag::Str) || size < 0 {
                return Err(RtError::BadSyscallArgs);
            }
            let bytes = unsafe { value::str_slice_mut(buf) };
            let limit = (size as usize).min(bytes.len());
            let n = std::io::stdin().read(&mut bytes[..limit])?;
            Ok(Value::small(n as i64))
        }

        // ("write", fd, data, len); len -1 writes the whole payload
        "write" => {
            let fd = arg_small(args, 1)?;
            let data = arg(args, 2);
            let len = arg_small(args, 3)?;

            let owned;
            let bytes: &[u8] = if data.is_heap(HeapTag::Str) {
                let s = unsafe { str_slice(data) };
                if len == -1 {
                    // Buffers are zero-filled; stop at the first NUL the
                    // way the generated code expects.
                    let end = s.iter().position(|&b| b == 0).unwrap_or(s.len());
                    &s[..end]
                } else {
                    &s[..(len.max(0) as usize).min(s.len())]
                }
            } else {
                owned = format_value(data);
                let s = owned.as_bytes();
                if len == -1 {
                    s
                } else {
                    &s[..(len.max(0) as usize).min(s.len())]
                }
            };

            let n = bytes.len();
            match fd {
                1 => std::io::stdout().write_all(bytes)?,
                2 => std::io::stderr().write_all(bytes)?,
                other => return Err(RtError::BadFd(other)),
            }
            Ok(Value::small(n as i64))
        }

        // ("arena_create") → opaque handle
        "arena_create" => {
            let slot = runtime::registry_create();
            Ok(runtime::make_arena_handle(arena, slot))
        }

        // ("arena_release", handle)
        "arena_release" => {
            let handle = arg(args, 1);
            if !runtime::is_arena_handle(handle) {
                return Err(RtError::BadHandle);
            }
            let slot = unsafe { (*(handle.obj() as *const runtime::ArenaHandleObj)).slot };
            if runtime::registry_release(slot) {
                Ok(TRUE)
            } else {
                Err(RtError::BadHandle)
            }
        }

        other => Err(RtError::UnknownSyscall(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
