/// Big-Number Glue
///
/// The numeric tower computes with `num_bigint::BigInt` scratch values and
/// materializes results into arena storage:
///
///   • scratch values live on the Rust heap for the duration of one
///     operation and are dropped normally;
///   • results land in the arena as inline u32 limbs behind the standard
///     heap header, reclaimed in bulk with everything else.
///
/// A thread-local slot names the arena of the fiber that is currently
/// running. The scheduler stores into it on every resume; scoped
/// middleware switches it temporarily through `ArenaSwitch`. Fibers never
/// migrate threads, so a plain `thread_local!` is the whole story.
///
/// Rationals are a pair of canonical integer Values (immediate or BigInt,
/// gcd 1, positive denominator); a Decimal is the same pair plus a display
/// scale. A rational whose denominator reduces to 1 is rewrapped as an
/// integer at construction, never stored.

use std::cell::RefCell;
use std::rc::Rc;

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

use crate::core::arena::Arena;
use crate::core::value::{
    alloc_header, small_fits, HeapTag, Header, Value, ERROR,
};

// ---------------------------------------------------------------------------
// Current-fiber arena slot
// ---------------------------------------------------------------------------

thread_local! {
    static CURRENT_ARENA: RefCell<Option<Rc<Arena>>> = RefCell::new(None);
}

/// Install the current fiber's arena; returns the previous occupant.
pub fn set_current(arena: Option<Rc<Arena>>) -> Option<Rc<Arena>> {
    CURRENT_ARENA.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), arena))
}

/// The arena of the fiber currently running on this thread.
pub fn current() -> Option<Rc<Arena>> {
    CURRENT_ARENA.with(|slot| slot.borrow().clone())
}

/// Scoped switch of the current arena. Restores the previous arena on
/// drop; used by scoped middleware around upstream pulls.
pub struct ArenaSwitch {
    prev: Option<Rc<Arena>>,
}

impl ArenaSwitch {
    pub fn new(arena: Rc<Arena>) -> ArenaSwitch {
        ArenaSwitch { prev: set_current(Some(arena)) }
    }
}

impl Drop for ArenaSwitch {
    fn drop(&mut self) {
        set_current(self.prev.take());
    }
}

// ---------------------------------------------------------------------------
// BigInt storage
// ---------------------------------------------------------------------------

/// Arbitrary-precision integer: sign byte, limb count, then little-endian
/// u32 limbs inline. Never holds a value that fits 62 bits; `wrap_int`
/// normalizes those to immediates.
#[repr(C)]
pub struct BigIntObj {
    pub header: Header,
    pub sign: i8,
    _pad: [u8; 3],
    pub len: u32,
}

/// Materialize an integer result: immediate if it fits 62 bits, arena
/// BigInt otherwise.
pub fn wrap_int(arena: &Arena, z: &BigInt) -> Value {
    if let Some(n) = z.to_i64() {
        if small_fits(n) {
            return Value::small(n);
        }
    }
    let (sign, digits) = z.to_u32_digits();
    let total = std::mem::size_of::<BigIntObj>() + digits.len() * 4;
    let obj = alloc_header(arena, HeapTag::BigInt, total) as *mut BigIntObj;
    unsafe {
        (*obj).sign = match sign {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        };
        (*obj)._pad = [0; 3];
        (*obj).len = digits.len() as u32;
        let limbs = (obj as *mut u8).add(std::mem::size_of::<BigIntObj>()) as *mut u32;
        std::ptr::copy_nonoverlapping(digits.as_ptr(), limbs, digits.len());
        Value::from_obj(obj as *mut Header)
    }
}

/// Load any integer value (immediate or BigInt) into a scratch `BigInt`.
pub fn load_int(v: Value) -> BigInt {
    if v.is_small() {
        return BigInt::from(v.as_small());
    }
    debug_assert!(v.is_heap(HeapTag::BigInt));
    unsafe {
        let obj = v.obj() as *const BigIntObj;
        let limbs = (obj as *const u8).add(std::mem::size_of::<BigIntObj>()) as *const u32;
        let digits = std::slice::from_raw_parts(limbs, (*obj).len as usize);
        let sign = match (*obj).sign {
            s if s < 0 => Sign::Minus,
            0 => Sign::NoSign,
            _ => Sign::Plus,
        };
        BigInt::from_slice(sign, digits)
    }
}

/// Rewrap a BigInt value as an immediate when it fits; anything else is
/// returned unchanged.
pub fn normalize_int(v: Value) -> Value {
    if !v.is_heap(HeapTag::BigInt) {
        return v;
    }
    let z = load_int(v);
    if let Some(n) = z.to_i64() {
        if small_fits(n) {
            return Value::small(n);
        }
    }
    v
}

// ---------------------------------------------------------------------------
// Rational and Decimal storage
// ---------------------------------------------------------------------------

/// Canonical rational: numerator and denominator as normalized integer
/// Values, gcd 1, denominator > 1.
#[repr(C)]
pub struct RationalObj {
    pub header: Header,
    pub num: Value,
    pub den: Value,
}

/// Exact decimal: canonical rational value plus the number of digits
/// after the point used for display and result scales.
#[repr(C)]
pub struct DecimalObj {
    pub header: Header,
    pub num: Value,
    pub den: Value,
    pub scale: i32,
    _pad2: i32,
}

/// Reduce `num/den` to canonical form. Returns `None` for a zero
/// denominator.
fn canonicalize(mut num: BigInt, mut den: BigInt) -> Option<(BigInt, BigInt)> {
    if den.is_zero() {
        return None;
    }
    if den.is_negative() {
        num = -num;
        den = -den;
    }
    let g = num.gcd(&den);
    if !g.is_one() {
        num /= &g;
        den /= &g;
    }
    Some((num, den))
}

/// Wrap a rational result: canonicalize, rewrap as integer when the
/// denominator reduces to 1. Zero denominator yields the error sentinel.
pub fn wrap_rational(arena: &Arena, num: BigInt, den: BigInt) -> Value {
    let Some((num, den)) = canonicalize(num, den) else {
        return ERROR;
    };
    if den.is_one() {
        return wrap_int(arena, &num);
    }
    let obj = alloc_header(arena, HeapTag::Rational, std::mem::size_of::<RationalObj>())
        as *mut RationalObj;
    unsafe {
        (*obj).num = wrap_int(arena, &num);
        (*obj).den = wrap_int(arena, &den);
        Value::from_obj(obj as *mut Header)
    }
}

/// Wrap a decimal result. Decimals stay decimals even when the value is a
/// whole number; the scale is preserved for display.
pub fn wrap_decimal(arena: &Arena, num: BigInt, den: BigInt, scale: i32) -> Value {
    let Some((num, den)) = canonicalize(num, den) else {
        return ERROR;
    };
    let obj = alloc_header(arena, HeapTag::Decimal, std::mem::size_of::<DecimalObj>())
        as *mut DecimalObj;
    unsafe {
        (*obj).num = wrap_int(arena, &num);
        (*obj).den = wrap_int(arena, &den);
        (*obj).scale = scale.max(0);
        (*obj)._pad2 = 0;
        Value::from_obj(obj as *mut Header)
    }
}

/// Numerator and denominator of a Rational or Decimal as scratch values.
pub fn rational_parts(v: Value) -> (BigInt, BigInt) {
    match v.heap_tag() {
        Some(HeapTag::Rational) => unsafe {
            let obj = v.obj() as *const RationalObj;
            (load_int((*obj).num), load_int((*obj).den))
        },
        Some(HeapTag::Decimal) => unsafe {
            let obj = v.obj() as *const DecimalObj;
            (load_int((*obj).num), load_int((*obj).den))
        },
        _ => unreachable!("rational_parts on {}", crate::core::value::type_name(v)),
    }
}

/// Any numeric value as an exact `num/den` pair with positive denominator.
pub fn load_rat(v: Value) -> (BigInt, BigInt) {
    if v.is_small() || v.is_heap(HeapTag::BigInt) {
        (load_int(v), BigInt::one())
    } else {
        rational_parts(v)
    }
}

/// Display scale of a value; zero for anything that is not a Decimal.
pub fn decimal_scale(v: Value) -> i32 {
    if v.is_heap(HeapTag::Decimal) {
        unsafe { (*(v.obj() as *const DecimalObj)).scale }
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Literal constructors (generated-code surface)
// ---------------------------------------------------------------------------

/// Integer literal: immediate when it fits 62 bits, BigInt otherwise.
pub fn int_from_str(arena: &Arena, s: &str) -> Value {
    if let Ok(n) = s.parse::<i64>() {
        if small_fits(n) {
            return Value::small(n);
        }
    }
    match s.parse::<BigInt>() {
        Ok(z) => wrap_int(arena, &z),
        Err(_) => {
            tracing::debug!(literal = s, "bad integer literal");
            ERROR
        }
    }
}

/// BigInt literal, normalized like every other integer result.
pub fn bigint_from_str(arena: &Arena, s: &str) -> Value {
    int_from_str(arena, s)
}

pub fn bigint_from_i64(arena: &Arena, n: i64) -> Value {
    wrap_int(arena, &BigInt::from(n))
}

/// Rational literal from numerator/denominator strings; canonicalizes.
pub fn rational_from_strs(arena: &Arena, num: &str, den: &str) -> Value {
    match (num.parse::<BigInt>(), den.parse::<BigInt>()) {
        (Ok(n), Ok(d)) => wrap_rational(arena, n, d),
        _ => {
            tracing::debug!(num, den, "bad rational literal");
            ERROR
        }
    }
}

/// Decimal literal: "3.14" becomes 314/100 with scale 2; "-0.5" becomes
/// -1/2 with scale 1; a bare integer gets scale 0.
pub fn decimal_from_str(arena: &Arena, s: &str) -> Value {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        tracing::debug!(literal = s, "bad decimal literal");
        return ERROR;
    }
    let digits_ok =
        int_part.chars().all(|c| c.is_ascii_digit()) && frac_part.chars().all(|c| c.is_ascii_digit());
    if !digits_ok {
        tracing::debug!(literal = s, "bad decimal literal");
        return ERROR;
    }

    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    let mut num = if digits.is_empty() {
        BigInt::zero()
    } else {
        digits.parse::<BigInt>().unwrap_or_else(|_| BigInt::zero())
    };
    if negative {
        num = -num;
    }
    let scale = frac_part.len() as i32;
    let den = BigInt::from(10u32).pow(scale as u32);
    wrap_decimal(arena, num, den, scale)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
