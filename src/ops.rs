/// Numeric Dispatch
///
/// Promotion matrix (commutative):
///
///   Int      ∘ Int      → Int
///   Int      ∘ Rational → Rational
///   Rational ∘ Rational → Rational
///   anything ∘ Decimal  → Decimal
///
/// Binary operations take the fast path when both operands are immediate
/// integers: checked i64 arithmetic, falling through to the BigInt path on
/// 62-bit overflow. Every slow-path integer result is normalized: a
/// BigInt whose value fits 62 bits is never returned, and a rational whose
/// denominator reduces to 1 comes back as an integer.
///
/// The error sentinel is sticky: any operand equal to it produces it.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Pow, Signed, ToPrimitive, Zero};

use crate::core::arena::Arena;
use crate::core::bignum::{
    decimal_scale, load_int, load_rat, wrap_decimal, wrap_int, wrap_rational,
};
use crate::core::value::{bool_value, is_numeric, small_fits, HeapTag, Value, ERROR};

// ---------------------------------------------------------------------------
// Category dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumCat {
    Small,
    Big,
    Rational,
    Decimal,
    None,
}

fn category(v: Value) -> NumCat {
    if v.is_small() {
        return NumCat::Small;
    }
    match v.heap_tag() {
        Some(HeapTag::BigInt) => NumCat::Big,
        Some(HeapTag::Rational) => NumCat::Rational,
        Some(HeapTag::Decimal) => NumCat::Decimal,
        _ => NumCat::None,
    }
}

#[inline(always)]
fn is_int_cat(c: NumCat) -> bool {
    matches!(c, NumCat::Small | NumCat::Big)
}

// ---------------------------------------------------------------------------
// Add / Sub / Mul (shared promotion ladder)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
}

impl Arith {
    #[inline(always)]
    fn small(self, a: i64, b: i64) -> Option<i64> {
        match self {
            Arith::Add => a.checked_add(b),
            Arith::Sub => a.checked_sub(b),
            Arith::Mul => a.checked_mul(b),
        }
    }

    fn big(self, a: &BigInt, b: &BigInt) -> BigInt {
        match self {
            Arith::Add => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
        }
    }

    /// Exact rational arithmetic on (num, den) pairs.
    fn rational(self, a: (BigInt, BigInt), b: (BigInt, BigInt)) -> (BigInt, BigInt) {
        let (an, ad) = a;
        let (bn, bd) = b;
        match self {
            Arith::Add => (&an * &bd + &bn * &ad, ad * bd),
            Arith::Sub => (&an * &bd - &bn * &ad, ad * bd),
            Arith::Mul => (an * bn, ad * bd),
        }
    }

    /// Result scale when a Decimal is involved.
    fn scale(self, sa: i32, sb: i32) -> i32 {
        match self {
            Arith::Add | Arith::Sub => sa.max(sb),
            Arith::Mul => sa + sb,
        }
    }
}

fn arith(arena: &Arena, a: Value, b: Value, op: Arith) -> Value {
    // Fast path: both immediate integers.
    if a.is_small() && b.is_small() {
        if let Some(r) = op.small(a.as_small(), b.as_small()) {
            if small_fits(r) {
                return Value::small(r);
            }
        }
        // 62-bit overflow: redo in arbitrary precision.
        let z = op.big(&BigInt::from(a.as_small()), &BigInt::from(b.as_small()));
        return wrap_int(arena, &z);
    }

    if a.is_error() || b.is_error() {
        return ERROR;
    }

    let (ca, cb) = (category(a), category(b));
    if ca == NumCat::None || cb == NumCat::None {
        return ERROR;
    }

    // Integer ∘ Integer (at least one BigInt).
    if is_int_cat(ca) && is_int_cat(cb) {
        let z = op.big(&load_int(a), &load_int(b));
        return wrap_int(arena, &z);
    }

    // Decimal involved → Decimal result.
    if ca == NumCat::Decimal || cb == NumCat::Decimal {
        let (num, den) = op.rational(load_rat(a), load_rat(b));
        let scale = op.scale(decimal_scale(a), decimal_scale(b));
        return wrap_decimal(arena, num, den, scale);
    }

    // Rational path.
    let (num, den) = op.rational(load_rat(a), load_rat(b));
    wrap_rational(arena, num, den)
}

pub fn add(arena: &Arena, a: Value, b: Value) -> Value {
    arith(arena, a, b, Arith::Add)
}

pub fn sub(arena: &Arena, a: Value, b: Value) -> Value {
    arith(arena, a, b, Arith::Sub)
}

pub fn mul(arena: &Arena, a: Value, b: Value) -> Value {
    arith(arena, a, b, Arith::Mul)
}

// ---------------------------------------------------------------------------
// Division
// ---------------------------------------------------------------------------

/// Integer ÷ Integer gives an integer when exact, a canonical rational
/// otherwise. Any Decimal involvement gives a Decimal. Division by exact
/// zero, in any representation, is the error sentinel.
pub fn div(arena: &Arena, a: Value, b: Value) -> Value {
    if a.is_error() || b.is_error() {
        return ERROR;
    }
    if b.is_small() && b.as_small() == 0 {
        return ERROR;
    }
    if b.is_heap(HeapTag::BigInt) && load_int(b).is_zero() {
        return ERROR;
    }

    let (ca, cb) = (category(a), category(b));
    if ca == NumCat::None || cb == NumCat::None {
        return ERROR;
    }

    if is_int_cat(ca) && is_int_cat(cb) {
        let za = load_int(a);
        let zb = load_int(b);
        let (quo, rem) = za.div_rem(&zb);
        if rem.is_zero() {
            return wrap_int(arena, &quo);
        }
        return wrap_rational(arena, za, zb);
    }

    let (an, ad) = load_rat(a);
    let (bn, bd) = load_rat(b);
    if bn.is_zero() {
        return ERROR;
    }
    let num = an * &bd;
    let den = ad * bn;

    if ca == NumCat::Decimal || cb == NumCat::Decimal {
        let mut scale = decimal_scale(a);
        if scale == 0 {
            scale = decimal_scale(b);
        }
        if scale == 0 {
            scale = 1;
        }
        return wrap_decimal(arena, num, den, scale);
    }
    wrap_rational(arena, num, den)
}

// ---------------------------------------------------------------------------
// Modulo
// ---------------------------------------------------------------------------

/// Integers only. The immediate fast path keeps C truncation semantics;
/// the big path is always non-negative (GMP `mpz_mod` convention). The
/// two agree for non-negative operands.
pub fn modulo(arena: &Arena, a: Value, b: Value) -> Value {
    if a.is_error() || b.is_error() {
        return ERROR;
    }

    let (ca, cb) = (category(a), category(b));
    if !(is_int_cat(ca) && is_int_cat(cb)) {
        return ERROR;
    }
    if b.is_small() && b.as_small() == 0 {
        return ERROR;
    }

    if a.is_small() && b.is_small() {
        return Value::small(a.as_small() % b.as_small());
    }

    let za = load_int(a);
    let zb = load_int(b);
    if zb.is_zero() {
        return ERROR;
    }
    let r = za.mod_floor(&zb.abs());
    wrap_int(arena, &r)
}

// ---------------------------------------------------------------------------
// Negation
// ---------------------------------------------------------------------------

/// Type-preserving negation; integer normalization applies.
pub fn neg(arena: &Arena, a: Value) -> Value {
    if a.is_error() {
        return ERROR;
    }

    if a.is_small() {
        let sa = a.as_small();
        if let Some(r) = sa.checked_neg() {
            if small_fits(r) {
                return Value::small(r);
            }
        }
        // -SMALL_MIN does not fit 62 bits.
        return wrap_int(arena, &-BigInt::from(sa));
    }

    match category(a) {
        NumCat::None => ERROR,
        NumCat::Big => wrap_int(arena, &-load_int(a)),
        NumCat::Decimal => {
            let (n, d) = load_rat(a);
            wrap_decimal(arena, -n, d, decimal_scale(a))
        }
        _ => {
            let (n, d) = load_rat(a);
            wrap_rational(arena, -n, d)
        }
    }
}

// ---------------------------------------------------------------------------
// Power
// ---------------------------------------------------------------------------

/// Exponent must be a non-negative integer that fits 64 bits. Rational
/// and Decimal bases use (p/q)^n = p^n / q^n; a Decimal base multiplies
/// its scale by the exponent.
pub fn pow(arena: &Arena, base: Value, exp: Value) -> Value {
    if base.is_error() || exp.is_error() {
        return ERROR;
    }

    let e: u64 = if exp.is_small() {
        let se = exp.as_small();
        if se < 0 {
            return ERROR;
        }
        se as u64
    } else if exp.is_heap(HeapTag::BigInt) {
        let z = load_int(exp);
        if z.is_negative() {
            return ERROR;
        }
        match z.to_u64() {
            Some(e) => e,
            None => return ERROR,
        }
    } else {
        return ERROR;
    };

    let cb = category(base);
    if cb == NumCat::None {
        return ERROR;
    }

    if is_int_cat(cb) {
        let z = Pow::pow(load_int(base), e);
        return wrap_int(arena, &z);
    }

    let (n, d) = load_rat(base);
    let num = Pow::pow(n, e);
    let den = Pow::pow(d, e);
    if cb == NumCat::Decimal {
        wrap_decimal(arena, num, den, decimal_scale(base) * e as i32)
    } else {
        wrap_rational(arena, num, den)
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Exact numeric ordering via the common rational form.
fn cmp_numeric(a: Value, b: Value) -> Ordering {
    if a.is_small() && b.is_small() {
        return a.as_small().cmp(&b.as_small());
    }
    let (an, ad) = load_rat(a);
    let (bn, bd) = load_rat(b);
    // Denominators are positive, so cross-multiplication preserves order.
    (an * bd).cmp(&(bn * ad))
}

/// `=`: exact numeric equality; identity on the tagged bits otherwise.
pub fn eq(_arena: &Arena, a: Value, b: Value) -> Value {
    if a.is_error() || b.is_error() {
        return ERROR;
    }
    if !is_numeric(a) || !is_numeric(b) {
        return bool_value(a == b);
    }
    bool_value(cmp_numeric(a, b) == Ordering::Equal)
}

/// `<>`: negation of `=`, same identity fallback.
pub fn ne(_arena: &Arena, a: Value, b: Value) -> Value {
    if a.is_error() || b.is_error() {
        return ERROR;
    }
    if !is_numeric(a) || !is_numeric(b) {
        return bool_value(a != b);
    }
    bool_value(cmp_numeric(a, b) != Ordering::Equal)
}

fn ordered(a: Value, b: Value, test: fn(Ordering) -> bool) -> Value {
    if a.is_error() || b.is_error() {
        return ERROR;
    }
    if !is_numeric(a) || !is_numeric(b) {
        return ERROR;
    }
    bool_value(test(cmp_numeric(a, b)))
}

pub fn lt(_arena: &Arena, a: Value, b: Value) -> Value {
    ordered(a, b, Ordering::is_lt)
}

pub fn le(_arena: &Arena, a: Value, b: Value) -> Value {
    ordered(a, b, Ordering::is_le)
}

pub fn gt(_arena: &Arena, a: Value, b: Value) -> Value {
    ordered(a, b, Ordering::is_gt)
}

pub fn ge(_arena: &Arena, a: Value, b: Value) -> Value {
    ordered(a, b, Ordering::is_ge)
}

// ---------------------------------------------------------------------------
// Tests (mirroring the runtime's reference vectors)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bignum::{
        bigint_from_i64, bigint_from_str, decimal_from_str, rational_from_strs,
    };
    use crate::core::value::{make_string, SMALL_MAX, SMALL_MIN, TRUE, FALSE};

    fn small(n: i64) -> Value {
        Value::small(n)
    }

    fn assert_rational(v: Value, num: i64, den: i64) {
        assert!(v.is_heap(HeapTag::Rational), "expected Rational, got {:?}", v);
        let (n, d) = crate::core::bignum::rational_parts(v);
        assert_eq!(n, BigInt::from(num));
        assert_eq!(d, BigInt::from(den));
    }

    fn assert_decimal_value(v: Value, num: i64, den: i64) {
        assert!(v.is_heap(HeapTag::Decimal), "expected Decimal, got {:?}", v);
        let (n, d) = crate::core::bignum::rational_parts(v);
        assert_eq!(n * den, BigInt::from(num) * d);
    }

    #[test]
    fn small_int_basics() {
        let arena = Arena::new(65536);
        assert_eq!(add(&arena, small(3), small(4)), small(7));
        assert_eq!(sub(&arena, small(10), small(3)), small(7));
        assert_eq!(mul(&arena, small(6), small(7)), small(42));
        assert_eq!(modulo(&arena, small(10), small(3)), small(1));
        assert_eq!(neg(&arena, small(42)), small(-42));
    }

    #[test]
    fn div_exact_is_integer() {
        let arena = Arena::new(65536);
        assert_eq!(div(&arena, small(10), small(2)), small(5));
    }

    #[test]
    fn div_inexact_is_rational() {
        let arena = Arena::new(65536);
        assert_rational(div(&arena, small(3), small(2)), 3, 2);
    }

    #[test]
    fn div_by_zero_is_error() {
        let arena = Arena::new(65536);
        assert_eq!(div(&arena, small(1), small(0)), ERROR);
    }

    #[test]
    fn add_overflow_to_bigint() {
        let arena = Arena::new(65536);
        let r = add(&arena, small(SMALL_MAX), small(1));
        assert!(r.is_heap(HeapTag::BigInt));
        assert_eq!(load_int(r), BigInt::from(SMALL_MAX) + 1);
    }

    #[test]
    fn sub_overflow_to_bigint() {
        let arena = Arena::new(65536);
        let r = sub(&arena, small(SMALL_MIN), small(1));
        assert!(r.is_heap(HeapTag::BigInt));
        assert_eq!(load_int(r), BigInt::from(SMALL_MIN) - 1);
    }

    #[test]
    fn mul_overflow_to_bigint() {
        let arena = Arena::new(65536);
        let r = mul(&arena, small(SMALL_MAX), small(2));
        assert!(r.is_heap(HeapTag::BigInt));
    }

    #[test]
    fn bigint_add() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "99999999999999999999");
        let b = bigint_from_str(&arena, "1");
        let r = add(&arena, a, b);
        assert!(r.is_heap(HeapTag::BigInt));
        assert_eq!(load_int(r), "100000000000000000000".parse::<BigInt>().unwrap());
    }

    #[test]
    fn bigint_result_normalizes_when_it_fits() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "99999999999999999999");
        let b = bigint_from_str(&arena, "-99999999999999999957");
        assert_eq!(add(&arena, a, b), small(42));
    }

    #[test]
    fn sub_bigint_small() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "100000000000000000000");
        let r = sub(&arena, a, small(1));
        assert_eq!(load_int(r), "99999999999999999999".parse::<BigInt>().unwrap());
    }

    #[test]
    fn sub_rationals() {
        let arena = Arena::new(65536);
        let a = rational_from_strs(&arena, "5", "6");
        let b = rational_from_strs(&arena, "1", "3");
        assert_rational(sub(&arena, a, b), 1, 2);
    }

    #[test]
    fn sub_decimals() {
        let arena = Arena::new(65536);
        let a = decimal_from_str(&arena, "5.5");
        let b = decimal_from_str(&arena, "2.3");
        assert_decimal_value(sub(&arena, a, b), 32, 10);
    }

    #[test]
    fn sub_int_decimal_promotes() {
        let arena = Arena::new(65536);
        let r = sub(&arena, small(3), decimal_from_str(&arena, "1.5"));
        assert_decimal_value(r, 3, 2);
    }

    #[test]
    fn sub_int_rational_promotes() {
        let arena = Arena::new(65536);
        let r = sub(&arena, small(2), rational_from_strs(&arena, "1", "3"));
        assert_rational(r, 5, 3);
    }

    #[test]
    fn mul_bigints() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "99999999999999999999");
        let b = bigint_from_str(&arena, "2");
        assert_eq!(
            load_int(mul(&arena, a, b)),
            "199999999999999999998".parse::<BigInt>().unwrap()
        );
    }

    #[test]
    fn mul_rationals_reduce() {
        let arena = Arena::new(65536);
        let a = rational_from_strs(&arena, "2", "3");
        let b = rational_from_strs(&arena, "3", "4");
        assert_rational(mul(&arena, a, b), 1, 2);
    }

    #[test]
    fn mul_decimals_scale_adds() {
        let arena = Arena::new(65536);
        let a = decimal_from_str(&arena, "1.5");
        let b = decimal_from_str(&arena, "2.0");
        let r = mul(&arena, a, b);
        assert_decimal_value(r, 3, 1);
        assert_eq!(decimal_scale(r), 2);
    }

    #[test]
    fn mul_int_rational_promotes() {
        let arena = Arena::new(65536);
        let r = mul(&arena, small(3), rational_from_strs(&arena, "1", "2"));
        assert_rational(r, 3, 2);
    }

    #[test]
    fn div_bigint_exact() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "100000000000000000000");
        let b = bigint_from_str(&arena, "2");
        let r = div(&arena, a, b);
        assert!(r.is_heap(HeapTag::BigInt));
        assert_eq!(load_int(r), "50000000000000000000".parse::<BigInt>().unwrap());
    }

    #[test]
    fn div_bigint_inexact_is_rational() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "100000000000000000000");
        let b = bigint_from_str(&arena, "3");
        assert!(div(&arena, a, b).is_heap(HeapTag::Rational));
    }

    #[test]
    fn div_bigint_zero_is_error() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "123");
        let b = bigint_from_i64(&arena, 0);
        assert_eq!(div(&arena, a, b), ERROR);
    }

    #[test]
    fn div_rationals() {
        let arena = Arena::new(65536);
        let a = rational_from_strs(&arena, "1", "2");
        let b = rational_from_strs(&arena, "1", "3");
        assert_rational(div(&arena, a, b), 3, 2);
    }

    #[test]
    fn div_decimals() {
        let arena = Arena::new(65536);
        let a = decimal_from_str(&arena, "7.5");
        let b = decimal_from_str(&arena, "2.5");
        assert_decimal_value(div(&arena, a, b), 3, 1);
    }

    #[test]
    fn div_decimal_scale_rule() {
        let arena = Arena::new(65536);
        // scale(a) wins; falls back to scale(b); falls back to 1.
        let a = decimal_from_str(&arena, "7.50");
        let b = decimal_from_str(&arena, "2.5");
        assert_eq!(decimal_scale(div(&arena, a, b)), 2);
        let r = div(&arena, small(3), decimal_from_str(&arena, "1.5"));
        assert_eq!(decimal_scale(r), 1);
    }

    #[test]
    fn div_rational_zero_is_error() {
        let arena = Arena::new(65536);
        let a = rational_from_strs(&arena, "1", "2");
        let b = rational_from_strs(&arena, "0", "1");
        // 0/1 canonicalizes to the integer 0.
        assert_eq!(div(&arena, a, b), ERROR);
    }

    #[test]
    fn div_decimal_zero_is_error() {
        let arena = Arena::new(65536);
        let a = decimal_from_str(&arena, "1.5");
        let b = decimal_from_str(&arena, "0.0");
        assert_eq!(div(&arena, a, b), ERROR);
    }

    #[test]
    fn div_roundtrips_through_mul() {
        let arena = Arena::new(65536);
        for (a, b) in [(7i64, 3i64), (10, 4), (-9, 2), (100, 7)] {
            let q = div(&arena, small(a), small(b));
            assert_eq!(mul(&arena, q, small(b)), small(a), "{}/{}", a, b);
        }
    }

    #[test]
    fn mod_bigint() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "100000000000000000003");
        assert_eq!(modulo(&arena, a, small(10)), small(3));
    }

    #[test]
    fn mod_zero_is_error() {
        let arena = Arena::new(65536);
        assert_eq!(modulo(&arena, small(10), small(0)), ERROR);
    }

    #[test]
    fn mod_non_integer_is_error() {
        let arena = Arena::new(65536);
        let r = rational_from_strs(&arena, "1", "2");
        let d = decimal_from_str(&arena, "1.5");
        assert_eq!(modulo(&arena, r, small(1)), ERROR);
        assert_eq!(modulo(&arena, d, small(1)), ERROR);
    }

    #[test]
    fn mod_small_keeps_truncation_sign() {
        let arena = Arena::new(65536);
        // The immediate fast path mirrors C `%`: sign follows the dividend.
        assert_eq!(modulo(&arena, small(-7), small(3)), small(-1));
    }

    #[test]
    fn neg_all_types() {
        let arena = Arena::new(65536);
        let big = bigint_from_str(&arena, "99999999999999999999");
        assert_eq!(load_int(neg(&arena, big)), "-99999999999999999999".parse::<BigInt>().unwrap());

        assert_rational(neg(&arena, rational_from_strs(&arena, "3", "4")), -3, 4);

        let d = neg(&arena, decimal_from_str(&arena, "1.5"));
        assert_decimal_value(d, -3, 2);
        assert_eq!(decimal_scale(d), 1);
    }

    #[test]
    fn neg_small_min_overflows_to_bigint() {
        let arena = Arena::new(65536);
        let r = neg(&arena, small(SMALL_MIN));
        assert!(r.is_heap(HeapTag::BigInt));
        assert_eq!(load_int(r), -BigInt::from(SMALL_MIN));
    }

    #[test]
    fn rational_add_reduces() {
        let arena = Arena::new(65536);
        let a = rational_from_strs(&arena, "1", "3");
        let b = rational_from_strs(&arena, "1", "6");
        assert_rational(add(&arena, a, b), 1, 2);
    }

    #[test]
    fn rational_sum_collapses_to_integer() {
        let arena = Arena::new(65536);
        let a = rational_from_strs(&arena, "2", "3");
        let b = rational_from_strs(&arena, "1", "3");
        assert_eq!(add(&arena, a, b), small(1));
    }

    #[test]
    fn int_plus_rational_promotes() {
        let arena = Arena::new(65536);
        let r = add(&arena, small(1), rational_from_strs(&arena, "1", "2"));
        assert_rational(r, 3, 2);
    }

    #[test]
    fn decimal_add_and_promotion() {
        let arena = Arena::new(65536);
        let r = add(&arena, decimal_from_str(&arena, "1.5"), decimal_from_str(&arena, "2.3"));
        assert_decimal_value(r, 38, 10);
        assert_eq!(decimal_scale(r), 1);

        let r = add(&arena, small(1), decimal_from_str(&arena, "0.5"));
        assert_decimal_value(r, 3, 2);

        let r = add(
            &arena,
            rational_from_strs(&arena, "1", "3"),
            decimal_from_str(&arena, "0.5"),
        );
        assert!(r.is_heap(HeapTag::Decimal));
    }

    #[test]
    fn pow_small() {
        let arena = Arena::new(65536);
        assert_eq!(pow(&arena, small(2), small(10)), small(1024));
        assert_eq!(pow(&arena, small(999), small(0)), small(1));
    }

    #[test]
    fn pow_grows_to_bigint() {
        let arena = Arena::new(65536);
        let r = pow(&arena, small(2), small(64));
        assert!(r.is_heap(HeapTag::BigInt));
        assert_eq!(load_int(r), BigInt::from(1u128 << 64));
    }

    #[test]
    fn pow_negative_exponent_is_error() {
        let arena = Arena::new(65536);
        assert_eq!(pow(&arena, small(2), small(-1)), ERROR);
    }

    #[test]
    fn pow_rational_base() {
        let arena = Arena::new(65536);
        let r = pow(&arena, rational_from_strs(&arena, "1", "2"), small(3));
        assert_rational(r, 1, 8);
    }

    #[test]
    fn pow_decimal_base_scales() {
        let arena = Arena::new(65536);
        let r = pow(&arena, decimal_from_str(&arena, "1.5"), small(2));
        assert_decimal_value(r, 9, 4);
        assert_eq!(decimal_scale(r), 2);
    }

    #[test]
    fn pow_non_integer_exponent_is_error() {
        let arena = Arena::new(65536);
        let half = rational_from_strs(&arena, "1", "2");
        assert_eq!(pow(&arena, small(2), half), ERROR);
        let s = make_string(&arena, "x");
        assert_eq!(pow(&arena, s, small(2)), ERROR);
    }

    #[test]
    fn comparisons_small() {
        let arena = Arena::new(65536);
        assert_eq!(eq(&arena, small(42), small(42)), TRUE);
        assert_eq!(eq(&arena, small(42), small(43)), FALSE);
        assert_eq!(ne(&arena, small(1), small(2)), TRUE);
        assert_eq!(lt(&arena, small(1), small(2)), TRUE);
        assert_eq!(lt(&arena, small(2), small(1)), FALSE);
        assert_eq!(le(&arena, small(2), small(2)), TRUE);
        assert_eq!(gt(&arena, small(3), small(2)), TRUE);
        assert_eq!(ge(&arena, small(2), small(2)), TRUE);
        assert_eq!(ge(&arena, small(1), small(2)), FALSE);
    }

    #[test]
    fn comparisons_cross_type() {
        let arena = Arena::new(65536);
        let a = bigint_from_str(&arena, "99999999999999999998");
        let b = bigint_from_str(&arena, "99999999999999999999");
        assert_eq!(lt(&arena, a, b), TRUE);
        assert_eq!(lt(&arena, b, a), FALSE);

        let half = rational_from_strs(&arena, "1", "2");
        let third = rational_from_strs(&arena, "1", "3");
        assert_eq!(lt(&arena, third, half), TRUE);

        // 2/4 equals 1/2 after canonicalization.
        assert_eq!(eq(&arena, rational_from_strs(&arena, "2", "4"), half), TRUE);

        assert_eq!(eq(&arena, small(6), rational_from_strs(&arena, "6", "1")), TRUE);
        assert_eq!(eq(&arena, decimal_from_str(&arena, "2.0"), small(2)), TRUE);
        assert_eq!(
            lt(&arena, decimal_from_str(&arena, "1.5"), decimal_from_str(&arena, "2.5")),
            TRUE
        );
    }

    #[test]
    fn non_numeric_equality_is_identity() {
        let arena = Arena::new(65536);
        let s1 = make_string(&arena, "hi");
        let s2 = make_string(&arena, "hi");
        assert_eq!(eq(&arena, s1, s2), FALSE);
        assert_eq!(eq(&arena, s1, s1), TRUE);
        assert_eq!(ne(&arena, s1, s2), TRUE);
        assert_eq!(ne(&arena, s1, s1), FALSE);
    }

    #[test]
    fn non_numeric_ordering_is_error() {
        let arena = Arena::new(65536);
        let s = make_string(&arena, "x");
        assert_eq!(lt(&arena, s, small(1)), ERROR);
        assert_eq!(le(&arena, s, small(1)), ERROR);
        assert_eq!(gt(&arena, s, small(1)), ERROR);
        assert_eq!(ge(&arena, s, small(1)), ERROR);
    }

    #[test]
    fn error_is_sticky_everywhere() {
        let arena = Arena::new(65536);
        let one = small(1);
        let binary: [fn(&Arena, Value, Value) -> Value; 12] =
            [add, sub, mul, div, modulo, pow, eq, ne, lt, le, gt, ge];
        for op in binary {
            assert_eq!(op(&arena, ERROR, one), ERROR);
            assert_eq!(op(&arena, one, ERROR), ERROR);
        }
        assert_eq!(neg(&arena, ERROR), ERROR);
    }

    #[test]
    fn non_numeric_arithmetic_is_error() {
        let arena = Arena::new(65536);
        let s = make_string(&arena, "x");
        assert_eq!(add(&arena, s, small(1)), ERROR);
        assert_eq!(add(&arena, small(1), s), ERROR);
        assert_eq!(sub(&arena, s, small(1)), ERROR);
        assert_eq!(mul(&arena, small(1), s), ERROR);
        assert_eq!(div(&arena, s, small(1)), ERROR);
        assert_eq!(neg(&arena, s), ERROR);
    }
}
