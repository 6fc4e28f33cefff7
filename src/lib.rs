/// OrgLang Runtime Core
///
/// The library OrgLang's code generator emits against. Layered leaves
/// first: a chained-page arena with checkpoints, a tagged 64-bit value
/// representation, an exact numeric tower (SmallInt → BigInt → Rational →
/// Decimal), a hash+array hybrid table, and a resource/flow engine driven
/// by a single-threaded cooperative fiber scheduler.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod errors;
pub mod flow;
pub mod iter;
pub mod ops;
pub mod resource;
pub mod runtime;
pub mod sched;
pub mod table;

// Re-exports for generated code and embedders
pub use crate::config::RuntimeConfig;
pub use crate::core::arena::{Arena, Checkpoint};
pub use crate::core::bignum::{
    bigint_from_str, decimal_from_str, int_from_str, rational_from_strs,
};
pub use crate::core::value::{
    call, make_func, make_string, type_name, NativeFn, Value, ERROR, FALSE, TRUE,
};
pub use crate::dispatch::{
    buffer_new, format_value, op_infix, op_infix_str, op_prefix, op_prefix_str, print, syscall,
    InfixOp, PrefixOp,
};
pub use crate::errors::RtError;
pub use crate::runtime::Runtime;
