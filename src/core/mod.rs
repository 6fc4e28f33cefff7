/// Runtime core: arena allocator, tagged values, big-number glue.

pub mod arena;
pub mod bignum;
pub mod value;
