pub mod arith;
pub mod array;
pub mod compare;
pub mod interner;
pub mod string;
pub mod value;
pub mod var;
