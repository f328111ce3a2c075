pub mod context;
pub mod function;
pub mod host;
pub mod matrix;
pub mod signal;
pub mod thunk;
pub mod value;
