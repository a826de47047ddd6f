pub mod ast;
pub mod eval;
pub mod modules;
pub mod parse;
pub mod runtime;
