mod eval;
mod stack;
pub mod value;

pub use self::eval::Engine;
