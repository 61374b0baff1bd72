pub mod stack;
pub mod symbol;

pub use self::{
    stack::ensure_sufficient_stack,
    symbol::Symbol,
};
