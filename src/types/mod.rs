pub mod quote;
pub mod side;
