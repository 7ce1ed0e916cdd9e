pub mod common;
pub mod impls;
pub mod rewards;
pub mod traits;
