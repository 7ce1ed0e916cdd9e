pub mod accumulator;
pub mod attribution;
pub mod emp;
pub mod util;
