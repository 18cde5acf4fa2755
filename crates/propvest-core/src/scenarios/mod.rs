pub mod break_even;
pub mod scenario;
pub mod sensitivity;
