pub mod enrollment;
mod input;
pub mod results;

pub use input::InputError;
