mod store;
mod value;

pub use store::InputStore;
pub use value::{FileHandle, InputValue};
