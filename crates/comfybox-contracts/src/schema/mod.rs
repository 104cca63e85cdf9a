mod data_type;
mod descriptor;

pub use data_type::DataType;
pub use descriptor::{InputParameter, ServiceDescriptor};
