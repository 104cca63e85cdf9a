pub mod events;
pub mod inputs;
pub mod payload;
pub mod results;
pub mod schema;
pub mod session;
