pub mod dynamic;
pub mod model;
pub mod path;
pub mod store;
