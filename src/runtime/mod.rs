pub mod class;
pub mod env;
pub mod object;
pub mod resource;
pub mod serialize;
