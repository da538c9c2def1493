pub mod gradebook;
pub mod judge;
pub mod permissions;
pub mod store;
