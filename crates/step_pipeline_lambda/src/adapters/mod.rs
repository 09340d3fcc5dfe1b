pub mod invoke;
pub mod local;
