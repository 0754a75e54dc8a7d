pub mod docker;
pub mod fission;
