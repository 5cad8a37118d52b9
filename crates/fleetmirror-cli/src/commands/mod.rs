pub mod replay;
pub mod status;
