pub mod read;
pub mod write;

pub use write::RecoveryReport;
