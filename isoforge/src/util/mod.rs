pub mod ports;
pub mod process;

pub use ports::{bind_in_range, find_free_port};
pub use process::CommandOutput;
