mod process;

pub use process::{exit_code, find_binary};
