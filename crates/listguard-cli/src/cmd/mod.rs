pub mod broadcast;
pub mod completions;
pub mod decisions;
pub mod enqueue;
pub mod init;
pub mod market;
pub mod process;
pub mod queue;
pub mod scan;
pub mod votes;
pub mod watch;
