mod common;
mod sweeper;
