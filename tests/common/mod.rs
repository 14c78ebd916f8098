#![allow(dead_code, unused_imports)]

pub use vfswatch_test_utils::builders;
pub use vfswatch_test_utils::fake_watcher;
pub use vfswatch_test_utils::{MockVfs, eventually, init_tracing, with_timeout};
