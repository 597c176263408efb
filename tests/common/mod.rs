//! Shared test helpers.
#![allow(dead_code)]

use std::{
    env::temp_dir,
    io::{self, Write},
    path::PathBuf,
};

use mockall::mock;
use rand::distr::{Alphanumeric, SampleString};

mock! {
    pub File {}
    impl Write for File {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
        fn flush(&mut self) -> io::Result<()>;
    }
}

/// Routes the crate's `log` output through the test harness.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fresh, not yet existing, path in the temp directory.
pub fn temp_csv_path() -> PathBuf {
    let file_name = Alphanumeric.sample_string(&mut rand::rng(), 16);
    temp_dir().join(format!("{}.csv", file_name))
}
