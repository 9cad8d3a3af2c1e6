use super::*;
use crate::config::Config;
use crate::test_helpers::{MockSource, dir_entries, gzip};
use std::path::Path;
use std::time::Duration;


/// Config writing into `dest` with the given concurrency
fn test_config(dest: &Path, concurrency_limit: usize) -> Config {
    let mut config = Config::default();
    config.download.dest_dir = dest.to_path_buf();
    config.download.concurrency_limit = concurrency_limit;
    config
}

fn downloader(config: &Config, source: &MockSource) -> Downloader {
    Downloader::new(config, Arc::new(source.clone())).unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
