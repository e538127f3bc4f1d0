use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    public_dir: String,
    port: u16,
    worker_threads: usize,
    cache_size: usize,
    local: bool,
    #[serde(default = "default_cache_file_limit")]
    cache_file_limit: u64,
}

fn default_cache_file_limit() -> u64 {
    10485760 // 10MB
}

impl Config {
    pub fn new() -> Self {
        Self {
            public_dir: "public".to_string(),
            port: 4221,
            worker_threads: 0,
            cache_size: 5,
            local: true,
            cache_file_limit: default_cache_file_limit(),
        }
    }

    pub fn from_toml(filename: &str) -> Self {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => panic!("no such file {} exception:{}", filename, e),
        };
        let mut str_val = String::new();
        match file.read_to_string(&mut str_val) {
            Ok(s) => s,
            Err(e) => panic!("Error Reading file: {}", e),
        };

        let mut raw_config: Config = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(_) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置");
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为5。");
            raw_config.cache_size = 5;
        }
        raw_config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn public_dir(&self) -> &str {
        &self.public_dir
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn cache_file_limit(&self) -> u64 {
        self.cache_file_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_default_config() {
        let config = Config::new();

        assert_eq!(config.public_dir(), "public");
        assert_eq!(config.port(), 4221);
        assert!(config.local());
        assert_eq!(config.cache_file_limit(), 10485760);
    }

    /// 从 TOML 文件加载配置，worker_threads 为 0 时回落到 CPU 核数
    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "public_dir = \"served\"\nport = 8080\nworker_threads = 0\ncache_size = 3\nlocal = false\n"
        )
        .unwrap();

        let config = Config::from_toml(path.to_str().unwrap());

        assert_eq!(config.public_dir(), "served");
        assert_eq!(config.port(), 8080);
        assert!(config.worker_threads() > 0);
        assert_eq!(config.cache_size(), 3);
        assert!(!config.local());
        // 缺省字段由 serde 默认值补齐
        assert_eq!(config.cache_file_limit(), 10485760);
    }
}
