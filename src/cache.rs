use std::num::NonZeroUsize;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 以文件路径为键的 LRU 文件缓存，按修改时间判定条目是否仍然有效
pub struct FileCache {
    cache: LruCache<String, CacheEntry>,
}

impl FileCache {
    // 根据容量构造
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("调用from_capacity时指定的大小是0。如果需要自动设置大小，请在调用处进行处理，而不是传入0");
        }
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
        }
    }

    // 写入缓存
    pub fn store(&mut self, path: &str, bytes: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content: bytes,
            modified_time,
        };
        self.cache.put(path.to_string(), entry);
    }

    // 检查文件大小是否适合缓存
    pub fn should_cache(file_size: u64, limit: u64) -> bool {
        file_size <= limit
    }

    // 查询有效缓存：条目存在且文件自缓存以来未被修改
    pub fn lookup(&mut self, path: &str, current_modified_time: SystemTime) -> Option<&Bytes> {
        match self.cache.get(path) {
            Some(entry) => {
                if entry.modified_time == current_modified_time {
                    Some(&entry.content)
                } else {
                    None
                }
            }
            None => None,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cache.len()
    }
}
