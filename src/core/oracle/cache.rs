//! 带磁盘缓存和并发控制的 oracle 包装

use super::completion::{CompletionOracle, CompletionRequest};
use super::error::OracleError;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

/// 按请求指纹缓存响应
///
/// 同一指纹同时只有一个上游请求，其余调用方等待并复用结果；
/// 不同指纹的上游请求数受 `max_workers` 限制。
pub struct CachedOracle<O> {
    inner: O,
    cache_dir: PathBuf,
    memory: Mutex<HashMap<String, Value>>,
    in_flight: Mutex<HashMap<String, Flight>>,
    permits: Semaphore,
}

/// 某个指纹的在途闸门，`users` 为持有 [`FlightGuard`] 的调用方数
struct Flight {
    gate: Arc<AsyncMutex<()>>,
    users: usize,
}

/// 离开作用域（包括 future 被取消）时归还闸门，最后一个调用方负责移除条目
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, Flight>>,
    key: String,
    gate: Arc<AsyncMutex<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        if let Some(flight) = in_flight.get_mut(&self.key) {
            flight.users = flight.users.saturating_sub(1);
            if flight.users == 0 {
                in_flight.remove(&self.key);
            }
        }
    }
}

impl<O: CompletionOracle> CachedOracle<O> {
    pub fn new(inner: O, cache_dir: impl Into<PathBuf>, max_workers: usize) -> Self {
        let cache_dir = cache_dir.into();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            warn!("⚠️ Cannot create cache dir {}: {}", cache_dir.display(), e);
        }
        info!(
            "🗄️ CachedOracle created (dir {}, max_workers {})",
            cache_dir.display(),
            max_workers.max(1)
        );
        Self {
            inner,
            cache_dir,
            memory: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            permits: Semaphore::new(max_workers.max(1)),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// 清空缓存，返回删除的磁盘条目数
    pub fn clear_cache(&self) -> usize {
        if let Ok(mut memory) = self.memory.lock() {
            memory.clear();
        }

        let entries = match std::fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("⚠️ Cannot read cache dir {}: {}", self.cache_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => debug!("   skip {}: {}", path.display(), e),
            }
        }
        info!("🧹 Cleared {} cached responses", removed);
        removed
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.memory.lock().ok().and_then(|m| m.get(key).cloned()) {
            return Some(value);
        }

        let path = self.entry_path(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                if let Ok(mut memory) = self.memory.lock() {
                    memory.insert(key.to_string(), value.clone());
                }
                Some(value)
            }
            Err(e) => {
                warn!("⚠️ Failed to read cache {}: {}", path.display(), e);
                None
            }
        }
    }

    fn store(&self, key: &str, value: &Value) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key.to_string(), value.clone());
        }
        let path = self.entry_path(key);
        let written = serde_json::to_vec(value)
            .map_err(OracleError::from)
            .and_then(|bytes| std::fs::write(&path, bytes).map_err(OracleError::from));
        if let Err(e) = written {
            warn!("⚠️ Failed to write cache {}: {}", path.display(), e);
        }
    }

    fn enter(&self, key: &str) -> Option<FlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().ok()?;
        let flight = in_flight.entry(key.to_string()).or_insert_with(|| Flight {
            gate: Arc::new(AsyncMutex::new(())),
            users: 0,
        });
        flight.users += 1;
        Some(FlightGuard {
            in_flight: &self.in_flight,
            key: key.to_string(),
            gate: flight.gate.clone(),
        })
    }
}

#[async_trait]
impl<O: CompletionOracle> CompletionOracle for CachedOracle<O> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, OracleError> {
        let key = request.fingerprint();
        if let Some(hit) = self.lookup(&key) {
            debug!("   cache hit {} ({})", &key[..12], request.model);
            return Ok(hit);
        }

        let flight = self.enter(&key);
        let _held = match &flight {
            Some(flight) => Some(flight.gate.lock().await),
            None => None,
        };

        // 等待期间其他调用方可能已经写入结果
        if let Some(hit) = self.lookup(&key) {
            debug!("   cache hit after wait {}", &key[..12]);
            return Ok(hit);
        }

        let result = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| OracleError::Malformed(format!("worker pool closed: {}", e)))?;
            self.inner.complete(request).await
        };

        if let Ok(value) = &result {
            self.store(&key, value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingOracle {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl CountingOracle {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl CompletionOracle for Arc<CountingOracle> {
        async fn complete(&self, request: &CompletionRequest) -> Result<Value, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "model": request.model }))
        }
    }

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest::new(model, 0.2, Duration::from_secs(5))
            .user(vec![CompletionRequest::text_part("hi")])
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::ZERO));
        let oracle = CachedOracle::new(counter.clone(), dir.path(), 2);

        let first = oracle.complete(&request("a")).await.unwrap();
        let second = oracle.complete(&request("a")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert!(oracle.entry_path(&request("a").fingerprint()).exists());
    }

    #[tokio::test]
    async fn test_disk_cache_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::ZERO));
        CachedOracle::new(counter.clone(), dir.path(), 1)
            .complete(&request("a"))
            .await
            .unwrap();

        let reopened = CachedOracle::new(counter.clone(), dir.path(), 1);
        let value = reopened.complete(&request("a")).await.unwrap();
        assert_eq!(value["model"], "a");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_share_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::from_millis(50)));
        let oracle = CachedOracle::new(counter.clone(), dir.path(), 4);

        let req = request("same");
        let (a, b, c) = tokio::join!(
            oracle.complete(&req),
            oracle.complete(&req),
            oracle.complete(&req)
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_workers_bounds_upstream_calls() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::from_millis(20)));
        let oracle = Arc::new(CachedOracle::new(counter.clone(), dir.path(), 2));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..6 {
            let oracle = oracle.clone();
            tasks.spawn(async move { oracle.complete(&request(&format!("m{}", i))).await });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.unwrap().is_ok());
        }

        assert_eq!(counter.calls.load(Ordering::SeqCst), 6);
        assert!(counter.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_calls_release_in_flight_entries() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::from_secs(60)));
        let oracle = CachedOracle::new(counter.clone(), dir.path(), 2);

        for _ in 0..5 {
            let req = request("slow");
            let call = oracle.complete(&req);
            let result = tokio::time::timeout(Duration::from_millis(20), call).await;
            assert!(result.is_err());
        }

        assert_eq!(counter.calls.load(Ordering::SeqCst), 5);
        assert_eq!(oracle.in_flight.lock().unwrap().len(), 0);
        assert_eq!(oracle.permits.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_in_flight_empty_after_shared_call() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::from_millis(30)));
        let oracle = CachedOracle::new(counter.clone(), dir.path(), 4);

        let req = request("shared");
        let (a, b) = tokio::join!(oracle.complete(&req), oracle.complete(&req));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert!(oracle.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(CountingOracle::new(Duration::ZERO));
        let oracle = CachedOracle::new(counter.clone(), dir.path(), 2);
        oracle.complete(&request("a")).await.unwrap();
        oracle.complete(&request("b")).await.unwrap();

        assert_eq!(oracle.clear_cache(), 2);
        assert_eq!(oracle.clear_cache(), 0);

        oracle.complete(&request("a")).await.unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
    }
}
