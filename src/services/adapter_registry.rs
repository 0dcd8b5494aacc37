//! Process-wide registry of source adapters: capability/latency indices, a lazily-constructed instance cache, and a TTL health cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::mal::{AdapterInfo, Capability, HealthStatus, LatencyClass};
use crate::domain::ports::SourceAdapter;

pub const HEALTH_CACHE_TTL: Duration = Duration::from_secs(60);

type AdapterFactory = Arc<dyn Fn() -> Arc<dyn SourceAdapter> + Send + Sync>;

#[derive(Clone, Copy)]
struct CachedHealth {
    healthy: bool,
    checked_at: Instant,
}

struct Registration {
    info: AdapterInfo,
    factory: AdapterFactory,
}

/// Process-wide `name -> AdapterInfo` registry plus a lazily-constructed, memoized
/// `name -> instance` cache and a 60s-TTL health cache.
pub struct AdapterRegistry {
    registrations: RwLock<HashMap<String, Registration>>,
    instances: RwLock<HashMap<String, Arc<dyn SourceAdapter>>>,
    health_cache: DashMap<String, CachedHealth>,
    frozen: std::sync::atomic::AtomicBool,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            health_cache: DashMap::new(),
            frozen: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// While frozen, repeated registration is logged and ignored (DESIGN.md Open
    /// Question 3).
    pub fn register(
        &self,
        info: AdapterInfo,
        factory: impl Fn() -> Arc<dyn SourceAdapter> + Send + Sync + 'static,
    ) -> DomainResult<()> {
        info.validate().map_err(DomainError::Config)?;
        if self.frozen.load(std::sync::atomic::Ordering::Acquire) {
            warn!(adapter = %info.name, "ignoring registration attempt after registry freeze");
            return Ok(());
        }
        let mut registrations = self.registrations.write().expect("registry lock poisoned");
        if registrations.contains_key(&info.name) {
            warn!(adapter = %info.name, "overwriting existing adapter registration");
        }
        registrations.insert(
            info.name.clone(),
            Registration {
                info,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<AdapterInfo> {
        self.registrations
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .map(|r| r.info.clone())
    }

    pub fn list(&self) -> Vec<AdapterInfo> {
        self.registrations
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|r| r.info.clone())
            .collect()
    }

    pub fn list_by_capability(&self, capability: Capability) -> Vec<AdapterInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.capabilities.contains(&capability))
            .collect()
    }

    pub fn list_fast(&self) -> Vec<AdapterInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.latency_class == LatencyClass::Fast)
            .collect()
    }

    pub fn list_slow(&self) -> Vec<AdapterInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.latency_class == LatencyClass::Slow)
            .collect()
    }

    pub fn get_instance(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        if let Some(instance) = self.instances.read().expect("instance lock poisoned").get(name) {
            return Some(instance.clone());
        }
        let factory = {
            let registrations = self.registrations.read().expect("registry lock poisoned");
            registrations.get(name)?.factory.clone()
        };
        let instance = factory();
        self.instances
            .write()
            .expect("instance lock poisoned")
            .insert(name.to_string(), instance.clone());
        Some(instance)
    }

    pub fn freeze(&self) {
        self.frozen.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.registrations.write().expect("registry lock poisoned").clear();
        self.instances.write().expect("instance lock poisoned").clear();
        self.health_cache.clear();
        self.frozen.store(false, std::sync::atomic::Ordering::Release);
    }

    /// Runs the adapter's real `health_check` only on a cache miss.
    pub async fn health_check_cached(&self, name: &str) -> bool {
        if let Some(entry) = self.health_cache.get(name) {
            if entry.checked_at.elapsed() < HEALTH_CACHE_TTL {
                return entry.healthy;
            }
        }
        let healthy = match self.get_instance(name) {
            Some(instance) => instance
                .health_check()
                .await
                .map(|status: HealthStatus| status.healthy)
                .unwrap_or(false),
            None => false,
        };
        self.health_cache.insert(
            name.to_string(),
            CachedHealth {
                healthy,
                checked_at: Instant::now(),
            },
        );
        healthy
    }

    pub fn invalidate_health_cache(&self, name: &str) {
        self.health_cache.remove(name);
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .registrations
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("AdapterRegistry").field("names", &names).finish()
    }
}
