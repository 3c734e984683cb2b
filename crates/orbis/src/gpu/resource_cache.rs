//! Cache of GPU resources keyed by kind and identity.
//!
//! Programs and textures are shared behind `Arc`s and created on a miss.
//! The cache tracks the memory its entries hold; once that exceeds the
//! capacity, least recently used textures are evicted until usage drops to
//! the low-water mark. Programs are never evicted.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gpu::program::{GpuProgram, ProgramKey};
use crate::gpu::texture::Texture;

/// Default capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 256 * 1024 * 1024;

/// Kind of cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Program,
    Texture,
}

/// Typed identity of a cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub id: Cow<'static, str>,
}

impl ResourceKey {
    #[must_use]
    pub fn program(key: ProgramKey) -> Self {
        Self {
            kind: ResourceKind::Program,
            id: Cow::Borrowed(key),
        }
    }

    #[must_use]
    pub fn texture(id: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: ResourceKind::Texture,
            id: id.into(),
        }
    }
}

/// A cached resource.
#[derive(Debug, Clone)]
pub enum GpuResource {
    Program(Arc<GpuProgram>),
    Texture(Arc<Texture>),
}

impl GpuResource {
    fn size_in_bytes(&self) -> usize {
        match self {
            GpuResource::Program(p) => p.size_in_bytes(),
            GpuResource::Texture(t) => t.size_in_bytes(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    resource: GpuResource,
    size: usize,
    last_used: u64,
}

/// Resource cache owned by the draw context.
#[derive(Debug)]
pub struct GpuResourceCache {
    entries: HashMap<ResourceKey, Entry>,
    /// Programs whose creation failed; they are not retried.
    failed_programs: HashSet<ProgramKey>,
    capacity: usize,
    low_water: usize,
    used: usize,
    clock: u64,
}

impl Default for GpuResourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl GpuResourceCache {
    /// Create a cache holding up to `capacity` bytes, evicting down to 80%
    /// of it when full.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_low_water(capacity, capacity / 5 * 4)
    }

    /// Create a cache with an explicit low-water mark.
    #[must_use]
    pub fn with_low_water(capacity: usize, low_water: usize) -> Self {
        Self {
            entries: HashMap::new(),
            failed_programs: HashSet::new(),
            capacity,
            low_water: low_water.min(capacity),
            used: 0,
            clock: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by cached entries.
    #[must_use]
    pub fn used_capacity(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a resource, replacing any entry with the same key.
    pub fn put(&mut self, key: ResourceKey, resource: GpuResource) {
        let size = resource.size_in_bytes();
        self.clock += 1;
        let entry = Entry {
            resource,
            size,
            last_used: self.clock,
        };
        if let Some(old) = self.entries.insert(key, entry) {
            self.used -= old.size;
        }
        self.used += size;

        if self.used > self.capacity {
            self.evict();
        }
    }

    /// Look up a resource, marking it as recently used.
    pub fn get(&mut self, key: &ResourceKey) -> Option<GpuResource> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.resource.clone()
        })
    }

    pub fn program(&mut self, key: ProgramKey) -> Option<Arc<GpuProgram>> {
        match self.get(&ResourceKey::program(key)) {
            Some(GpuResource::Program(p)) => Some(p),
            _ => None,
        }
    }

    pub fn texture(&mut self, id: &str) -> Option<Arc<Texture>> {
        match self.get(&ResourceKey::texture(id.to_owned())) {
            Some(GpuResource::Texture(t)) => Some(t),
            _ => None,
        }
    }

    /// Cache a texture under an id and return the shared handle.
    pub fn put_texture(&mut self, id: impl Into<Cow<'static, str>>, texture: Texture) -> Arc<Texture> {
        let texture = Arc::new(texture);
        self.put(ResourceKey::texture(id), GpuResource::Texture(texture.clone()));
        texture
    }

    /// Return the cached program for `key`, creating it on a miss.
    ///
    /// A failed creation is logged once and remembered; later calls fail
    /// with [`Error::ProgramUnavailable`] without retrying.
    pub fn find_or_create_program(
        &mut self,
        key: ProgramKey,
        create: impl FnOnce() -> Result<GpuProgram>,
    ) -> Result<Arc<GpuProgram>> {
        if let Some(program) = self.program(key) {
            return Ok(program);
        }
        if self.failed_programs.contains(key) {
            return Err(Error::ProgramUnavailable { key });
        }

        match create() {
            Ok(program) => {
                let program = Arc::new(program);
                self.put(
                    ResourceKey::program(key),
                    GpuResource::Program(program.clone()),
                );
                tracing::debug!(key, "created program");
                Ok(program)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "program creation failed");
                self.failed_programs.insert(key);
                Err(e)
            }
        }
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &ResourceKey) -> Option<GpuResource> {
        let entry = self.entries.remove(key)?;
        self.used -= entry.size;
        Some(entry.resource)
    }

    /// Remove every entry and forget failed programs.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.failed_programs.clear();
        self.used = 0;
    }

    fn evict(&mut self) {
        let mut candidates: Vec<(u64, ResourceKey)> = self
            .entries
            .iter()
            .filter(|(k, _)| k.kind != ResourceKind::Program)
            .map(|(k, e)| (e.last_used, k.clone()))
            .collect();
        candidates.sort_unstable_by_key(|(last_used, _)| *last_used);

        let mut evicted = 0;
        for (_, key) in candidates {
            if self.used <= self.low_water {
                break;
            }
            if self.remove(&key).is_some() {
                evicted += 1;
            }
        }
        tracing::debug!(evicted, used = self.used, "evicted gpu resources");
    }
}
