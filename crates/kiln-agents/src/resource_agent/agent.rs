// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The ResourceAgent owns the path table and drives every handle's state
//! machine.
//!
//! Decoding runs on worker threads. Everything that touches the GPU or the
//! table (finalize, fence polling, promotion, eviction) happens in
//! [`ResourceAgent::update`], on the thread that owns the [`GpuContext`].

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use kiln_core::asset::{
    DecodeError, DecodedResource, LoadError, LoadState, Resource, ResourceKind,
};
use kiln_core::event::EventBus;
use kiln_core::renderer::{FenceStatus, GpuContext, ResourceError, SyncFence};
use kiln_core::worker::{
    panic_message, PoolHandle, TaskStatus, WorkerPool, WorkerSettings, WorkerStats,
};
use kiln_core::LoaderConfig;
use kiln_lanes::finalize_lane::fallback_for;
use kiln_lanes::{DecoderRegistry, FinalizeLane, GpuUploadLane, ResourceSource};

use super::event::ResourceEvent;
use super::handle::{ResourceHandle, ResourcePointer};

/// Where decode tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// Dedicated OS threads, started at construction.
    #[default]
    Threaded,
    /// No thread is spawned: each [`ResourceAgent::update`] first runs one
    /// worker tick on the calling thread.
    Inline,
}

/// When a reset callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetPhase {
    /// [`ResourceAgent::reset_all`] is about to unload every handle.
    Unload,
    /// [`ResourceAgent::reload_all`] restarted every load.
    Reload,
}

/// Identifies a callback registered with [`ResourceAgent::bind_reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResetToken(u64);

/// A callback notified when the agent resets or reloads its resources.
///
/// Objects that own GPU state outside the agent register one to drop and
/// rebuild that state alongside the resources.
pub type ResetCallback = Box<dyn FnMut(&mut GpuContext, ResetPhase)>;

/// What a single [`ResourceAgent::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateReport {
    /// Decode results received from the workers.
    pub decoded: usize,
    /// Resources built by the finalize lane.
    pub finalized: usize,
    /// Handles promoted to loaded.
    pub promoted: usize,
    /// Handles that failed.
    pub failed: usize,
    /// Results dropped because their handle was unloaded, reloaded or lost
    /// every holder.
    pub discarded: usize,
    /// Handles removed from the table.
    pub evicted: usize,
    /// Objects released once their last outside reference was dropped.
    pub released: usize,
    /// Uploads still waiting for their fence.
    pub uploads_in_flight: usize,
}

/// A decode result travelling from a worker to the owning thread.
struct Completion {
    path: String,
    generation: u64,
    result: Result<DecodedResource, DecodeError>,
}

/// A finalized resource whose upload fence has not signaled yet.
struct PendingUpload {
    handle: Rc<ResourceHandle>,
    generation: u64,
    resource: Resource,
    fence: SyncFence,
}

/// An unloaded object still referenced outside the agent.
struct DeferredRelease {
    path: String,
    resource: Rc<Resource>,
}

/// The resource manager.
///
/// Owns the path→handle table. Not `Send`: the agent lives on the owning
/// thread, and only the decode closures it attaches cross to the workers.
pub struct ResourceAgent {
    config: LoaderConfig,
    source: Arc<dyn ResourceSource>,
    registry: Arc<DecoderRegistry>,
    finalizer: Box<dyn FinalizeLane>,
    pool: WorkerPool,
    workers: PoolHandle,
    mode: WorkerMode,
    completion_sender: Sender<Completion>,
    completions: Receiver<Completion>,
    table: HashMap<String, Rc<ResourceHandle>>,
    fallbacks: HashMap<ResourceKind, Rc<Resource>>,
    ready: VecDeque<Completion>,
    uploads: Vec<PendingUpload>,
    deferred: Vec<DeferredRelease>,
    next_generation: Cell<u64>,
    reset_callbacks: Vec<(ResetToken, ResetCallback)>,
    next_reset_token: u64,
    events: EventBus<ResourceEvent>,
}

impl ResourceAgent {
    /// Creates an agent with the built-in decoders and the GPU upload lane,
    /// and starts its worker threads.
    pub fn new(ctx: &GpuContext, config: LoaderConfig, source: Arc<dyn ResourceSource>) -> Result<Self> {
        Self::with_lanes(
            ctx,
            config,
            source,
            DecoderRegistry::with_defaults(),
            GpuUploadLane,
            WorkerMode::Threaded,
        )
    }

    /// Creates an agent with custom lanes.
    ///
    /// Builds one fallback object per resource kind through `finalizer`,
    /// which fails the construction if the device cannot hold them.
    pub fn with_lanes(
        ctx: &GpuContext,
        config: LoaderConfig,
        source: Arc<dyn ResourceSource>,
        registry: DecoderRegistry,
        finalizer: impl FinalizeLane + 'static,
        mode: WorkerMode,
    ) -> Result<Self> {
        ctx.check_owner()
            .context("The resource agent must be created on the thread owning the GPU context")?;

        let mut fallbacks = HashMap::new();
        for kind in ResourceKind::ALL {
            let fallback = finalizer
                .finalize(ctx, fallback_for(kind))
                .with_context(|| format!("Failed to build the fallback {kind} resource"))?;
            fallbacks.insert(kind, Rc::new(fallback));
        }

        let mut pool = WorkerPool::new(
            "kiln-loader",
            config.effective_worker_count(),
            WorkerSettings::from_config(&config),
        );
        if mode == WorkerMode::Threaded {
            pool.start()
                .context("Failed to start the loader worker threads")?;
        }
        let workers = pool.handle();
        let (completion_sender, completions) = crossbeam_channel::unbounded();

        log::info!(
            "ResourceAgent ready ({} worker(s), {:?}, finalize lane '{}')",
            pool.workers().len(),
            mode,
            finalizer.name()
        );

        Ok(Self {
            config,
            source,
            registry: Arc::new(registry),
            finalizer: Box::new(finalizer),
            pool,
            workers,
            mode,
            completion_sender,
            completions,
            table: HashMap::new(),
            fallbacks,
            ready: VecDeque::new(),
            uploads: Vec::new(),
            deferred: Vec::new(),
            next_generation: Cell::new(0),
            reset_callbacks: Vec::new(),
            next_reset_token: 0,
            events: EventBus::new(),
        })
    }

    /// Returns a pointer to the resource at `path`, starting its load on the
    /// first request.
    ///
    /// Repeated requests share one handle and never decode twice. An unloaded
    /// handle is loaded again.
    pub fn acquire(&mut self, path: &str) -> ResourcePointer {
        if let Some(handle) = self.table.get(path) {
            let handle = Rc::clone(handle);
            if handle.state() == LoadState::Unloaded {
                self.start_load(&handle);
            }
            return ResourcePointer::new(handle);
        }

        let kind = ResourceKind::from_path(path);
        let handle = Rc::new(ResourceHandle::new(
            path.to_string(),
            kind,
            Rc::clone(&self.fallbacks[&kind]),
        ));
        self.table.insert(path.to_string(), Rc::clone(&handle));
        self.start_load(&handle);
        ResourcePointer::new(handle)
    }

    /// Registers an object built in code under `name`.
    ///
    /// The handle is loaded immediately and is never reloaded, reset or
    /// evicted: only [`free`](Self::free) removes it. If `name` is already in
    /// the table the existing handle is returned and `resource` is released
    /// during the next update.
    pub fn acquire_link(&mut self, name: &str, resource: Resource) -> ResourcePointer {
        if let Some(handle) = self.table.get(name) {
            let handle = Rc::clone(handle);
            log::warn!("'{name}' is already in use; the linked object is dropped");
            self.deferred.push(DeferredRelease {
                path: name.to_string(),
                resource: Rc::new(resource),
            });
            return ResourcePointer::new(handle);
        }

        let kind = resource.kind();
        let handle = Rc::new(ResourceHandle::new_linked(
            name.to_string(),
            resource,
            Rc::clone(&self.fallbacks[&kind]),
        ));
        self.table.insert(name.to_string(), Rc::clone(&handle));
        log::debug!("'{name}' linked as {kind}");
        self.events.publish(ResourceEvent::Loaded {
            path: name.to_string(),
            kind,
        });
        ResourcePointer::new(handle)
    }

    /// Removes the handle at `path` from the table and releases its object.
    ///
    /// Works for linked and managed handles alike. Pointers still holding the
    /// handle fall back and never load again. Returns `false` if the path is
    /// unknown.
    pub fn free(&mut self, path: &str, ctx: &mut GpuContext) -> bool {
        let Some(handle) = self.table.remove(path) else {
            return false;
        };
        if let Some(current) = handle.unload() {
            self.release(ctx, current, path);
        }
        if handle.refcount() > 0 {
            log::warn!(
                "'{path}' freed while {} pointer(s) still hold it",
                handle.refcount()
            );
        }
        log::debug!("'{path}' freed");
        self.events.publish(ResourceEvent::Freed {
            path: path.to_string(),
        });
        true
    }

    /// Registers `callback` to run on [`reset_all`](Self::reset_all) and
    /// [`reload_all`](Self::reload_all).
    pub fn bind_reset<F>(&mut self, callback: F) -> ResetToken
    where
        F: FnMut(&mut GpuContext, ResetPhase) + 'static,
    {
        self.next_reset_token += 1;
        let token = ResetToken(self.next_reset_token);
        self.reset_callbacks.push((token, Box::new(callback)));
        token
    }

    /// Removes a reset callback. Returns `false` if it was already removed.
    pub fn unbind_reset(&mut self, token: ResetToken) -> bool {
        let before = self.reset_callbacks.len();
        self.reset_callbacks.retain(|(bound, _)| *bound != token);
        self.reset_callbacks.len() != before
    }

    /// Advances every handle. Must be called regularly on the owning thread.
    ///
    /// Receives decode results, finalizes at most
    /// `finalize_budget_per_update` of them, polls the upload fences without
    /// blocking beyond `fence_timeout_ns`, promotes the handles whose fence
    /// signaled and evicts the handles nobody holds. Objects unloaded while
    /// still referenced outside the agent are destroyed here once the last
    /// outside reference is gone.
    pub fn update(&mut self, ctx: &mut GpuContext) -> Result<UpdateReport, ResourceError> {
        ctx.check_owner()?;
        let mut report = UpdateReport::default();

        if self.mode == WorkerMode::Inline {
            self.pool.update_all();
        }
        for failure in self.pool.failures().try_iter() {
            log::warn!(
                "Loader task {:?} on '{}' failed: {}",
                failure.task,
                failure.worker,
                failure.message
            );
        }

        self.revive_parked();
        self.collect_completions(&mut report);
        self.finalize_ready(ctx, &mut report);
        self.poll_uploads(ctx, &mut report);
        self.sweep(ctx, &mut report);
        self.drain_deferred(ctx, &mut report);

        report.uploads_in_flight = self.uploads.len();
        Ok(report)
    }

    /// Unloads the resource at `path` regardless of its holders.
    ///
    /// Its GPU buffers are released, an in-flight load is discarded and the
    /// pointers fall back. Buffers of an object still referenced through
    /// [`ResourcePointer::get`] are released once that reference is dropped.
    /// Returns `false` if the path is unknown or linked.
    pub fn unload(&mut self, path: &str, ctx: &mut GpuContext) -> bool {
        let Some(handle) = self.table.get(path).cloned() else {
            return false;
        };
        if handle.is_linked() {
            log::warn!("'{path}' is linked and cannot be unloaded; free it instead");
            return false;
        }
        if let Some(previous) = handle.unload() {
            self.release(ctx, previous, path);
        }
        log::debug!("'{path}' unloaded");
        true
    }

    /// Unloads then loads the resource at `path` again.
    pub fn reload(&mut self, path: &str, ctx: &mut GpuContext) -> bool {
        if !self.unload(path, ctx) {
            return false;
        }
        if let Some(handle) = self.table.get(path).cloned() {
            self.start_load(&handle);
        }
        true
    }

    /// Notifies the reset callbacks with [`ResetPhase::Unload`], then
    /// unloads every managed handle. Linked handles are kept.
    ///
    /// Returns the number of handles swept.
    pub fn reset_all(&mut self, ctx: &mut GpuContext) -> usize {
        self.notify_reset(ctx, ResetPhase::Unload);
        let paths = self.managed_paths();
        for path in &paths {
            self.unload(path, ctx);
        }
        log::info!("Reset {} resource(s)", paths.len());
        paths.len()
    }

    /// Reloads every managed handle, then notifies the reset callbacks with
    /// [`ResetPhase::Reload`]. Linked handles are kept.
    ///
    /// Returns the number of handles swept.
    pub fn reload_all(&mut self, ctx: &mut GpuContext) -> usize {
        let paths = self.managed_paths();
        for path in &paths {
            self.reload(path, ctx);
        }
        self.notify_reset(ctx, ResetPhase::Reload);
        log::info!("Reloading {} resource(s)", paths.len());
        paths.len()
    }

    /// Stops the workers and releases every GPU buffer held by the agent.
    pub fn shutdown(mut self, ctx: &mut GpuContext) {
        self.pool.kill();
        for upload in self.uploads.drain(..) {
            if let Err(e) = upload.resource.destroy(ctx) {
                log::warn!("Failed to release '{}': {e}", upload.handle.path());
            }
        }
        let handles: Vec<_> = self.table.drain().collect();
        for (path, handle) in handles {
            if let Some(current) = handle.unload() {
                self.release(ctx, current, &path);
            }
        }
        let fallbacks: Vec<_> = self.fallbacks.drain().collect();
        for (kind, fallback) in fallbacks {
            self.release(ctx, fallback, &format!("<fallback {kind}>"));
        }
        for DeferredRelease { path, resource } in self.deferred.drain(..) {
            match Rc::try_unwrap(resource) {
                Ok(resource) => destroy(ctx, resource, &path),
                Err(_) => log::warn!(
                    "'{path}' outlives the resource agent; its buffers are freed with the last reference"
                ),
            }
        }
        log::info!("ResourceAgent shut down");
    }

    // --- Queries ---

    /// The state of the resource at `path`.
    pub fn state(&self, path: &str) -> Option<LoadState> {
        self.table.get(path).map(|handle| handle.state())
    }

    /// The number of pointers to the resource at `path`.
    pub fn refcount(&self, path: &str) -> Option<usize> {
        self.table.get(path).map(|handle| handle.refcount())
    }

    /// Returns `true` if `path` is in the table.
    pub fn contains(&self, path: &str) -> bool {
        self.table.contains_key(path)
    }

    /// Number of handles in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The fallback object served for `kind`.
    pub fn fallback(&self, kind: ResourceKind) -> Rc<Resource> {
        Rc::clone(&self.fallbacks[&kind])
    }

    /// Unloaded objects whose release waits for an outside reference to drop.
    pub fn deferred_releases(&self) -> usize {
        self.deferred.len()
    }

    /// Number of registered reset callbacks.
    pub fn reset_callbacks(&self) -> usize {
        self.reset_callbacks.len()
    }

    /// Uploads waiting for their fence.
    pub fn uploads_in_flight(&self) -> usize {
        self.uploads.len()
    }

    /// Returns `true` when no load is in flight anywhere.
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty()
            && self.uploads.is_empty()
            && !self.pool.has_work()
            && self
                .table
                .values()
                .all(|handle| handle.state() != LoadState::Loading)
    }

    /// Lifecycle events published by [`update`](Self::update).
    pub fn events(&self) -> &EventBus<ResourceEvent> {
        &self.events
    }

    /// Counters of the worker pool.
    pub fn worker_stats(&self) -> WorkerStats {
        self.pool.stats()
    }

    /// The configuration the agent was created with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    // --- Helpers ---

    fn start_load(&self, handle: &ResourceHandle) {
        let generation = self.next_generation.get() + 1;
        self.next_generation.set(generation);
        handle.begin_load(generation);
        let path = handle.path().to_string();
        let source = Arc::clone(&self.source);
        let registry = Arc::clone(&self.registry);
        let sender = self.completion_sender.clone();

        log::debug!("Loading '{path}' (generation {generation})");
        self.workers.attach_function(move || {
            let result = decode(source.as_ref(), &registry, &path);
            let completion = Completion {
                path: path.clone(),
                generation,
                result,
            };
            if sender.send(completion).is_err() {
                log::debug!("Resource agent gone, dropping the decode of '{path}'");
            }
            TaskStatus::Done
        });
    }

    fn managed_paths(&self) -> Vec<String> {
        self.table
            .iter()
            .filter(|(_, handle)| !handle.is_linked())
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn notify_reset(&mut self, ctx: &mut GpuContext, phase: ResetPhase) {
        log::debug!(
            "Notifying {} reset callback(s) of {phase:?}",
            self.reset_callbacks.len()
        );
        for (_, callback) in self.reset_callbacks.iter_mut() {
            callback(ctx, phase);
        }
    }

    /// Destroys `resource` now if the agent holds the only reference,
    /// otherwise once the others are dropped.
    fn release(&mut self, ctx: &mut GpuContext, resource: Rc<Resource>, path: &str) {
        match Rc::try_unwrap(resource) {
            Ok(resource) => destroy(ctx, resource, path),
            Err(shared) => {
                log::debug!("'{path}' is still referenced; its release is deferred");
                self.deferred.push(DeferredRelease {
                    path: path.to_string(),
                    resource: shared,
                });
            }
        }
    }

    fn drain_deferred(&mut self, ctx: &mut GpuContext, report: &mut UpdateReport) {
        let pending = std::mem::take(&mut self.deferred);
        for DeferredRelease { path, resource } in pending {
            match Rc::try_unwrap(resource) {
                Ok(resource) => {
                    destroy(ctx, resource, &path);
                    log::debug!("Deferred release of '{path}' done");
                    report.released += 1;
                }
                Err(shared) => self.deferred.push(DeferredRelease {
                    path,
                    resource: shared,
                }),
            }
        }
    }

    /// Restarts the loads of parked handles that gained an active pointer.
    fn revive_parked(&self) {
        let revived: Vec<Rc<ResourceHandle>> = self
            .table
            .values()
            .filter(|handle| handle.is_parked() && handle.refcount() > 0)
            .cloned()
            .collect();
        for handle in revived {
            log::debug!("'{}' reactivated", handle.path());
            self.start_load(&handle);
        }
    }

    /// The handle a result belongs to, if the result is still wanted.
    ///
    /// A result for a handle nobody holds unloads it, so the sweep evicts it.
    fn wanted_handle(&self, completion_path: &str, generation: u64) -> Option<Rc<ResourceHandle>> {
        let handle = self.table.get(completion_path)?;
        if !handle.is_current(generation) {
            log::debug!("Discarding a stale result for '{completion_path}'");
            return None;
        }
        if handle.refcount() == 0 {
            log::debug!("Discarding the result for '{completion_path}': no holder left");
            handle.unload();
            return None;
        }
        Some(Rc::clone(handle))
    }

    fn collect_completions(&mut self, report: &mut UpdateReport) {
        let arrived: Vec<Completion> = self.completions.try_iter().collect();
        for completion in arrived {
            report.decoded += 1;
            if self
                .wanted_handle(&completion.path, completion.generation)
                .is_some()
            {
                self.ready.push_back(completion);
            } else {
                report.discarded += 1;
            }
        }
    }

    fn finalize_ready(&mut self, ctx: &mut GpuContext, report: &mut UpdateReport) {
        let mut budget = self.config.finalize_budget_per_update.max(1);
        while budget > 0 {
            let Some(completion) = self.ready.pop_front() else {
                break;
            };
            let Some(handle) = self.wanted_handle(&completion.path, completion.generation) else {
                report.discarded += 1;
                continue;
            };
            budget -= 1;

            let decoded = match completion.result {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.fail(&handle, LoadError::Decode(e), report);
                    continue;
                }
            };
            match self.finalizer.finalize(&*ctx, decoded) {
                Ok(resource) => {
                    report.finalized += 1;
                    self.begin_upload(ctx, handle, completion.generation, resource, report);
                }
                Err(e) => self.fail(&handle, e.into(), report),
            }
        }
    }

    fn begin_upload(
        &mut self,
        ctx: &mut GpuContext,
        handle: Rc<ResourceHandle>,
        generation: u64,
        resource: Resource,
        report: &mut UpdateReport,
    ) {
        if !resource.has_gpu_buffers() {
            self.promote(&handle, resource, report);
            return;
        }

        let mut fence = SyncFence::new(Arc::clone(ctx.device()));
        match fence.try_create() {
            Ok(_) => self.uploads.push(PendingUpload {
                handle,
                generation,
                resource,
                fence,
            }),
            Err(e) => {
                if let Err(destroy_error) = resource.destroy(ctx) {
                    log::warn!("Failed to release '{}': {destroy_error}", handle.path());
                }
                self.fail(&handle, e.into(), report);
            }
        }
    }

    fn poll_uploads(&mut self, ctx: &mut GpuContext, report: &mut UpdateReport) {
        let uploads = std::mem::take(&mut self.uploads);
        for upload in uploads {
            let handle = Rc::clone(&upload.handle);
            if !handle.is_current(upload.generation) || handle.refcount() == 0 {
                if handle.is_current(upload.generation) {
                    handle.unload();
                }
                log::debug!("Discarding the upload of '{}'", handle.path());
                report.discarded += 1;
                discard(ctx, upload);
                continue;
            }

            match upload
                .fence
                .check(self.config.fence_timeout_ns, self.config.flush_on_poll)
            {
                FenceStatus::Signaled => {
                    let PendingUpload { resource, .. } = upload;
                    self.promote(&handle, resource, report);
                }
                FenceStatus::Timeout => self.uploads.push(upload),
                FenceStatus::DeviceLost => {
                    discard(ctx, upload);
                    self.fail(&handle, LoadError::DeviceLost, report);
                }
            }
        }
    }

    /// Evicts managed handles nobody points to, and parks the ones only
    /// inactive pointers still reach.
    fn sweep(&mut self, ctx: &mut GpuContext, report: &mut UpdateReport) {
        let idle: Vec<Rc<ResourceHandle>> = self
            .table
            .values()
            .filter(|handle| {
                !handle.is_linked()
                    && handle.refcount() == 0
                    && handle.state() != LoadState::Loading
            })
            .cloned()
            .collect();

        for handle in idle {
            let path = handle.path().to_string();
            // Table entry plus `handle`: no pointer is left.
            if Rc::strong_count(&handle) == 2 {
                self.table.remove(&path);
                if let Some(current) = handle.unload() {
                    self.release(ctx, current, &path);
                }
                log::debug!("'{path}' evicted");
                report.evicted += 1;
                self.events.publish(ResourceEvent::Evicted { path });
            } else if !handle.is_parked() {
                if let Some(current) = handle.park() {
                    self.release(ctx, current, &path);
                }
                log::debug!("'{path}' parked: only inactive pointers remain");
            }
        }
    }

    fn promote(&self, handle: &ResourceHandle, resource: Resource, report: &mut UpdateReport) {
        // Previous objects are released by unload(), which always precedes a load.
        if handle.promote(resource).is_some() {
            log::warn!("'{}' replaced a live object on promotion", handle.path());
        }
        report.promoted += 1;
        log::debug!("'{}' loaded", handle.path());
        self.events.publish(ResourceEvent::Loaded {
            path: handle.path().to_string(),
            kind: handle.kind(),
        });
    }

    fn fail(&self, handle: &ResourceHandle, error: LoadError, report: &mut UpdateReport) {
        log::warn!("Failed to load '{}': {error}", handle.path());
        handle.fail(error.clone());
        report.failed += 1;
        self.events.publish(ResourceEvent::Failed {
            path: handle.path().to_string(),
            error,
        });
    }
}

impl std::fmt::Debug for ResourceAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAgent")
            .field("mode", &self.mode)
            .field("handles", &self.table.len())
            .field("ready", &self.ready.len())
            .field("uploads", &self.uploads.len())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Reads and decodes `path`. Runs on a worker thread.
fn decode(
    source: &dyn ResourceSource,
    registry: &DecoderRegistry,
    path: &str,
) -> Result<DecodedResource, DecodeError> {
    let bytes = source.read(path)?;
    // A panicking decoder must still produce a result, or the handle would
    // stay loading forever.
    panic::catch_unwind(AssertUnwindSafe(|| registry.decode(path, &bytes))).unwrap_or_else(
        |payload| {
            Err(DecodeError::Malformed {
                path: path.to_string(),
                message: format!("decoder panicked: {}", panic_message(&*payload)),
            })
        },
    )
}

fn discard(ctx: &mut GpuContext, upload: PendingUpload) {
    let PendingUpload {
        handle,
        resource,
        mut fence,
        ..
    } = upload;
    fence.delete();
    if let Err(e) = resource.destroy(ctx) {
        log::warn!("Failed to release '{}': {e}", handle.path());
    }
}

fn destroy(ctx: &mut GpuContext, resource: Resource, path: &str) {
    if let Err(e) = resource.destroy(ctx) {
        log::warn!("Failed to release '{path}': {e}");
    }
}
