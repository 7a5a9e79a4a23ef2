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

//! Shared resource handles and the pointers that hold them.
//!
//! Handles are owned by the [`ResourceAgent`](super::ResourceAgent) table and
//! live on the owning thread only: they are built on `Rc` and `Cell`, so the
//! compiler rejects any attempt to send one to a worker thread.

use kiln_core::asset::{LoadError, LoadState, Resource, ResourceKind};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::thread::{self, ThreadId};

/// A one-shot continuation run when a handle becomes usable.
pub type UsableCallback = Box<dyn FnOnce(&Resource)>;

/// The shared state behind every [`ResourcePointer`] of one path.
///
/// A handle is either managed, loaded from its path by the agent, or linked:
/// wrapping an object built in code, which the agent never reloads or evicts.
pub struct ResourceHandle {
    path: String,
    kind: ResourceKind,
    managed: bool,
    parked: Cell<bool>,
    state: Cell<LoadState>,
    holders: Cell<usize>,
    generation: Cell<u64>,
    current: RefCell<Option<Rc<Resource>>>,
    fallback: Rc<Resource>,
    error: RefCell<Option<LoadError>>,
    on_usable: RefCell<Vec<UsableCallback>>,
    loaded_on: Cell<Option<ThreadId>>,
}

impl ResourceHandle {
    pub(super) fn new(path: String, kind: ResourceKind, fallback: Rc<Resource>) -> Self {
        Self {
            path,
            kind,
            managed: true,
            parked: Cell::new(false),
            state: Cell::new(LoadState::Unloaded),
            holders: Cell::new(0),
            generation: Cell::new(0),
            current: RefCell::new(None),
            fallback,
            error: RefCell::new(None),
            on_usable: RefCell::new(Vec::new()),
            loaded_on: Cell::new(None),
        }
    }

    pub(super) fn new_linked(name: String, resource: Resource, fallback: Rc<Resource>) -> Self {
        let handle = Self {
            managed: false,
            ..Self::new(name, resource.kind(), fallback)
        };
        handle.promote(resource);
        handle
    }

    /// The path the handle was acquired with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The kind inferred from the path.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The current load state.
    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    /// Returns `true` for a handle wrapping an object built in code.
    pub fn is_linked(&self) -> bool {
        !self.managed
    }

    /// Returns `true` while the handle is unloaded because every remaining
    /// pointer is inactive. It loads again once one is reactivated.
    pub fn is_parked(&self) -> bool {
        self.parked.get()
    }

    /// Number of active [`ResourcePointer`]s.
    pub fn refcount(&self) -> usize {
        self.holders.get()
    }

    /// Identifies the latest load. Completions carrying another generation
    /// are stale.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Why the last load failed.
    pub fn error(&self) -> Option<LoadError> {
        self.error.borrow().clone()
    }

    /// The thread that promoted the handle to [`LoadState::Loaded`].
    pub fn loaded_on(&self) -> Option<ThreadId> {
        self.loaded_on.get()
    }

    /// The loaded object, or the fallback while the handle is not usable.
    pub fn get(&self) -> Rc<Resource> {
        if self.state.get() == LoadState::Loaded {
            if let Some(current) = self.current.borrow().as_ref() {
                return Rc::clone(current);
            }
        }
        Rc::clone(&self.fallback)
    }

    /// The placeholder served while the handle is not usable.
    pub fn fallback(&self) -> &Rc<Resource> {
        &self.fallback
    }

    /// Number of continuations waiting for the handle to become usable.
    pub fn waiting_continuations(&self) -> usize {
        self.on_usable.borrow().len()
    }

    // --- State transitions, driven by the agent on the owning thread ---

    /// Enters `Loading` for the load identified by `generation`.
    ///
    /// Generations are unique across the agent, so a result for an evicted
    /// handle can never match a newer handle of the same path.
    pub(super) fn begin_load(&self, generation: u64) {
        self.generation.set(generation);
        self.parked.set(false);
        self.state.set(LoadState::Loading);
        self.error.replace(None);
    }

    /// Publishes `resource` and runs every queued continuation.
    pub(super) fn promote(&self, resource: Resource) -> Option<Rc<Resource>> {
        let resource = Rc::new(resource);
        let previous = self.current.replace(Some(Rc::clone(&resource)));
        self.state.set(LoadState::Loaded);
        self.error.replace(None);
        self.loaded_on.set(Some(thread::current().id()));

        // Continuations may register further continuations.
        let continuations = self.on_usable.take();
        for continuation in continuations {
            continuation(&resource);
        }
        previous
    }

    pub(super) fn fail(&self, error: LoadError) {
        self.state.set(LoadState::Failed);
        self.error.replace(Some(error));
    }

    /// Invalidates any in-flight load and returns the loaded object, if any.
    pub(super) fn unload(&self) -> Option<Rc<Resource>> {
        self.state.set(LoadState::Unloaded);
        self.error.replace(None);
        self.loaded_on.set(None);
        self.current.replace(None)
    }

    pub(super) fn park(&self) -> Option<Rc<Resource>> {
        self.parked.set(true);
        self.unload()
    }

    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation && self.state.get() == LoadState::Loading
    }

    fn on_usable_once(&self, continuation: UsableCallback) {
        if self.state.get() == LoadState::Loaded {
            let resource = self.get();
            continuation(&resource);
        } else {
            self.on_usable.borrow_mut().push(continuation);
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("linked", &!self.managed)
            .field("state", &self.state.get())
            .field("holders", &self.holders.get())
            .field("generation", &self.generation.get())
            .field("error", &self.error.borrow())
            .finish()
    }
}

/// A counted reference to a [`ResourceHandle`].
///
/// An active pointer counts as a holder of the handle: cloning an active
/// pointer increments the handle's reference count, dropping it decrements
/// it. An inactive pointer keeps the handle reachable without holding it, so
/// the agent may unload the object while only inactive pointers remain.
/// Until the handle is [`LoadState::Loaded`], [`get`](Self::get) transparently
/// returns the fallback object of the resource kind.
pub struct ResourcePointer {
    handle: Rc<ResourceHandle>,
    active: bool,
}

impl ResourcePointer {
    pub(super) fn new(handle: Rc<ResourceHandle>) -> Self {
        handle.holders.set(handle.holders.get() + 1);
        Self {
            handle,
            active: true,
        }
    }

    /// Starts or stops counting this pointer as a holder of the handle.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        let holders = self.handle.holders.get();
        if active {
            self.handle.holders.set(holders + 1);
        } else {
            self.handle.holders.set(holders.saturating_sub(1));
        }
    }

    /// Returns `true` if the pointer counts as a holder.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The loaded object, or the fallback while the resource is not usable.
    pub fn get(&self) -> Rc<Resource> {
        self.handle.get()
    }

    /// The current load state.
    pub fn state(&self) -> LoadState {
        self.handle.state()
    }

    /// Returns `true` once the resource is loaded.
    pub fn is_usable(&self) -> bool {
        self.handle.state().is_usable()
    }

    /// Number of active pointers sharing the handle.
    pub fn refcount(&self) -> usize {
        self.handle.refcount()
    }

    /// The path the resource was acquired with.
    pub fn path(&self) -> &str {
        self.handle.path()
    }

    /// The kind of the resource.
    pub fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    /// Why the last load failed, if it did.
    pub fn error(&self) -> Option<LoadError> {
        self.handle.error()
    }

    /// The thread that promoted the resource to loaded.
    pub fn loaded_on(&self) -> Option<ThreadId> {
        self.handle.loaded_on()
    }

    /// Runs `continuation` the first time the resource becomes loaded.
    ///
    /// If it is already loaded, `continuation` runs immediately. Otherwise it
    /// runs on the owning thread during the update that promotes the handle,
    /// and stays queued across failures until a later reload succeeds.
    pub fn on_usable_once<F>(&self, continuation: F)
    where
        F: FnOnce(&Resource) + 'static,
    {
        self.handle.on_usable_once(Box::new(continuation));
    }

    /// Returns `true` if both pointers share one handle.
    pub fn ptr_eq(&self, other: &ResourcePointer) -> bool {
        Rc::ptr_eq(&self.handle, &other.handle)
    }

    /// The shared handle.
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }
}

impl Clone for ResourcePointer {
    fn clone(&self) -> Self {
        let mut pointer = Self::new(Rc::clone(&self.handle));
        pointer.set_active(self.active);
        pointer
    }
}

impl Drop for ResourcePointer {
    fn drop(&mut self) {
        if self.active {
            self.handle.holders.set(self.handle.holders.get().saturating_sub(1));
        }
    }
}

impl fmt::Debug for ResourcePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePointer")
            .field("active", &self.active)
            .field("handle", &self.handle)
            .finish()
    }
}
