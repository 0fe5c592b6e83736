//! Views of a world handed to update functions and component hooks.
//!
//! Synchronous code receives a [`WorldContext`]: mutable access to objects
//! and modules, deferred messaging and deletion. Component managers are not
//! reachable from it; the manager whose code is running holds them.
//!
//! Async functions receive an [`AsyncContext`]: shared access only, with
//! posted messages and deletions collected in a per-job [`Outbox`] and merged
//! after the phase.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::clock::{WorldClock, WorldRandom};
use crate::config::WorldConfig;
use crate::error::WorldError;
use crate::handle::{ComponentHandle, GameObjectHandle};
use crate::message::{GlobalHandlers, Message, MessageQueues, MessageReceiver, QueueType};
use crate::module::{ModuleRegistry, WorldModule};
use crate::object::{GameObject, GameObjectDesc, ObjectStore};

/// Objects and components waiting for the delete sweep.
#[derive(Debug, Default)]
pub(crate) struct DeleteQueue {
    pub objects: Vec<(GameObjectHandle, bool)>,
    pub components: Vec<ComponentHandle>,
}

impl DeleteQueue {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.components.is_empty()
    }

    pub fn take(&mut self) -> DeleteQueue {
        std::mem::take(self)
    }
}

/// Everything a world owns except its component managers.
pub(crate) struct WorldState {
    pub objects: ObjectStore,
    pub modules: ModuleRegistry,
    pub queues: MessageQueues,
    pub deletions: DeleteQueue,
    pub global_handlers: GlobalHandlers,
    pub clock: WorldClock,
    pub random: WorldRandom,
    pub config: WorldConfig,
    pub simulating: bool,
}

impl WorldState {
    pub fn context(&mut self) -> WorldContext<'_> {
        WorldContext { state: self }
    }

    pub fn post(
        &mut self,
        receiver: MessageReceiver,
        message: Box<dyn Message>,
        delay: Duration,
        queue: QueueType,
    ) {
        let due = self.clock.elapsed() + delay;
        self.queues.push(queue, receiver, message, due);
    }

    pub fn queue_object_deletion(&mut self, handle: GameObjectHandle, cascade: bool) -> bool {
        if !self.objects.mark_pending_delete(handle) {
            return false;
        }
        self.deletions.objects.push((handle, cascade));
        true
    }

    /// Merge what an async job produced.
    pub fn absorb(&mut self, outbox: Outbox) {
        for (queue, receiver, message, due) in outbox.messages {
            self.queues.push(queue, receiver, message, due);
        }
        for (handle, cascade) in outbox.objects {
            self.queue_object_deletion(handle, cascade);
        }
        self.deletions.components.extend(outbox.components);
    }
}

/// Mutable view of a world for synchronous update functions and hooks.
pub struct WorldContext<'w> {
    state: &'w mut WorldState,
}

impl WorldContext<'_> {
    pub fn objects(&self) -> &ObjectStore {
        &self.state.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectStore {
        &mut self.state.objects
    }

    pub fn create_object(&mut self, desc: GameObjectDesc) -> Result<GameObjectHandle, WorldError> {
        self.state.objects.create(desc)
    }

    /// Queue `handle` for destruction at this frame's delete sweep. The
    /// object stays valid until then.
    pub fn destroy_object(&mut self, handle: GameObjectHandle, cascade_empty_parents: bool) -> bool {
        self.state.queue_object_deletion(handle, cascade_empty_parents)
    }

    /// Queue a component for destruction at this frame's delete sweep.
    pub fn destroy_component(&mut self, handle: ComponentHandle) {
        self.state.deletions.components.push(handle);
    }

    /// Post a message to be delivered when `queue` is drained and `delay`
    /// of simulation time has passed.
    pub fn post_message(
        &mut self,
        receiver: impl Into<MessageReceiver>,
        message: impl Message,
        delay: Duration,
        queue: QueueType,
    ) {
        self.state
            .post(receiver.into(), Box::new(message), delay, queue);
    }

    pub fn module<T: WorldModule>(&self) -> Option<&T> {
        self.state.modules.get::<T>()
    }

    pub fn module_mut<T: WorldModule>(&mut self) -> Option<&mut T> {
        self.state.modules.get_mut::<T>()
    }

    pub fn clock(&self) -> &WorldClock {
        &self.state.clock
    }

    pub fn frame(&self) -> u64 {
        self.state.clock.frame()
    }

    pub fn delta_secs(&self) -> f32 {
        self.state.clock.delta_secs()
    }

    pub fn random(&mut self) -> &mut WorldRandom {
        &mut self.state.random
    }

    pub fn config(&self) -> &WorldConfig {
        &self.state.config
    }

    pub fn is_simulating(&self) -> bool {
        self.state.simulating
    }

    pub(crate) fn global_handlers_mut(&mut self) -> &mut GlobalHandlers {
        &mut self.state.global_handlers
    }
}

/// Context of a component hook or message handler: the world view plus the
/// identity of the component being called.
pub struct ComponentContext<'c, 'w> {
    handle: ComponentHandle,
    owner: GameObjectHandle,
    world: &'c mut WorldContext<'w>,
}

impl<'c, 'w> ComponentContext<'c, 'w> {
    pub fn new(
        handle: ComponentHandle,
        owner: GameObjectHandle,
        world: &'c mut WorldContext<'w>,
    ) -> Self {
        Self {
            handle,
            owner,
            world,
        }
    }

    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    pub fn owner(&self) -> GameObjectHandle {
        self.owner
    }

    pub fn owner_object(&self) -> Option<&GameObject> {
        self.world.objects().get(self.owner)
    }

    /// Queue this component for destruction.
    pub fn destroy_self(&mut self) {
        let handle = self.handle;
        self.world.destroy_component(handle);
    }
}

impl<'w> Deref for ComponentContext<'_, 'w> {
    type Target = WorldContext<'w>;

    fn deref(&self) -> &WorldContext<'w> {
        &*self.world
    }
}

impl<'w> DerefMut for ComponentContext<'_, 'w> {
    fn deref_mut(&mut self) -> &mut WorldContext<'w> {
        &mut *self.world
    }
}

/// Messages and deletions produced by one async job.
#[derive(Default)]
pub(crate) struct Outbox {
    messages: Vec<(QueueType, MessageReceiver, Box<dyn Message>, Duration)>,
    objects: Vec<(GameObjectHandle, bool)>,
    components: Vec<ComponentHandle>,
}

/// Read-only view of a world for async update functions.
pub struct AsyncContext<'a> {
    state: &'a WorldState,
    outbox: Outbox,
}

impl<'a> AsyncContext<'a> {
    pub(crate) fn new(state: &'a WorldState) -> Self {
        Self {
            state,
            outbox: Outbox::default(),
        }
    }

    pub(crate) fn into_outbox(self) -> Outbox {
        self.outbox
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.state.objects
    }

    pub fn module<T: WorldModule>(&self) -> Option<&T> {
        self.state.modules.get::<T>()
    }

    pub fn clock(&self) -> &WorldClock {
        &self.state.clock
    }

    pub fn frame(&self) -> u64 {
        self.state.clock.frame()
    }

    pub fn delta_secs(&self) -> f32 {
        self.state.clock.delta_secs()
    }

    pub fn config(&self) -> &WorldConfig {
        &self.state.config
    }

    pub fn is_simulating(&self) -> bool {
        self.state.simulating
    }

    /// Post a message; it is queued once the async phase ends.
    pub fn post_message(
        &mut self,
        receiver: impl Into<MessageReceiver>,
        message: impl Message,
        delay: Duration,
        queue: QueueType,
    ) {
        let due = self.state.clock.elapsed() + delay;
        let message: Box<dyn Message> = Box::new(message);
        self.outbox.messages.push((queue, receiver.into(), message, due));
    }

    /// Queue an object for destruction; it is marked pending once the async
    /// phase ends.
    pub fn destroy_object(&mut self, handle: GameObjectHandle, cascade_empty_parents: bool) {
        self.outbox.objects.push((handle, cascade_empty_parents));
    }

    pub fn destroy_component(&mut self, handle: ComponentHandle) {
        self.outbox.components.push(handle);
    }
}
