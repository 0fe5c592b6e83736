//! Immediate delivery, deferred queues and event-handler search.

use std::any::TypeId;
use std::time::Duration;

use crate::context::WorldState;
use crate::handle::{ComponentHandle, GameObjectHandle};
use crate::manager::ManagerRegistry;
use crate::message::{Message, MessageReceiver, QueueType};

use super::World;

impl World {
    /// Deliver `message` to every activated component of `receiver` that
    /// handles it, and to its descendants when `recursive` is set. Returns
    /// how many handlers ran.
    pub fn send_message<M: Message>(
        &mut self,
        receiver: GameObjectHandle,
        message: M,
        recursive: bool,
    ) -> usize {
        let delivered = deliver_to_object(
            &mut self.managers,
            &mut self.state,
            receiver,
            &message,
            recursive,
        );
        self.stats.last.messages_delivered += delivered;
        delivered
    }

    /// Deliver `message` to one component now. Returns whether a handler ran.
    pub fn send_message_to_component<M: Message>(&mut self, receiver: ComponentHandle, message: M) -> bool {
        let handled = deliver_to_component(&mut self.managers, &mut self.state, receiver, &message);
        if handled {
            self.stats.last.messages_delivered += 1;
        }
        handled
    }

    /// Queue `message` for delivery when `queue` is drained and `delay` of
    /// simulation time has passed.
    pub fn post_message<M: Message>(
        &mut self,
        receiver: impl Into<MessageReceiver>,
        message: M,
        delay: Duration,
        queue: QueueType,
    ) {
        self.state
            .post(receiver.into(), Box::new(message), delay, queue);
    }

    /// Messages waiting in `queue`, due or not.
    pub fn pending_messages(&self, queue: QueueType) -> usize {
        self.state.queues.len(queue)
    }

    /// Components that would receive event `M` raised at `search_object`.
    ///
    /// The search walks from `search_object` up through its ancestors and
    /// stops at the first object with a handler, or with an event-boundary
    /// component. If it reaches a root without finding one, the registered
    /// global handlers that handle `M` are returned instead.
    pub fn find_event_handlers<M: Message>(&self, search_object: GameObjectHandle) -> Vec<ComponentHandle> {
        self.find_handlers_for(TypeId::of::<M>(), search_object)
    }

    /// Deliver `message` to [`World::find_event_handlers`]. Returns how many
    /// handlers ran.
    pub fn send_event_message<M: Message>(&mut self, message: M, search_object: GameObjectHandle) -> usize {
        let handlers = self.find_event_handlers::<M>(search_object);
        let delivered = handlers
            .into_iter()
            .filter(|&h| deliver_to_component(&mut self.managers, &mut self.state, h, &message))
            .count();
        self.stats.last.messages_delivered += delivered;
        delivered
    }

    fn find_handlers_for(&self, message_type: TypeId, search_object: GameObjectHandle) -> Vec<ComponentHandle> {
        if !self.state.objects.is_valid(search_object) {
            return Vec::new();
        }
        let mut current = Some(search_object);
        while let Some(handle) = current {
            let Some(object) = self.state.objects.get(handle) else {
                break;
            };
            let mut found = Vec::new();
            let mut boundary = false;
            for &component in object.components() {
                let Some(manager) = self.managers.get_dyn(component.type_id()) else {
                    continue;
                };
                if manager.handles_message(component, message_type) {
                    found.push(component);
                }
                boundary |= manager.is_event_boundary(component);
            }
            if !found.is_empty() || boundary {
                return found;
            }
            current = object.parent();
        }
        self.state
            .global_handlers
            .handles()
            .iter()
            .copied()
            .filter(|&c| {
                self.managers
                    .get_dyn(c.type_id())
                    .is_some_and(|m| m.handles_message(c, message_type))
            })
            .collect()
    }

    /// Deliver every due message of `queue`. Handlers may post more; the
    /// queue is re-drained up to `max_message_rounds` times.
    pub(crate) fn drain_queue(&mut self, queue: QueueType) {
        let _span = tracing::debug_span!("drain_messages", ?queue).entered();
        let rounds = self.state.config.max_message_rounds.max(1);
        let mut delivered = 0;
        for _ in 0..rounds {
            let ready = self.state.queues.take_ready(queue, self.state.clock.elapsed());
            if ready.is_empty() {
                break;
            }
            for entry in ready {
                delivered += match entry.receiver {
                    MessageReceiver::Object { handle, recursive } => deliver_to_object(
                        &mut self.managers,
                        &mut self.state,
                        handle,
                        &*entry.message,
                        recursive,
                    ),
                    MessageReceiver::Component(handle) => usize::from(deliver_to_component(
                        &mut self.managers,
                        &mut self.state,
                        handle,
                        &*entry.message,
                    )),
                };
            }
        }
        let left = self
            .state
            .queues
            .ready_count(queue, self.state.clock.elapsed());
        if left > 0 {
            tracing::warn!(?queue, left, rounds, "message rounds exhausted; remaining messages wait for the next drain");
        }
        self.stats.last.messages_delivered += delivered;
    }
}

fn deliver_to_component(
    managers: &mut ManagerRegistry,
    state: &mut WorldState,
    receiver: ComponentHandle,
    message: &dyn Message,
) -> bool {
    managers
        .get_dyn_mut(receiver.type_id())
        .is_some_and(|m| m.dispatch(receiver, message, &mut state.context()))
}

fn deliver_to_object(
    managers: &mut ManagerRegistry,
    state: &mut WorldState,
    receiver: GameObjectHandle,
    message: &dyn Message,
    recursive: bool,
) -> usize {
    let components = state.objects.components(receiver).to_vec();
    let mut delivered = components
        .into_iter()
        .filter(|&c| deliver_to_component(managers, state, c, message))
        .count();
    if recursive {
        let children = state.objects.children(receiver).to_vec();
        for child in children {
            delivered += deliver_to_object(managers, state, child, message, true);
        }
    }
    delivered
}
