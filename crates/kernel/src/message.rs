//! Typed messages, per-component-type handler tables and the deferred
//! message queues.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::context::ComponentContext;
use crate::handle::{ComponentHandle, GameObjectHandle};

/// Anything that can be sent to components.
///
/// Implemented for every `Send + Sync + Debug + 'static` type.
pub trait Message: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn message_type(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + fmt::Debug> Message for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn message_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Which drain point a posted message waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    /// Drained right after the async phase.
    PostAsync,
    /// Drained right after transform propagation.
    PostTransform,
    /// Drained at the start of the next frame.
    NextFrame,
}

impl QueueType {
    pub const ALL: [QueueType; 3] = [
        QueueType::PostAsync,
        QueueType::PostTransform,
        QueueType::NextFrame,
    ];

    fn index(self) -> usize {
        match self {
            QueueType::PostAsync => 0,
            QueueType::PostTransform => 1,
            QueueType::NextFrame => 2,
        }
    }
}

/// Target of a posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageReceiver {
    /// Every component of the object, and of all descendants when
    /// `recursive` is set.
    Object {
        handle: GameObjectHandle,
        recursive: bool,
    },
    Component(ComponentHandle),
}

impl From<GameObjectHandle> for MessageReceiver {
    fn from(handle: GameObjectHandle) -> Self {
        MessageReceiver::Object {
            handle,
            recursive: false,
        }
    }
}

impl From<ComponentHandle> for MessageReceiver {
    fn from(handle: ComponentHandle) -> Self {
        MessageReceiver::Component(handle)
    }
}

trait ErasedHandler<C>: Send + Sync {
    fn call(&self, component: &mut C, message: &dyn Message, ctx: &mut ComponentContext<'_, '_>);
}

struct TypedHandler<C, M> {
    f: fn(&mut C, &M, &mut ComponentContext<'_, '_>),
}

impl<C: 'static, M: Message> ErasedHandler<C> for TypedHandler<C, M> {
    fn call(&self, component: &mut C, message: &dyn Message, ctx: &mut ComponentContext<'_, '_>) {
        if let Some(message) = message.as_any().downcast_ref::<M>() {
            (self.f)(component, message, ctx);
        }
    }
}

/// Message handler table of one component type, keyed by message type.
pub struct MessageHandlers<C> {
    table: HashMap<TypeId, Box<dyn ErasedHandler<C>>>,
}

impl<C: 'static> MessageHandlers<C> {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Register `f` as the handler for messages of type `M`, replacing any
    /// previous handler for that type.
    pub fn on<M: Message>(&mut self, f: fn(&mut C, &M, &mut ComponentContext<'_, '_>)) -> &mut Self {
        self.table
            .insert(TypeId::of::<M>(), Box::new(TypedHandler { f }));
        self
    }

    pub fn handles(&self, message_type: TypeId) -> bool {
        self.table.contains_key(&message_type)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Invoke the handler registered for `message`'s type. Returns whether
    /// one existed.
    pub(crate) fn dispatch(
        &self,
        component: &mut C,
        message: &dyn Message,
        ctx: &mut ComponentContext<'_, '_>,
    ) -> bool {
        match self.table.get(&message.message_type()) {
            Some(handler) => {
                handler.call(component, message, ctx);
                true
            }
            None => false,
        }
    }
}

impl<C: 'static> Default for MessageHandlers<C> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct QueuedMessage {
    pub receiver: MessageReceiver,
    pub message: Box<dyn Message>,
    due: Duration,
}

/// The three deferred queues of a world.
#[derive(Default)]
pub(crate) struct MessageQueues {
    queues: [Vec<QueuedMessage>; 3],
}

impl MessageQueues {
    pub fn push(
        &mut self,
        queue: QueueType,
        receiver: MessageReceiver,
        message: Box<dyn Message>,
        due: Duration,
    ) {
        tracing::trace!(?receiver, message = (*message).type_name(), ?queue, "message posted");
        self.queues[queue.index()].push(QueuedMessage {
            receiver,
            message,
            due,
        });
    }

    /// Remove and return every entry of `queue` that is due at `now`, in
    /// enqueue order.
    pub fn take_ready(&mut self, queue: QueueType, now: Duration) -> Vec<QueuedMessage> {
        let pending = std::mem::take(&mut self.queues[queue.index()]);
        let (ready, waiting): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|entry| entry.due <= now);
        self.queues[queue.index()] = waiting;
        ready
    }

    pub fn len(&self, queue: QueueType) -> usize {
        self.queues[queue.index()].len()
    }

    /// Entries of `queue` that are due at `now`.
    pub fn ready_count(&self, queue: QueueType, now: Duration) -> usize {
        self.queues[queue.index()]
            .iter()
            .filter(|entry| entry.due <= now)
            .count()
    }

    pub fn clear(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
    }
}

/// Components currently registered to receive global events, in
/// registration order.
#[derive(Debug, Default)]
pub(crate) struct GlobalHandlers {
    handlers: Vec<ComponentHandle>,
}

impl GlobalHandlers {
    pub fn register(&mut self, handle: ComponentHandle) {
        if !self.handlers.contains(&handle) {
            self.handlers.push(handle);
        }
    }

    pub fn unregister(&mut self, handle: ComponentHandle) {
        self.handlers.retain(|h| *h != handle);
    }

    pub fn handles(&self) -> &[ComponentHandle] {
        &self.handlers
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}
