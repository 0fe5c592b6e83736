//! World Kernel: the runtime that owns game objects, components and their
//! managers, world modules, the update schedule and message routing.
//!
//! # Invariants
//! - Handles never dangle: a handle to a destroyed object or component
//!   resolves to nothing, even after its slot is reused.
//! - Destruction is deferred to the frame's delete sweep; handles stay valid
//!   until then.
//! - Update functions run in their phase in dependency order; ties keep
//!   registration order, so a schedule is deterministic.
//! - Async update functions only see the world through shared references.

pub mod clock;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod init_batch;
pub mod manager;
pub mod message;
pub mod module;
pub mod object;
pub mod registry;
pub mod resource;
pub mod scheduler;
pub mod serialization;
pub mod stats;
pub mod world;

pub use clock::{WorldClock, WorldRandom, saturating_duration};
pub use component::{Component, ComponentFlags, ComponentSlot, ComponentStorage};
pub use config::WorldConfig;
pub use context::{AsyncContext, ComponentContext, WorldContext};
pub use error::WorldError;
pub use handle::{ComponentHandle, ComponentTypeId, GameObjectHandle, MAX_WORLDS};
pub use init_batch::{InitBatchDesc, InitBatchId, InitBatchState};
pub use manager::{ComponentManager, ManagerInfo, SimpleManager, TypeDescriptor, UpdatableComponent};
pub use message::{Message, MessageHandlers, MessageReceiver, QueueType};
pub use module::WorldModule;
pub use object::{GameObject, GameObjectDesc, ObjectStore, TransformPreservation};
pub use registry::{SharedWorld, WorldRegistry};
pub use resource::{ResourceBinding, ResourceHandle, ResourceProvider, ResourceState};
pub use scheduler::{FrameThrottle, Scheduler, UpdateFunctionDesc, UpdatePhase};
pub use serialization::{ComponentReader, ComponentWriter, FieldMap, FieldValue, SerializationError};
pub use stats::{FrameCounters, FrameStats, FrameTimer};
pub use world::World;
