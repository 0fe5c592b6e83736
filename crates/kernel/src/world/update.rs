//! The frame loop.
//!
//! One frame runs, in order: init batches, the next-frame queue, PreAsync,
//! Async, the post-async queue, PostAsync, the delete sweep, transform
//! propagation, the post-transform queue and PostTransform.

use std::time::{Duration, Instant};

use crate::handle::{ComponentHandle, GameObjectHandle};
use crate::message::QueueType;
use crate::scheduler::{FunctionOwner, UpdatePhase};
use crate::stats::FrameCounters;

use super::World;

impl World {
    /// Advance one frame by the configured fixed step.
    pub fn update(&mut self) -> &FrameCounters {
        let step = self.state.config.fixed_step();
        self.update_with_step(step)
    }

    /// Advance one frame by `step` (scaled by the clock speed).
    pub fn update_with_step(&mut self, step: Duration) -> &FrameCounters {
        let frame_start = Instant::now();
        self.state.clock.begin_frame(step);
        let frame = self.state.clock.frame();
        let _span = tracing::info_span!("world_update", world = %self.state.config.name, frame).entered();
        self.stats.last = FrameCounters {
            frame,
            ..FrameCounters::default()
        };

        self.process_init_batches();
        self.drain_queue(QueueType::NextFrame);
        self.run_sync_phase(UpdatePhase::PreAsync);
        self.run_async_phase();
        self.drain_queue(QueueType::PostAsync);
        self.run_sync_phase(UpdatePhase::PostAsync);
        self.sweep_deletions();
        self.stats.last.objects_moved = self.state.objects.propagate_transforms();
        self.drain_queue(QueueType::PostTransform);
        self.run_sync_phase(UpdatePhase::PostTransform);

        self.state.clock.end_frame();
        self.stats.frame_time.record(frame_start.elapsed());
        tracing::trace!(counters = ?self.stats.last, "frame complete");
        &self.stats.last
    }

    fn run_sync_phase(&mut self, phase: UpdatePhase) {
        let _span = tracing::debug_span!("phase", %phase).entered();
        let started = Instant::now();
        let runnable = self
            .scheduler
            .runnable(phase, self.state.clock.frame(), self.state.simulating);
        for &(owner, function) in &runnable {
            match owner {
                FunctionOwner::Manager(id) => {
                    if let Some(manager) = self.managers.get_dyn_mut(id) {
                        manager.run_sync(function, &mut self.state.context());
                    }
                }
                FunctionOwner::Module(id) => {
                    // The module leaves the registry while it runs so the
                    // context can still reach every other module.
                    if let Some(mut module) = self.state.modules.take(id) {
                        module.run(function, &mut self.state.context());
                        self.state.modules.restore(id, module);
                    }
                }
            }
        }
        self.stats.last.update_functions_run += runnable.len();
        self.stats.record_phase(phase, started.elapsed());
    }

    fn run_async_phase(&mut self) {
        let _span = tracing::debug_span!("phase", phase = %UpdatePhase::Async).entered();
        let started = Instant::now();
        let mut runnable = vec![Vec::new(); self.managers.slot_count()];
        let mut count = 0;
        for (owner, function) in
            self.scheduler
                .runnable(UpdatePhase::Async, self.state.clock.frame(), self.state.simulating)
        {
            if let FunctionOwner::Manager(id) = owner {
                if let Some(functions) = runnable.get_mut(id.0 as usize) {
                    functions.push(function);
                    count += 1;
                }
            }
        }
        if count > 0 {
            let outboxes = match &self.pool {
                Some(pool) => pool.install(|| self.managers.run_async(&self.state, &runnable)),
                None => self.managers.run_async(&self.state, &runnable),
            };
            for outbox in outboxes {
                self.state.absorb(outbox);
            }
        }
        self.stats.last.update_functions_run += count;
        self.stats.record_phase(UpdatePhase::Async, started.elapsed());
    }

    /// Destroy everything queued for deletion. Hooks that run during the
    /// sweep may queue more; those are swept in the same pass.
    fn sweep_deletions(&mut self) {
        let _span = tracing::debug_span!("delete_sweep").entered();
        while !self.state.deletions.is_empty() {
            let queued = self.state.deletions.take();
            for component in queued.components {
                self.release_component(component);
            }
            for (object, cascade) in queued.objects {
                self.remove_object_now(object, cascade);
            }
        }
    }

    /// Remove `handle` and its subtree, children first. Components go in
    /// reverse attachment order.
    pub(crate) fn remove_object_now(&mut self, handle: GameObjectHandle, cascade_empty_parents: bool) {
        if !self.state.objects.is_valid(handle) {
            return;
        }
        let parent = self.state.objects.parent(handle);
        for object in self.state.objects.post_order(handle) {
            let components: Vec<ComponentHandle> = self
                .state
                .objects
                .components(object)
                .iter()
                .rev()
                .copied()
                .collect();
            for component in components {
                self.release_component(component);
            }
            if self.state.objects.remove(object).is_some() {
                self.stats.last.objects_deleted += 1;
                tracing::trace!(%object, "object destroyed");
            }
        }
        if cascade_empty_parents {
            let mut current = parent;
            while let Some(p) = current {
                let Some(object) = self.state.objects.get(p) else {
                    break;
                };
                if !object.children().is_empty() || !object.components().is_empty() {
                    break;
                }
                current = object.parent();
                self.state.objects.remove(p);
                self.stats.last.objects_deleted += 1;
                tracing::trace!(object = %p, "empty parent destroyed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::component::Component;
    use crate::config::WorldConfig;
    use crate::context::ComponentContext;
    use crate::manager::{SimpleManager, UpdatableComponent};
    use crate::object::GameObjectDesc;
    use crate::scheduler::UpdatePhase;
    use crate::world::World;

    #[derive(Default)]
    struct Late {
        frames: Vec<u64>,
    }

    impl Component for Late {}

    impl UpdatableComponent for Late {
        const PHASE: UpdatePhase = UpdatePhase::PostTransform;

        fn update(&mut self, ctx: &mut ComponentContext<'_, '_>) {
            self.frames.push(ctx.frame());
        }
    }

    #[test]
    fn frame_counters_report_work() {
        let mut world = World::new(WorldConfig::default()).unwrap();
        let object = world.create_object(GameObjectDesc::new()).unwrap();
        let late = world
            .create_component::<SimpleManager<Late>>(object, Late::default())
            .unwrap();
        let counters = world.update().clone();
        assert_eq!(counters.frame, 0);
        assert_eq!(counters.components_initialized, 1);
        assert_eq!(counters.update_functions_run, 1);
        assert_eq!(world.component::<Late>(late).unwrap().frames, vec![0]);
        assert_eq!(world.stats().frame_time.count(), 1);
    }

    #[test]
    fn cascade_removes_empty_ancestors_only() {
        let mut world = World::new(WorldConfig::default()).unwrap();
        let keeper = world.create_object(GameObjectDesc::new()).unwrap();
        world
            .create_component::<SimpleManager<Late>>(keeper, Late::default())
            .unwrap();
        let empty = world
            .create_object(GameObjectDesc::new().with_parent(keeper))
            .unwrap();
        let leaf = world
            .create_object(GameObjectDesc::new().with_parent(empty))
            .unwrap();
        assert!(world.destroy_object(leaf, true));
        world.update();
        assert!(!world.is_object_valid(leaf));
        assert!(!world.is_object_valid(empty));
        assert!(world.is_object_valid(keeper));
    }
}
