use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use worldspace_kernel::{
    Component, ComponentContext, ComponentHandle, GameObjectDesc, InitBatchDesc, InitBatchId,
    InitBatchState, SimpleManager, UpdatableComponent, World, WorldConfig, WorldError,
};

type Log = Arc<Mutex<Vec<String>>>;

struct Tracked {
    name: &'static str,
    log: Log,
    init_delay: Duration,
}

impl Tracked {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            init_delay: Duration::ZERO,
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    fn record(&self, event: &str) {
        self.log.lock().push(format!("{event} {}", self.name));
    }
}

impl Component for Tracked {
    fn initialize(&mut self, _ctx: &mut ComponentContext<'_, '_>) {
        if !self.init_delay.is_zero() {
            thread::sleep(self.init_delay);
        }
        self.record("init");
    }

    fn deinitialize(&mut self, _ctx: &mut ComponentContext<'_, '_>) {
        self.record("deinit");
    }

    fn on_activated(&mut self, _ctx: &mut ComponentContext<'_, '_>) {
        self.record("activate");
    }

    fn on_simulation_started(&mut self, _ctx: &mut ComponentContext<'_, '_>) {
        self.record("start");
    }
}

impl UpdatableComponent for Tracked {
    fn update(&mut self, _ctx: &mut ComponentContext<'_, '_>) {}
}

type Manager = SimpleManager<Tracked>;

fn world() -> World {
    World::new(WorldConfig::default()).unwrap()
}

fn add(world: &mut World, batch: InitBatchId, component: Tracked) -> ComponentHandle {
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    world
        .create_component_in_batch::<Manager>(object, component, batch)
        .unwrap()
}

fn events(log: &Log) -> Vec<String> {
    log.lock().clone()
}

#[test]
fn batch_waits_for_submit() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(InitBatchDesc::new("level"));
    let member = add(&mut world, batch, Tracked::new("a", &log));

    world.update();
    assert!(events(&log).is_empty());
    assert_eq!(world.init_batch_state(batch), Some(InitBatchState::Collecting));
    assert_eq!(world.init_batch_progress(batch), Some(0.0));

    world.submit_init_batch(batch).unwrap();
    world.update();
    assert!(world.is_init_batch_completed(batch));
    assert_eq!(world.init_batch_progress(batch), Some(1.0));
    assert!(world.component_flags(member).unwrap().activated);
}

#[test]
fn every_member_initializes_before_any_starts() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(InitBatchDesc::new("wave"));
    for name in ["a", "b", "c"] {
        add(&mut world, batch, Tracked::new(name, &log));
    }
    world.submit_init_batch(batch).unwrap();
    world.update();
    assert_eq!(
        events(&log),
        vec![
            "init a", "init b", "init c", "activate a", "start a", "activate b", "start b",
            "activate c", "start c",
        ]
    );
}

#[test]
fn must_finish_batch_completes_at_submit() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(InitBatchDesc::new("cutscene").must_finish_within_frame());
    let members: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| add(&mut world, batch, Tracked::new(name, &log)))
        .collect();

    world.submit_init_batch(batch).unwrap();
    assert!(world.is_init_batch_completed(batch));
    for member in members {
        let flags = world.component_flags(member).unwrap();
        assert!(flags.initialized && flags.activated && flags.simulation_started);
    }
    assert_eq!(events(&log).iter().filter(|e| e.starts_with("start")).count(), 2);
}

#[test]
fn must_finish_batch_over_budget_fails_without_starting() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(
        InitBatchDesc::new("heavy")
            .must_finish_within_frame()
            .with_time_budget(Duration::from_millis(1)),
    );
    let members: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| add(&mut world, batch, Tracked::new(name, &log).slow(Duration::from_millis(5))))
        .collect();

    let err = world.submit_init_batch(batch).unwrap_err();
    match err {
        WorldError::InitBatchFailed {
            name,
            initialized,
            total,
        } => {
            assert_eq!(name, "heavy");
            assert_eq!(initialized, 1);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(world.init_batch_state(batch), Some(InitBatchState::Failed));
    assert_eq!(events(&log), vec!["init a", "deinit a"]);

    world.update();
    world.update();
    for member in members {
        let flags = world.component_flags(member).unwrap();
        assert!(!flags.initialized);
        assert!(!flags.activated);
        assert!(flags.queued_for_init);
    }
    assert!(!events(&log).iter().any(|e| e.starts_with("start")));
}

#[test]
fn default_batch_respects_its_budget() {
    let log = Log::default();
    let config = WorldConfig {
        default_init_batch_budget_ms: Some(0.0),
        ..WorldConfig::default()
    };
    let mut world = World::new(config).unwrap();
    let members: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| add(&mut world, InitBatchId::DEFAULT, Tracked::new(name, &log)))
        .collect();

    world.update();
    assert_eq!(events(&log), vec!["init a"]);
    for _ in 0..4 {
        world.update();
    }
    for member in members {
        assert!(world.component_flags(member).unwrap().activated);
    }
    let log = events(&log);
    let last_init = log.iter().rposition(|e| e.starts_with("init")).unwrap();
    let first_start = log.iter().position(|e| e.starts_with("start")).unwrap();
    assert!(last_init < first_start);
}

#[test]
fn cancelled_batch_hands_members_to_default() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(InitBatchDesc::new("streamed"));
    let member = add(&mut world, batch, Tracked::new("a", &log));
    world.cancel_init_batch(batch).unwrap();
    assert_eq!(world.init_batch_state(batch), Some(InitBatchState::Cancelled));
    world.update();
    assert!(world.component_flags(member).unwrap().activated);
    assert!(!world.is_init_batch_completed(batch));
}

#[test]
fn deleted_batch_is_forgotten() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(InitBatchDesc::new("chunk"));
    add(&mut world, batch, Tracked::new("a", &log));
    world.submit_init_batch(batch).unwrap();
    world.update();
    assert!(world.is_init_batch_completed(batch));

    world.delete_init_batch(batch).unwrap();
    assert_eq!(world.init_batch_state(batch), None);
    assert_eq!(world.init_batch_progress(batch), None);
    assert!(matches!(
        world.submit_init_batch(batch),
        Err(WorldError::UnknownInitBatch(id)) if id == batch
    ));
    assert!(matches!(
        world.delete_init_batch(batch),
        Err(WorldError::UnknownInitBatch(_))
    ));
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let late = world.create_component_in_batch::<Manager>(object, Tracked::new("late", &log), batch);
    assert!(matches!(late, Err(WorldError::UnknownInitBatch(_))));
    assert!(matches!(
        world.delete_init_batch(InitBatchId::DEFAULT),
        Err(WorldError::DefaultInitBatch(_))
    ));
}

#[test]
fn deleting_an_unfinished_batch_hands_members_to_default() {
    let log = Log::default();
    let mut world = world();
    let batch = world.create_init_batch(InitBatchDesc::new("abandoned"));
    let member = add(&mut world, batch, Tracked::new("a", &log));
    world.update();
    assert!(events(&log).is_empty());

    world.delete_init_batch(batch).unwrap();
    world.update();
    assert!(world.component_flags(member).unwrap().activated);
    assert_eq!(events(&log), vec!["init a", "activate a", "start a"]);
}

#[test]
fn batch_misuse_is_reported() {
    let log = Log::default();
    let mut world = world();
    assert!(matches!(
        world.submit_init_batch(InitBatchId::DEFAULT),
        Err(WorldError::DefaultInitBatch(_))
    ));
    assert!(matches!(
        world.cancel_init_batch(InitBatchId::DEFAULT),
        Err(WorldError::DefaultInitBatch(_))
    ));

    let batch = world.create_init_batch(InitBatchDesc::new("once"));
    world.submit_init_batch(batch).unwrap();
    assert!(matches!(
        world.submit_init_batch(batch),
        Err(WorldError::InitBatchClosed(_))
    ));
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    let late = world.create_component_in_batch::<Manager>(object, Tracked::new("late", &log), batch);
    assert!(matches!(late, Err(WorldError::InitBatchClosed(_))));
    assert!(world.object(object).unwrap().components().is_empty());
}

#[test]
fn components_of_objects_pending_delete_are_not_initialized() {
    let log = Log::default();
    let mut world = world();
    let object = world.create_object(GameObjectDesc::new()).unwrap();
    world
        .create_component::<Manager>(object, Tracked::new("a", &log))
        .unwrap();
    world.destroy_object(object, false);
    world.update();
    assert!(events(&log).is_empty());
    assert!(!world.is_object_valid(object));
}
