//! Update phases, update-function descriptors and the dependency-ordered
//! schedule built from them.
//!
//! # Invariants
//! - Within a synchronous phase, a function runs after every registered
//!   function it depends on.
//! - A registration that would introduce a cycle or a cross-phase dependency
//!   is rejected as a whole and leaves the schedule unchanged.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::context::{AsyncContext, WorldContext};
use crate::error::WorldError;
use crate::handle::ComponentTypeId;
use crate::module::ModuleTypeId;

/// Stage of the per-frame pipeline that runs registered update functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdatePhase {
    PreAsync,
    Async,
    PostAsync,
    PostTransform,
}

impl UpdatePhase {
    pub const ALL: [UpdatePhase; 4] = [
        UpdatePhase::PreAsync,
        UpdatePhase::Async,
        UpdatePhase::PostAsync,
        UpdatePhase::PostTransform,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            UpdatePhase::PreAsync => "pre_async",
            UpdatePhase::Async => "async",
            UpdatePhase::PostAsync => "post_async",
            UpdatePhase::PostTransform => "post_transform",
        }
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which frames an update function runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameThrottle {
    #[default]
    EveryFrame,
    EvenFrames,
    OddFrames,
}

impl FrameThrottle {
    pub fn runs_on(self, frame: u64) -> bool {
        match self {
            FrameThrottle::EveryFrame => true,
            FrameThrottle::EvenFrames => frame % 2 == 0,
            FrameThrottle::OddFrames => frame % 2 == 1,
        }
    }
}

/// Body of an update function registered by a manager or module of type `T`.
pub enum UpdateFn<T> {
    /// Runs on the calling thread with full access to the world context.
    Sync(fn(&mut T, &mut WorldContext<'_>)),
    /// Runs on a worker thread with `&mut` access to the owner only.
    Async(fn(&mut T, &mut AsyncContext<'_>)),
}

impl<T> Clone for UpdateFn<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UpdateFn<T> {}

/// Declaration of one update function.
pub struct UpdateFunctionDesc<T> {
    name: String,
    phase: UpdatePhase,
    dependencies: Vec<String>,
    throttle: FrameThrottle,
    only_when_simulating: bool,
    func: UpdateFn<T>,
}

impl<T> UpdateFunctionDesc<T> {
    /// A function running in one of the synchronous phases.
    pub fn sync(
        name: impl Into<String>,
        phase: UpdatePhase,
        f: fn(&mut T, &mut WorldContext<'_>),
    ) -> Self {
        Self::with_fn(name.into(), phase, UpdateFn::Sync(f))
    }

    /// A function running in the async phase.
    pub fn parallel(name: impl Into<String>, f: fn(&mut T, &mut AsyncContext<'_>)) -> Self {
        Self::with_fn(name.into(), UpdatePhase::Async, UpdateFn::Async(f))
    }

    fn with_fn(name: String, phase: UpdatePhase, func: UpdateFn<T>) -> Self {
        Self {
            name,
            phase,
            dependencies: Vec::new(),
            throttle: FrameThrottle::EveryFrame,
            only_when_simulating: false,
            func,
        }
    }

    /// Run after the function named `dependency`.
    pub fn after(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn throttle(mut self, throttle: FrameThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Skip this function while the world's simulation flag is off.
    pub fn only_when_simulating(mut self) -> Self {
        self.only_when_simulating = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub(crate) fn func(&self) -> UpdateFn<T> {
        self.func
    }
}

/// Who registered an update function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionOwner {
    Manager(ComponentTypeId),
    Module(ModuleTypeId),
}

#[derive(Debug, Clone)]
struct ScheduledFunction {
    name: String,
    phase: UpdatePhase,
    dependencies: Vec<String>,
    throttle: FrameThrottle,
    only_when_simulating: bool,
    owner: FunctionOwner,
    /// Index into the owner's own function list.
    local: usize,
}

impl ScheduledFunction {
    fn should_run(&self, frame: u64, simulating: bool) -> bool {
        self.throttle.runs_on(frame) && (simulating || !self.only_when_simulating)
    }
}

/// All registered update functions and their execution order per phase.
#[derive(Debug, Default)]
pub struct Scheduler {
    functions: Vec<ScheduledFunction>,
    order: [Vec<usize>; 4],
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Register every function declared by `owner`, or none of them.
    pub(crate) fn register<T>(
        &mut self,
        owner: FunctionOwner,
        descs: &[UpdateFunctionDesc<T>],
    ) -> Result<(), WorldError> {
        let mut names: HashSet<&str> = self.functions.iter().map(|f| f.name.as_str()).collect();
        let mut candidate = self.functions.clone();
        for (local, desc) in descs.iter().enumerate() {
            if !names.insert(desc.name.as_str()) {
                return Err(WorldError::DuplicateUpdateFunction(desc.name.clone()));
            }
            let phase_ok = match (desc.func, owner) {
                (UpdateFn::Async(_), FunctionOwner::Module(_)) => false,
                (UpdateFn::Async(_), _) => desc.phase == UpdatePhase::Async,
                (UpdateFn::Sync(_), _) => desc.phase != UpdatePhase::Async,
            };
            if !phase_ok {
                return Err(WorldError::InvalidPhase {
                    function: desc.name.clone(),
                    phase: desc.phase.name(),
                });
            }
            candidate.push(ScheduledFunction {
                name: desc.name.clone(),
                phase: desc.phase,
                dependencies: desc.dependencies.clone(),
                throttle: desc.throttle,
                only_when_simulating: desc.only_when_simulating,
                owner,
                local,
            });
        }
        let order = compute_order(&candidate)?;
        self.functions = candidate;
        self.order = order;
        for desc in descs {
            tracing::debug!(function = desc.name(), phase = %desc.phase, ?owner, "update function registered");
        }
        Ok(())
    }

    /// Drop every function registered by `owner`.
    pub(crate) fn unregister(&mut self, owner: FunctionOwner) {
        self.functions.retain(|f| f.owner != owner);
        match compute_order(&self.functions) {
            Ok(order) => self.order = order,
            Err(err) => tracing::error!(%err, "schedule invalid after unregistering {:?}", owner),
        }
    }

    /// Functions of `phase` that should run this frame, in execution order.
    pub(crate) fn runnable(
        &self,
        phase: UpdatePhase,
        frame: u64,
        simulating: bool,
    ) -> Vec<(FunctionOwner, usize)> {
        self.order[phase.index()]
            .iter()
            .map(|&i| &self.functions[i])
            .filter(|f| f.should_run(frame, simulating))
            .map(|f| (f.owner, f.local))
            .collect()
    }

    /// Names of the functions in `phase`, in execution order.
    pub fn function_names(&self, phase: UpdatePhase) -> Vec<&str> {
        self.order[phase.index()]
            .iter()
            .map(|&i| self.functions[i].name.as_str())
            .collect()
    }
}

/// Kahn's algorithm over all registered functions. Ties are broken by
/// registration order, so the schedule is deterministic.
fn compute_order(functions: &[ScheduledFunction]) -> Result<[Vec<usize>; 4], WorldError> {
    let by_name: HashMap<&str, usize> = functions
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); functions.len()];
    let mut in_degree = vec![0usize; functions.len()];
    for (i, function) in functions.iter().enumerate() {
        for dependency in &function.dependencies {
            // Unknown dependencies are honored once they register.
            let Some(&d) = by_name.get(dependency.as_str()) else {
                continue;
            };
            if functions[d].phase != function.phase {
                return Err(WorldError::CrossPhaseDependency {
                    function: function.name.clone(),
                    dependency: dependency.clone(),
                });
            }
            dependents[d].push(i);
            in_degree[i] += 1;
        }
    }

    let mut order: [Vec<usize>; 4] = Default::default();
    let mut ready: BTreeSet<usize> = (0..functions.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut placed = 0;
    while let Some(i) = ready.pop_first() {
        order[functions[i].phase.index()].push(i);
        placed += 1;
        for &j in &dependents[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if placed < functions.len() {
        let cycle = functions
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, f)| f.name.clone())
            .collect();
        return Err(WorldError::DependencyCycle { functions: cycle });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut (), _: &mut WorldContext<'_>) {}
    fn noop_async(_: &mut (), _: &mut AsyncContext<'_>) {}

    const OWNER: FunctionOwner = FunctionOwner::Manager(ComponentTypeId(0));

    fn pre(name: &str) -> UpdateFunctionDesc<()> {
        UpdateFunctionDesc::sync(name, UpdatePhase::PreAsync, noop)
    }

    #[test]
    fn dependencies_order_functions() {
        let mut scheduler = Scheduler::new();
        scheduler
            .register(OWNER, &[pre("b").after("a"), pre("a"), pre("c")])
            .unwrap();
        assert_eq!(scheduler.function_names(UpdatePhase::PreAsync), vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_dependency_is_honored_once_registered() {
        let mut scheduler = Scheduler::new();
        scheduler.register(OWNER, &[pre("late_reader").after("writer")]).unwrap();
        scheduler
            .register(FunctionOwner::Manager(ComponentTypeId(1)), &[pre("writer")])
            .unwrap();
        assert_eq!(
            scheduler.function_names(UpdatePhase::PreAsync),
            vec!["writer", "late_reader"]
        );
    }

    #[test]
    fn cycle_is_rejected_and_schedule_unchanged() {
        let mut scheduler = Scheduler::new();
        scheduler.register(OWNER, &[pre("a")]).unwrap();
        let err = scheduler
            .register(
                FunctionOwner::Manager(ComponentTypeId(1)),
                &[pre("x").after("y"), pre("y").after("x")],
            )
            .unwrap_err();
        match err {
            WorldError::DependencyCycle { functions } => {
                assert_eq!(functions, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.function_names(UpdatePhase::PreAsync), vec!["a"]);
    }

    #[test]
    fn cross_phase_dependency_is_rejected() {
        let mut scheduler = Scheduler::new();
        let post = UpdateFunctionDesc::<()>::sync("post", UpdatePhase::PostAsync, noop).after("a");
        let err = scheduler.register(OWNER, &[pre("a"), post]).unwrap_err();
        assert!(matches!(err, WorldError::CrossPhaseDependency { .. }));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut scheduler = Scheduler::new();
        scheduler.register(OWNER, &[pre("a")]).unwrap();
        let err = scheduler.register(OWNER, &[pre("a")]).unwrap_err();
        assert!(matches!(err, WorldError::DuplicateUpdateFunction(name) if name == "a"));
    }

    #[test]
    fn sync_function_cannot_use_async_phase() {
        let mut scheduler = Scheduler::new();
        let bad = UpdateFunctionDesc::<()>::sync("bad", UpdatePhase::Async, noop);
        assert!(matches!(
            scheduler.register(OWNER, &[bad]),
            Err(WorldError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn modules_cannot_register_async_functions() {
        let mut scheduler = Scheduler::new();
        let job = UpdateFunctionDesc::<()>::parallel("job", noop_async);
        assert!(matches!(
            scheduler.register(FunctionOwner::Module(ModuleTypeId(0)), &[job]),
            Err(WorldError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn throttle_and_simulation_gate_runnable_functions() {
        let mut scheduler = Scheduler::new();
        scheduler
            .register(
                OWNER,
                &[
                    pre("even").throttle(FrameThrottle::EvenFrames),
                    pre("odd").throttle(FrameThrottle::OddFrames),
                    pre("sim").only_when_simulating(),
                ],
            )
            .unwrap();
        let locals = |frame, simulating| -> Vec<usize> {
            scheduler
                .runnable(UpdatePhase::PreAsync, frame, simulating)
                .into_iter()
                .map(|(_, local)| local)
                .collect()
        };
        assert_eq!(locals(0, true), vec![0, 2]);
        assert_eq!(locals(1, true), vec![1, 2]);
        assert_eq!(locals(2, false), vec![0]);
    }

    #[test]
    fn unregister_removes_owner_functions() {
        let mut scheduler = Scheduler::new();
        let other = FunctionOwner::Manager(ComponentTypeId(1));
        scheduler.register(OWNER, &[pre("a")]).unwrap();
        scheduler.register(other, &[pre("b").after("a")]).unwrap();
        scheduler.unregister(OWNER);
        assert_eq!(scheduler.function_names(UpdatePhase::PreAsync), vec!["b"]);
        assert_eq!(
            scheduler.runnable(UpdatePhase::PreAsync, 0, true),
            vec![(other, 0)]
        );
    }
}
