//! Demo scene used by the CLI: bodies orbiting a sun, some with a limited
//! lifetime, all tracked by the spatial grid.

use glam::Vec3;
use worldspace_common::Transform;
use worldspace_kernel::{
    Component, ComponentContext, ComponentManager, ComponentReader, ComponentStorage, ComponentWriter,
    GameObjectDesc, GameObjectHandle, SerializationError, SimpleManager, UpdatableComponent,
    UpdateFunctionDesc, World, WorldError,
};
use worldspace_persist::ComponentLoaders;
use worldspace_stream::{SpatialGridModule, SpatialProxies, SpatialProxy};

#[derive(Debug, Default)]
pub struct Orbit {
    pub radius: f32,
    pub speed: f32,
    pub angle: f32,
}

impl Component for Orbit {
    fn serialize(&self, writer: &mut dyn ComponentWriter) -> Result<(), SerializationError> {
        writer.write("radius", self.radius);
        writer.write("speed", self.speed);
        writer.write("angle", self.angle);
        Ok(())
    }

    fn deserialize(&mut self, reader: &dyn ComponentReader, _version: u32) -> Result<(), SerializationError> {
        self.radius = reader.read("radius")?;
        self.speed = reader.read("speed")?;
        self.angle = reader.read_or("angle", 0.0)?;
        Ok(())
    }
}

impl UpdatableComponent for Orbit {
    fn update(&mut self, ctx: &mut ComponentContext<'_, '_>) {
        self.angle = (self.angle + self.speed * ctx.delta_secs()) % std::f32::consts::TAU;
        let owner = ctx.owner();
        let position = Vec3::new(self.angle.cos(), 0.0, self.angle.sin()) * self.radius;
        ctx.objects_mut()
            .set_local_transform(owner, Transform::from_position(position));
    }
}

/// Destroys its owner after a number of frames.
#[derive(Debug, Default)]
pub struct Lifetime {
    pub frames_left: u32,
}

impl Component for Lifetime {
    fn serialize(&self, writer: &mut dyn ComponentWriter) -> Result<(), SerializationError> {
        writer.write("frames_left", self.frames_left);
        Ok(())
    }

    fn deserialize(&mut self, reader: &dyn ComponentReader, _version: u32) -> Result<(), SerializationError> {
        self.frames_left = reader.read("frames_left")?;
        Ok(())
    }
}

#[derive(Default)]
pub struct Lifetimes {
    storage: ComponentStorage<Lifetime>,
}

impl ComponentManager for Lifetimes {
    type Component = Lifetime;

    fn storage(&self) -> &ComponentStorage<Lifetime> {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut ComponentStorage<Lifetime> {
        &mut self.storage
    }

    fn update_functions(&self) -> Vec<UpdateFunctionDesc<Self>> {
        vec![
            UpdateFunctionDesc::parallel("lifetimes::tick", |m: &mut Lifetimes, ctx| {
                for slot in m.storage.iter_active_mut() {
                    if slot.component.frames_left == 0 {
                        continue;
                    }
                    slot.component.frames_left -= 1;
                    if slot.component.frames_left == 0 {
                        ctx.destroy_object(slot.owner(), true);
                    }
                }
            })
            .only_when_simulating(),
        ]
    }
}

pub type Orbits = SimpleManager<Orbit>;

/// Build the demo scene: a sun and `bodies` orbiting it. Returns the sun.
pub fn build_scene(world: &mut World, bodies: usize) -> Result<GameObjectHandle, WorldError> {
    world.get_or_create_module::<SpatialGridModule>()?;
    let sun = world.create_object(GameObjectDesc::new().named("sun").with_global_key("sun"))?;

    for i in 0..bodies {
        let (radius, speed, angle) = {
            let mut ctx = world.context();
            let random = ctx.random();
            (
                random.range_f32(4.0, 200.0),
                random.range_f32(0.1, 2.0),
                random.range_f32(0.0, std::f32::consts::TAU),
            )
        };
        let body = world.create_object(
            GameObjectDesc::new()
                .named(format!("body {i}"))
                .with_parent(sun)
                .dynamic(),
        )?;
        world.create_component::<Orbits>(
            body,
            Orbit {
                radius,
                speed,
                angle,
            },
        )?;
        world.create_component::<SpatialProxies>(body, SpatialProxy::default())?;
        if i % 4 == 3 {
            let frames_left = world.context().random().range_f32(30.0, 120.0) as u32;
            world.create_component::<Lifetimes>(body, Lifetime { frames_left })?;
        }
    }
    tracing::info!(bodies, "demo scene built");
    Ok(sun)
}

/// Loaders for every component type in the demo scene.
pub fn loaders() -> ComponentLoaders {
    let mut loaders = ComponentLoaders::new();
    loaders
        .register::<Orbits>()
        .register::<Lifetimes>()
        .register::<SpatialProxies>();
    loaders
}
