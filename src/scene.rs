//! # Scene Module
//!
//! The scene is the collection of everything that gets drawn each frame: an ordered list
//! of entities, the camera that orients them and the animation clock that drives them.
//!
//! ## Entities
//!
//! An [`Entity`] owns exactly one program, created through a [`ProgramBackend`], together
//! with the program's [`UniformBinding`] and a CPU-side [`UniformBlock`]. Every entity is
//! drawn as the same full-screen quad, so entities differ only in their shaders.
//!
//! Entities are appended with [`Scene::create_entity`] and never removed individually.
//! Insertion order is draw order.
//!
//! ## Per-frame update
//!
//! [`Scene::render`] computes one [`FrameUniforms`] value for the frame (projection from
//! the viewport, both rotations from the camera, time from the clock) and hands it to each
//! entity in turn. Each entity writes whichever of those uniforms its program declares,
//! then submits its draw to a [`FrameTarget`].
//!
//! ## Teardown
//!
//! [`Scene::destroy`] consumes the scene and releases every program through the backend.
//! Since the scene is moved into the call, it cannot be destroyed twice, and since each
//! program is moved out of its entity, no program can be released twice either.

use nalgebra_glm::Mat4;
use web_time::Instant;

use crate::camera::CameraState;
use crate::clock::AnimationClock;
use crate::program::{compile_program, LinkedProgram, ProgramBackend, ProgramError};
use crate::transform::{aspect_ratio, projection};
use crate::uniform_binding::{UniformBinding, UniformName};
use crate::uniform_buffer::UniformBlock;

/// Receives draw submissions for one frame.
///
/// Each call draws the full-screen quad with `program`, after uploading `uniforms` as
/// the program's uniform block.
pub trait FrameTarget<P> {
    fn draw_quad(&mut self, program: &P, uniforms: &UniformBlock);
}

/// The values shared by every entity for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    pub projection: Mat4,
    pub rotation_x: Mat4,
    pub rotation_y: Mat4,
    pub aspect_ratio: f32,
    pub time: f32,
}

/// Index of an entity within its scene.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One drawable: a program plus the uniform state that feeds it.
#[derive(Debug)]
pub struct Entity<P> {
    program: P,
    binding: UniformBinding,
    block: UniformBlock,
}

impl<P> Entity<P> {
    fn new(program: P, linked: &LinkedProgram) -> Self {
        let binding = linked.binding().clone();
        let mut block = UniformBlock::zeroed(linked.block_size());
        // The model matrix is fixed for the entity's lifetime.
        binding.write_matrix(&mut block, UniformName::Model, &Mat4::identity());
        Self {
            program,
            binding,
            block,
        }
    }

    /// Writes this frame's uniforms and submits the quad.
    pub fn render<F: FrameTarget<P>>(&mut self, frame: &mut F, uniforms: &FrameUniforms) {
        let binding = &self.binding;
        let block = &mut self.block;
        binding.write_matrix(block, UniformName::Projection, &uniforms.projection);
        binding.write_matrix(block, UniformName::RotationX, &uniforms.rotation_x);
        binding.write_matrix(block, UniformName::RotationY, &uniforms.rotation_y);
        binding.write_scalar(block, UniformName::AspectRatio, uniforms.aspect_ratio);
        binding.write_scalar(block, UniformName::Time, uniforms.time);

        frame.draw_quad(&self.program, &self.block);
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn binding(&self) -> &UniformBinding {
        &self.binding
    }

    pub fn block(&self) -> &UniformBlock {
        &self.block
    }
}

/// Ordered entities plus the camera and clock that drive them.
#[derive(Debug)]
pub struct Scene<P> {
    entities: Vec<Entity<P>>,
    pub camera: CameraState,
    pub clock: AnimationClock,
}

impl<P> Scene<P> {
    pub fn new(camera: CameraState, clock: AnimationClock) -> Self {
        Self {
            entities: Vec::new(),
            camera,
            clock,
        }
    }

    /// Compiles a program from the given stage sources, uploads it and appends a new
    /// entity for it.
    ///
    /// Nothing is appended on failure.
    pub fn create_entity<B>(
        &mut self,
        backend: &mut B,
        vertex: Option<&str>,
        fragment: Option<&str>,
    ) -> Result<EntityId, ProgramError>
    where
        B: ProgramBackend<Program = P>,
    {
        let linked = compile_program(vertex, fragment)?;
        let program = backend.create_program(&linked)?;

        let id = EntityId(self.entities.len());
        log::info!(
            "Created entity {id} using uniforms [{}]",
            linked
                .binding()
                .resolved()
                .map(UniformName::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.entities.push(Entity::new(program, &linked));
        Ok(id)
    }

    /// The uniform values for a `width` x `height` viewport at shader time `time`.
    pub fn frame_uniforms(&self, width: u32, height: u32, time: f64) -> FrameUniforms {
        FrameUniforms {
            projection: projection(width, height),
            rotation_x: self.camera.rotation_x(),
            rotation_y: self.camera.rotation_y(),
            aspect_ratio: aspect_ratio(width, height),
            time: time as f32,
        }
    }

    /// Advances the clock to `now` and draws every entity, in insertion order, with the
    /// same frame uniforms. Returns the uniforms that were used.
    pub fn render<F: FrameTarget<P>>(
        &mut self,
        frame: &mut F,
        width: u32,
        height: u32,
        now: Instant,
    ) -> FrameUniforms {
        let time = self.clock.advance(now);
        let uniforms = self.frame_uniforms(width, height, time);
        for entity in &mut self.entities {
            entity.render(frame, &uniforms);
        }
        uniforms
    }

    /// Releases every entity's program, then the scene itself. Returns how many programs
    /// were released.
    pub fn destroy<B>(self, backend: &mut B) -> usize
    where
        B: ProgramBackend<Program = P>,
    {
        let count = self.entities.len();
        for entity in self.entities {
            backend.destroy_program(entity.program);
        }
        log::info!("Scene destroyed, released {count} program(s)");
        count
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity<P>> {
        self.entities.get(id.0)
    }

    pub fn entities(&self) -> &[Entity<P>] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<P> Default for Scene<P> {
    fn default() -> Self {
        Self::new(CameraState::default(), AnimationClock::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
struct Uniforms { M: mat4x4<f32>, time: f32 }
@group(0) @binding(0) var<uniform> u: Uniforms;
@fragment fn fragment_main() -> @location(0) vec4<f32> { return u.M[0] * sin(u.time); }
"#;

    #[derive(Default)]
    struct CountingBackend {
        next: u32,
        destroyed: Vec<u32>,
    }

    impl ProgramBackend for CountingBackend {
        type Program = u32;

        fn create_program(&mut self, _linked: &LinkedProgram) -> Result<u32, ProgramError> {
            self.next += 1;
            Ok(self.next)
        }

        fn destroy_program(&mut self, program: u32) {
            self.destroyed.push(program);
        }
    }

    struct Draws(Vec<u32>);

    impl FrameTarget<u32> for Draws {
        fn draw_quad(&mut self, program: &u32, _uniforms: &UniformBlock) {
            self.0.push(*program);
        }
    }

    #[test]
    fn model_is_identity_from_creation() {
        let mut backend = CountingBackend::default();
        let mut scene = Scene::default();
        let id = scene
            .create_entity(&mut backend, None, Some(FRAGMENT))
            .expect("entity");
        let entity = scene.entity(id).expect("present");
        assert_eq!(
            entity.binding().read_matrix(entity.block(), UniformName::Model),
            Some(Mat4::identity())
        );
    }

    #[test]
    fn draws_in_insertion_order() {
        let mut backend = CountingBackend::default();
        let mut scene = Scene::default();
        for _ in 0..3 {
            scene
                .create_entity(&mut backend, None, Some(FRAGMENT))
                .expect("entity");
        }
        let mut draws = Draws(Vec::new());
        scene.render(&mut draws, 640, 480, Instant::now());
        assert_eq!(draws.0, vec![1, 2, 3]);
    }

    #[test]
    fn failed_entity_is_not_appended() {
        let mut backend = CountingBackend::default();
        let mut scene: Scene<u32> = Scene::default();
        assert!(scene
            .create_entity(&mut backend, None, Some("not wgsl"))
            .is_err());
        assert!(scene.is_empty());
        assert_eq!(backend.next, 0);
    }

    #[test]
    fn time_is_written_each_frame() {
        let mut backend = CountingBackend::default();
        let mut scene = Scene::new(
            CameraState::default(),
            AnimationClock::new(4.0, crate::clock::DEFAULT_ANIMATION_SPEED),
        );
        let id = scene
            .create_entity(&mut backend, None, Some(FRAGMENT))
            .expect("entity");
        let uniforms = scene.render(&mut Draws(Vec::new()), 100, 100, Instant::now());
        assert_eq!(uniforms.time, 4.0);
        let entity = scene.entity(id).expect("present");
        assert_eq!(
            entity.binding().read_scalar(entity.block(), UniformName::Time),
            Some(4.0)
        );
    }
}
