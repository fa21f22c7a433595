use nalgebra_glm::Mat4;
use web_time::{Duration, Instant};

use sky_core::camera::CameraState;
use sky_core::clock::{AnimationClock, DEFAULT_ANIMATION_SPEED};
use sky_core::program::{compile_program, ShaderStage};
use sky_core::uniform_binding::{UniformBinding, UniformName};
use sky_core::uniform_buffer::UniformBlock;
use sky_core::{
    FrameTarget, LinkedProgram, ProgramBackend, ProgramError, Scene, SKY_FRAGMENT_SHADER,
    SKY_VERTEX_SHADER,
};

/// Hands out numbered programs and remembers every release.
#[derive(Default)]
struct RecordingBackend {
    created: Vec<UniformBinding>,
    destroyed: Vec<usize>,
}

impl ProgramBackend for RecordingBackend {
    type Program = usize;

    fn create_program(&mut self, linked: &LinkedProgram) -> Result<usize, ProgramError> {
        self.created.push(linked.binding().clone());
        Ok(self.created.len() - 1)
    }

    fn destroy_program(&mut self, program: usize) {
        self.destroyed.push(program);
    }
}

/// Decodes each submitted uniform block through the program's binding.
struct RecordingFrame<'a> {
    bindings: &'a [UniformBinding],
    draws: Vec<Draw>,
}

#[derive(Debug)]
struct Draw {
    program: usize,
    aspect_ratio: Option<f32>,
    time: Option<f32>,
    rotation_x: Option<Mat4>,
    rotation_y: Option<Mat4>,
    model: Option<Mat4>,
}

impl FrameTarget<usize> for RecordingFrame<'_> {
    fn draw_quad(&mut self, program: &usize, uniforms: &UniformBlock) {
        let binding = &self.bindings[*program];
        self.draws.push(Draw {
            program: *program,
            aspect_ratio: binding.read_scalar(uniforms, UniformName::AspectRatio),
            time: binding.read_scalar(uniforms, UniformName::Time),
            rotation_x: binding.read_matrix(uniforms, UniformName::RotationX),
            rotation_y: binding.read_matrix(uniforms, UniformName::RotationY),
            model: binding.read_matrix(uniforms, UniformName::Model),
        });
    }
}

fn sky_scene(start_time: f64) -> Scene<usize> {
    Scene::new(
        CameraState::default(),
        AnimationClock::new(start_time, DEFAULT_ANIMATION_SPEED),
    )
}

#[test]
fn bundled_sky_links_with_every_uniform() {
    let linked = compile_program(Some(SKY_VERTEX_SHADER), Some(SKY_FRAGMENT_SHADER))
        .expect("bundled sky links");
    for name in UniformName::ALL {
        assert!(linked.binding().is_present(name), "{name} missing");
    }
}

#[test]
fn paused_scene_draws_once_with_frozen_time() {
    let mut backend = RecordingBackend::default();
    let mut scene = sky_scene(-10.0);
    scene
        .create_entity(
            &mut backend,
            Some(SKY_VERTEX_SHADER),
            Some(SKY_FRAGMENT_SHADER),
        )
        .expect("sky entity");

    let t0 = Instant::now();
    scene.clock.advance(t0);
    scene.clock.toggle();

    let mut frame = RecordingFrame {
        bindings: &backend.created,
        draws: Vec::new(),
    };
    scene.render(&mut frame, 800, 600, t0 + Duration::from_secs(2));

    assert_eq!(frame.draws.len(), 1);
    let draw = &frame.draws[0];
    assert_eq!(draw.program, 0);
    assert_eq!(draw.aspect_ratio, Some(800.0 / 600.0));
    assert_eq!(draw.time, Some(-10.0));
    assert_eq!(draw.rotation_x, Some(Mat4::identity()));
    assert_eq!(draw.rotation_y, Some(Mat4::identity()));
    assert_eq!(draw.model, Some(Mat4::identity()));
}

#[test]
fn cursor_motion_reaches_the_rotations() {
    let mut backend = RecordingBackend::default();
    let mut scene = sky_scene(0.0);
    scene
        .create_entity(
            &mut backend,
            Some(SKY_VERTEX_SHADER),
            Some(SKY_FRAGMENT_SHADER),
        )
        .expect("sky entity");

    scene.camera.observe_cursor(10.0, 10.0);
    scene.camera.observe_cursor(110.0, 10.0);

    let mut frame = RecordingFrame {
        bindings: &backend.created,
        draws: Vec::new(),
    };
    let uniforms = scene.render(&mut frame, 640, 480, Instant::now());

    assert!((scene.camera.r - 0.2).abs() < 1e-6);
    assert_eq!(scene.camera.r2, 0.0);
    assert_eq!(frame.draws[0].rotation_y, Some(uniforms.rotation_y));
    assert_ne!(uniforms.rotation_y, Mat4::identity());
    assert_eq!(frame.draws[0].rotation_x, Some(Mat4::identity()));
}

#[test]
fn entities_share_frame_values_and_skip_absent_uniforms() {
    let time_only = r#"
struct Uniforms { time: f32 }
@group(0) @binding(0) var<uniform> u: Uniforms;
@fragment fn fragment_main() -> @location(0) vec4<f32> { return vec4<f32>(fract(u.time)); }
"#;

    let mut backend = RecordingBackend::default();
    let mut scene = sky_scene(1.5);
    scene
        .create_entity(
            &mut backend,
            Some(SKY_VERTEX_SHADER),
            Some(SKY_FRAGMENT_SHADER),
        )
        .expect("sky entity");
    scene
        .create_entity(&mut backend, None, Some(time_only))
        .expect("time-only entity");

    let mut frame = RecordingFrame {
        bindings: &backend.created,
        draws: Vec::new(),
    };
    scene.render(&mut frame, 1024, 768, Instant::now());

    let programs: Vec<_> = frame.draws.iter().map(|draw| draw.program).collect();
    assert_eq!(programs, vec![0, 1]);
    assert_eq!(frame.draws[0].time, frame.draws[1].time);
    assert_eq!(frame.draws[1].aspect_ratio, None);
    assert_eq!(frame.draws[1].model, None);
}

#[test]
fn invalid_fragment_fails_before_any_draw() {
    let mut backend = RecordingBackend::default();
    let mut scene = sky_scene(0.0);
    let error = scene
        .create_entity(
            &mut backend,
            Some(SKY_VERTEX_SHADER),
            Some("@fragment fn fragment_main() -> @location(0) vec4<f32> { return oops; }"),
        )
        .expect_err("fragment does not compile");

    assert!(matches!(
        error,
        ProgramError::Compile {
            stage: ShaderStage::Fragment,
            ..
        }
    ));
    assert!(backend.created.is_empty());

    let mut frame = RecordingFrame {
        bindings: &backend.created,
        draws: Vec::new(),
    };
    scene.render(&mut frame, 800, 600, Instant::now());
    assert!(frame.draws.is_empty());
}

#[test]
fn destroy_releases_each_program_once() {
    let mut backend = RecordingBackend::default();
    let mut scene = sky_scene(0.0);
    for _ in 0..5 {
        scene
            .create_entity(
                &mut backend,
                Some(SKY_VERTEX_SHADER),
                Some(SKY_FRAGMENT_SHADER),
            )
            .expect("sky entity");
    }

    assert_eq!(scene.destroy(&mut backend), 5);
    let mut released = backend.destroyed.clone();
    released.sort_unstable();
    assert_eq!(released, vec![0, 1, 2, 3, 4]);
}
