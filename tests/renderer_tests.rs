//! Integration tests for the renderer lifecycle, frame sequencing and mesh rendering.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test renderer_tests
//! ```

mod common;

use common::*;
use forward_renderer::backend::{
    Call, Capability, ClearMask, ClientArray, ErrorCode, MatrixMode, Topology, UniformValue,
};
use forward_renderer::scene::Camera;
use forward_renderer::{BackendError, GraphicsBackend, Lighting, MaterialAssets, RendererConfig, RendererError, TextureData};
use glam::{Vec2, Vec3};
use rstest::rstest;

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn setup_configures_context_and_loads_material() {
    let mut renderer = bare_renderer();
    renderer.setup_with_assets(&test_assets()).unwrap();

    let calls = renderer.backend().calls();
    assert_eq!(calls[0], Call::SetClearColor([1.0, 0.769, 0.0, 0.0]));
    assert_eq!(calls[1], Call::SetClearDepth(1.0));
    for capability in [Capability::Texture2d, Capability::Multisample, Capability::DepthTest] {
        assert!(calls.contains(&Call::Enable(capability)), "{capability:?} not enabled");
    }

    assert!(renderer.is_set_up());
    assert_eq!(renderer.backend().live_programs(), 1);
    assert_eq!(renderer.backend().live_textures(), 3);

    let material = renderer.material().unwrap();
    assert_eq!(
        (material.glossiness, material.bumpiness, material.specular_level),
        (7.0, 1.0, 2.0)
    );
    assert_eq!(*renderer.lighting(), Lighting::default());
}

#[test]
fn setup_resolves_custom_attributes() {
    let renderer = renderer();
    let attributes = renderer.program().unwrap().attributes;

    assert!(attributes.tangent.is_some());
    assert!(attributes.binormal.is_some());
    assert!(attributes.color.is_some());
}

#[test]
fn finish_releases_everything_once() {
    let mut renderer = renderer();
    renderer.finish().unwrap();

    assert_eq!(renderer.backend().live_programs(), 0);
    assert_eq!(renderer.backend().live_textures(), 0);
    assert!(matches!(renderer.finish(), Err(RendererError::NotSetUp)));
    assert_eq!(renderer.print_last_error(), ErrorCode::NoError);
}

#[test]
fn setup_twice_replaces_resources() {
    let mut renderer = renderer();
    renderer.setup_with_assets(&test_assets()).unwrap();

    assert_eq!(renderer.backend().live_programs(), 1);
    assert_eq!(renderer.backend().live_textures(), 3);
}

#[test]
fn broken_shader_fails_setup() {
    let mut renderer = bare_renderer();
    let assets = MaterialAssets::with_shaders("not wgsl", FRAGMENT_SHADER);

    let err = renderer.setup_with_assets(&assets).unwrap_err();
    assert!(matches!(
        err,
        RendererError::Backend(BackendError::ShaderCreationFailed(_))
    ));
    assert!(!renderer.is_set_up());
    assert_eq!(renderer.backend().live_programs(), 0);
}

#[test]
fn failed_texture_upload_releases_partial_setup() {
    let mut renderer = bare_renderer();
    let mut assets = test_assets();
    assets.specular = TextureData {
        width: 2,
        height: 2,
        data: vec![0; 4],
        name: "truncated".into(),
    };

    let err = renderer.setup_with_assets(&assets).unwrap_err();
    assert!(matches!(
        err,
        RendererError::Backend(BackendError::TextureCreationFailed(_))
    ));
    assert_eq!(renderer.backend().live_programs(), 0);
    assert_eq!(renderer.backend().live_textures(), 0);
}

#[test]
fn setup_reports_missing_asset_files() {
    let mut renderer = forward_renderer::Renderer::<forward_renderer::RecordingBackend>::new(
        forward_renderer::RecordingBackend::new(),
        RendererConfig::default().with_asset_root("no/such/dir"),
    );

    match renderer.setup() {
        Err(RendererError::Io { path, .. }) => {
            assert!(path.ends_with("Shaders/normal_spec.vs.wgsl"), "{}", path.display())
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

// ============================================================================
// Viewport and camera
// ============================================================================

#[rstest]
#[case(800, 600)]
#[case(1920, 1080)]
#[case(1, 1000)]
fn aspect_ratio_is_height_over_width(#[case] width: u32, #[case] height: u32) {
    let mut renderer = renderer();
    renderer.set_viewport(width, height);

    assert_eq!(renderer.aspect_ratio().unwrap(), height as f32 / width as f32);
    assert_eq!(renderer.viewport(), (width, height));
}

#[test]
fn zero_width_viewport_is_reported() {
    let mut renderer = renderer_with_camera();
    renderer.set_viewport(0, 600);

    assert!(matches!(renderer.aspect_ratio(), Err(RendererError::DegenerateViewport)));
    assert!(matches!(renderer.begin_frame(), Err(RendererError::DegenerateViewport)));
}

#[test]
fn setup_camera_without_camera_loads_nothing() {
    let mut renderer = renderer();
    renderer.setup_camera().unwrap();

    assert_eq!(renderer.backend().count(|c| matches!(c, Call::LoadMatrix { .. })), 0);
}

#[test]
fn setup_camera_loads_view_and_projection() {
    let mut renderer = renderer_with_camera();
    renderer.setup_camera().unwrap();

    let camera = test_camera();
    assert_eq!(
        renderer.backend().calls(),
        &[
            Call::LoadMatrix {
                mode: MatrixMode::ModelView,
                matrix: camera.view_matrix()
            },
            Call::LoadMatrix {
                mode: MatrixMode::Projection,
                matrix: camera.projection_matrix(0.75)
            },
        ]
    );
}

#[test]
fn set_camera_none_disables_matrix_setup() {
    let mut renderer = renderer_with_camera();
    renderer.set_camera(None);
    renderer.begin_frame().unwrap();

    assert_eq!(renderer.backend().calls(), &[Call::Clear(ClearMask::COLOR | ClearMask::DEPTH)]);
}

// ============================================================================
// Frame sequencing
// ============================================================================

#[test]
fn begin_frame_sets_camera_then_clears() {
    let mut renderer = renderer_with_camera();
    renderer.begin_frame().unwrap();

    let calls = renderer.backend().calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[0], Call::LoadMatrix { mode: MatrixMode::ModelView, .. }));
    assert!(matches!(calls[1], Call::LoadMatrix { mode: MatrixMode::Projection, .. }));
    assert_eq!(calls[2], Call::Clear(ClearMask::COLOR | ClearMask::DEPTH));
}

#[test]
fn end_frame_flushes_then_presents() {
    let mut renderer = renderer();
    renderer.end_frame().unwrap();

    assert_eq!(renderer.backend().calls(), &[Call::Flush, Call::Present]);
}

#[test]
fn end_frame_surfaces_present_failure() {
    let mut renderer = renderer();
    renderer.backend_mut().set_fail_present(true);

    assert!(matches!(
        renderer.end_frame(),
        Err(RendererError::Backend(BackendError::SurfaceLost))
    ));
}

// ============================================================================
// Mesh rendering
// ============================================================================

#[rstest]
#[case::single(&[3])]
#[case::three(&[3, 6, 4])]
#[case::empty_model(&[])]
fn render_model_draws_each_mesh_once(#[case] vertex_counts: &[usize]) {
    let mut renderer = renderer_with_camera();
    let model = model_with_meshes(vertex_counts);

    renderer.render_model(&model).unwrap();

    let backend = renderer.backend();
    let draws: Vec<&Call> = backend.draw_calls();
    assert_eq!(draws.len(), model.meshes.len());
    for (draw, mesh) in draws.iter().zip(&model.meshes) {
        assert_eq!(
            **draw,
            Call::DrawElements {
                topology: Topology::Triangles,
                indices: mesh.indices.clone()
            }
        );
    }
    assert_eq!(renderer.print_last_error(), ErrorCode::NoError);
}

#[test]
fn render_model_toggles_arrays_once_per_call() {
    let mut renderer = renderer_with_camera();
    let attributes = renderer.program().unwrap().attributes;
    let model = model_with_meshes(&[3, 6, 9]);

    renderer.render_model(&model).unwrap();

    let backend = renderer.backend();
    for location in [attributes.tangent, attributes.binormal, attributes.color] {
        let location = location.unwrap();
        assert_eq!(backend.count(|c| *c == Call::EnableAttribArray(location)), 1);
        assert_eq!(backend.count(|c| *c == Call::DisableAttribArray(location)), 1);
    }
    for array in ClientArray::ALL {
        assert_eq!(backend.count(|c| *c == Call::EnableClientArray(array)), 1);
        assert_eq!(backend.count(|c| *c == Call::DisableClientArray(array)), 1);
    }
    assert_eq!(backend.count(|c| matches!(c, Call::UseProgram(Some(_)))), 3);
    assert_eq!(backend.count(|c| *c == Call::UseProgram(None)), 3);
}

#[test]
fn render_model_uses_cached_locations() {
    let mut renderer = renderer_with_camera();
    let lookups = renderer.backend().location_lookups();
    let model = model_with_meshes(&[3, 3]);

    renderer.render_model(&model).unwrap();
    renderer.render_model(&model).unwrap();

    assert_eq!(renderer.backend().location_lookups(), lookups);
}

#[test]
fn render_model_uploads_material_and_lighting() {
    let mut renderer = renderer_with_camera();
    let uniforms = renderer.program().unwrap().uniforms;
    let textures = renderer.material().unwrap().textures();

    renderer.render_model(&model_with_meshes(&[3])).unwrap();

    let calls = renderer.backend().calls();
    let uploaded = |location: Option<_>, value: UniformValue| {
        calls.contains(&Call::SetUniform {
            location: location.unwrap(),
            value,
        })
    };
    assert!(uploaded(uniforms.diffuse_map, UniformValue::Int(0)));
    assert!(uploaded(uniforms.bump_map, UniformValue::Int(1)));
    assert!(uploaded(uniforms.spec_map, UniformValue::Int(2)));
    assert!(uploaded(uniforms.eye_position, UniformValue::Vec3(test_camera().position)));
    assert!(uploaded(uniforms.light_position, UniformValue::Vec3(Vec3::splat(100.0))));
    assert!(uploaded(uniforms.ambient_light, UniformValue::Vec3(Vec3::splat(0.25))));
    assert!(uploaded(uniforms.glossiness, UniformValue::Float(7.0)));
    assert!(uploaded(uniforms.specular_level, UniformValue::Float(2.0)));

    for (unit, texture) in textures.into_iter().enumerate() {
        assert!(calls.contains(&Call::BindTexture {
            unit: unit as u32,
            texture: Some(texture)
        }));
    }
}

#[test]
fn eye_position_follows_camera_between_calls() {
    let mut renderer = renderer_with_camera();
    let eye = renderer.program().unwrap().uniforms.eye_position.unwrap();
    let model = model_with_meshes(&[3]);

    renderer.render_model(&model).unwrap();
    renderer.camera_mut().unwrap().set_position(Vec3::new(-4.0, 0.0, 0.0));
    renderer.render_model(&model).unwrap();
    renderer.set_camera(None);
    renderer.render_model(&model).unwrap();

    let eyes: Vec<UniformValue> = renderer
        .backend()
        .calls()
        .iter()
        .filter_map(|call| match call {
            Call::SetUniform { location, value } if *location == eye => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(
        eyes,
        vec![
            UniformValue::Vec3(test_camera().position),
            UniformValue::Vec3(Vec3::new(-4.0, 0.0, 0.0)),
            UniformValue::Vec3(Vec3::new(-4.0, 0.0, 0.0)),
        ]
    );
}

#[test]
fn render_model_with_custom_material() {
    let mut renderer = renderer_with_camera();
    let glossiness = renderer.program().unwrap().uniforms.glossiness.unwrap();
    let material = renderer.material().unwrap().clone().with_glossiness(32.0);

    renderer
        .render_model_with(&model_with_meshes(&[3]), &material)
        .unwrap();

    assert!(renderer.backend().calls().contains(&Call::SetUniform {
        location: glossiness,
        value: UniformValue::Float(32.0)
    }));
}

#[test]
fn invalid_mesh_is_rejected_before_drawing() {
    let mut renderer = renderer_with_camera();
    let mut model = model_with_meshes(&[3, 3]);
    model.meshes[1].indices[0] = 99;

    let err = renderer.render_model(&model).unwrap_err();

    assert!(matches!(err, RendererError::InvalidMesh { index: 1, .. }));
    assert!(renderer.backend().calls().is_empty());
}

#[test]
fn render_model_requires_setup() {
    let mut renderer = bare_renderer();
    assert!(matches!(
        renderer.render_model(&model_with_meshes(&[3])),
        Err(RendererError::NotSetUp)
    ));
}

#[test]
fn generated_meshes_render_without_errors() {
    let mut renderer = renderer_with_camera();
    let model = forward_renderer::RenderModel::from(forward_renderer::RenderMesh::cube())
        .with_mesh(forward_renderer::RenderMesh::sphere(12, 6));

    renderer.begin_frame().unwrap();
    renderer.render_model(&model).unwrap();
    renderer.end_frame().unwrap();

    assert_eq!(renderer.print_last_error(), ErrorCode::NoError);
}

// ============================================================================
// Overlay quads
// ============================================================================

#[test]
fn screen_quad_matches_full_quad() {
    let mut renderer = renderer_with_camera();
    let texture = overlay_texture(&mut renderer);

    renderer.render_screen_quad(texture).unwrap();
    let screen = renderer.backend_mut().take_calls();
    renderer
        .render_quad(texture, Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0))
        .unwrap();
    let quad = renderer.backend_mut().take_calls();

    assert_eq!(screen, quad);
}

#[test]
fn render_quad_emits_one_textured_quad() {
    let mut renderer = renderer_with_camera();
    let texture = overlay_texture(&mut renderer);

    renderer
        .render_quad(texture, Vec2::new(-0.5, 0.5), Vec2::new(0.5, -0.5))
        .unwrap();

    let calls = renderer.backend().calls();
    let draws = immediate_draws(calls);
    assert_eq!(draws.len(), 1);
    let uvs: Vec<Vec2> = draws[0].iter().map(|v| v.uv).collect();
    assert_eq!(
        uvs,
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(0.0, -1.0)
        ]
    );
    let positions = flatten(draws[0].iter().map(|v| v.position));
    assert_eq!(positions, vec![-0.5, 0.5, 0.0, 0.5, 0.5, 0.0, 0.5, -0.5, 0.0, -0.5, -0.5, 0.0]);

    assert_eq!(calls[0], Call::UseProgram(None));
    assert!(calls.contains(&Call::BindTexture {
        unit: 0,
        texture: Some(texture)
    }));
    // depth test is restored and the camera reloaded afterwards
    let draw_index = calls.iter().position(Call::is_draw).unwrap();
    assert_eq!(calls[draw_index + 1], Call::Enable(Capability::DepthTest));
    assert!(matches!(
        calls.last(),
        Some(Call::LoadMatrix { mode: MatrixMode::Projection, .. })
    ));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[rstest]
#[case(ErrorCode::InvalidEnum)]
#[case(ErrorCode::InvalidValue)]
#[case(ErrorCode::InvalidOperation)]
#[case(ErrorCode::StackOverflow)]
#[case(ErrorCode::StackUnderflow)]
#[case(ErrorCode::OutOfMemory)]
#[case(ErrorCode::Unknown(0x1234))]
fn print_last_error_reports_and_resets(#[case] code: ErrorCode) {
    let mut renderer = renderer();
    renderer.backend_mut().raise_error(code);

    assert_eq!(renderer.print_last_error(), code);
    assert_eq!(renderer.print_last_error(), ErrorCode::NoError);
}

#[test]
fn backend_errors_surface_through_print_last_error() {
    let mut renderer = renderer();
    let texture = overlay_texture(&mut renderer);

    renderer.backend_mut().delete_texture(texture);
    assert_eq!(renderer.print_last_error(), ErrorCode::NoError);

    renderer.backend_mut().delete_texture(texture);
    assert_eq!(renderer.print_last_error(), ErrorCode::InvalidValue);
}
