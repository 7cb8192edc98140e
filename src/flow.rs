//! Application event loop.
//!
//! The viewer runs on a single render thread driven by winit. Asset loads run
//! elsewhere (the tokio runtime natively, the browser's task queue on the web)
//! and are posted back to the event loop as [`FlowEvent::AssetLoaded`], where
//! they are installed into the scene between frames.
//!
//! # Frame
//!
//! 1. Advance orbit damping and upload the camera uniform
//! 2. Recompute world transforms, upload new or dirty node state
//! 3. Render shadow casters into the light's depth map
//! 4. Render lit meshes, then outline hulls
//! 5. Present

use std::{fmt::Debug, iter, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    assembly::LoadOutcome,
    context::{Context, SceneContext},
    data_structures::{model::DrawMesh, texture::Texture},
    manifest::SceneManifest,
    render::Batches,
    resources::GltfLoader,
    stats::FrameStats,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// GPU context, scene and surface status.
pub struct AppState {
    pub(crate) ctx: Context,
    pub(crate) scene: SceneContext,
    is_surface_configured: bool,
    stats: FrameStats,
}

impl AppState {
    async fn new(window: Arc<Window>, manifest: SceneManifest) -> anyhow::Result<Self> {
        let scene = SceneContext::new(&manifest);
        let ctx = Context::new(window, &manifest.config, &scene).await?;
        Ok(Self {
            ctx,
            scene,
            is_surface_configured: false,
            stats: FrameStats::new(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.scene.controls.set_viewport_height(height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    /// Per-frame CPU work and uploads.
    fn update(&mut self) {
        let scene = &mut self.scene;
        scene.controls.update(&mut scene.camera);
        self.ctx
            .camera
            .write(&self.ctx.queue, &scene.camera, &self.ctx.projection);

        scene.scene.update_world_transforms();
        scene
            .scene
            .write_to_buffers(&self.ctx.queue, &self.ctx.device, &self.ctx.layouts);
    }

    fn render(&mut self) -> Result<(), wgpu::CurrentSurfaceTexture> {
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => texture,
            other => return Err(other),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let batches: Batches = self.scene.scene.get_render().into_iter().collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.light.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            // With shadows off the cleared map leaves every fragment lit
            if self.ctx.shadows_enabled {
                shadow_pass.set_pipeline(&self.ctx.pipelines.shadow);
                shadow_pass.set_bind_group(0, &self.ctx.light.shadow_bind_group, &[]);
                for caster in &batches.shadow_casters {
                    shadow_pass.set_vertex_buffer(1, caster.instance.slice(..));
                    shadow_pass.draw_mesh_instanced(caster.geometry, 0..caster.amount as u32);
                }
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.ctx.pipelines.lit);
            render_pass.set_bind_group(1, &self.ctx.camera.bind_group, &[]);
            render_pass.set_bind_group(2, &self.ctx.light.bind_group, &[]);
            for instanced in &batches.lit {
                render_pass.set_bind_group(0, instanced.material, &[]);
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_mesh_instanced(instanced.geometry, 0..instanced.amount as u32);
            }

            render_pass.set_pipeline(&self.ctx.pipelines.outline);
            render_pass.set_bind_group(1, &self.ctx.camera.bind_group, &[]);
            for instanced in &batches.outlines {
                render_pass.set_bind_group(0, instanced.material, &[]);
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_mesh_instanced(instanced.geometry, 0..instanced.amount as u32);
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    state: Option<AppState>,
    // Taken when the window is first created
    manifest: Option<SceneManifest>,
    loader: GltfLoader,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, manifest: SceneManifest) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        let loader = GltfLoader::new(manifest.config.asset_root.clone());
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            state: None,
            manifest: Some(manifest),
            loader,
        })
    }

    /// Starts every asset load. Each completion comes back as a user event.
    fn spawn_loads(&self, state: &AppState) {
        for load in state.scene.assembler.issue_loads(&self.loader) {
            let proxy = self.proxy.clone();
            let fut = async move {
                let outcome = load.await;
                if proxy.send_event(FlowEvent::AssetLoaded(outcome)).is_err() {
                    log::warn!("event loop closed before a load completed");
                }
            };
            #[cfg(not(target_arch = "wasm32"))]
            self.async_runtime.spawn(fut);
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(fut);
        }
    }
}

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized(AppState),
    AssetLoaded(LoadOutcome),
    #[allow(dead_code)]
    Exit,
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::AssetLoaded(outcome) => f.debug_tuple("AssetLoaded").field(outcome).finish(),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(manifest) = self.manifest.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes =
            Window::default_attributes().with_title(manifest.config.title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self
                .async_runtime
                .block_on(AppState::new(window, manifest))
            {
                Ok(state) => {
                    self.spawn_loads(&state);
                    self.state = Some(state);
                }
                Err(e) => {
                    log::error!("App initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match AppState::new(window, manifest).await {
                    Ok(state) => FlowEvent::Initialized(state),
                    Err(e) => {
                        log::error!("App initialization failed: {e:#}");
                        FlowEvent::Exit
                    }
                };
                if proxy.send_event(event).is_err() {
                    log::error!("event loop closed during initialization");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Initialized(mut state) => {
                // Sent from the wasm `spawn_local` once the GPU is ready
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                self.spawn_loads(&state);
                state.ctx.window.request_redraw();
                self.state = Some(state);
            }
            FlowEvent::AssetLoaded(outcome) => match &mut self.state {
                Some(state) => {
                    state.scene.on_asset_loaded(outcome);
                }
                None => log::warn!("asset loaded before the scene exists"),
            },
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.scene.controls.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                state.stats.tick();
                state.update();
                match state.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {:?}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Opens the window and runs the viewer until it is closed.
pub fn run(manifest: SceneManifest) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            eprintln!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)?;
    }

    log::info!(
        "assembling {} assets with {} clone rules",
        manifest.assets.len(),
        manifest.clone_rules.len()
    );

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, manifest)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run(SceneManifest::office()).map_err(|e| wasm_bindgen::JsValue::from_str(&e.to_string()))
}
