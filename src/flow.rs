//! Application event loop.
//!
//! The viewer runs a single winit event loop. Loading the environment and the
//! model happens in background tasks that only fetch and decode; they report
//! back through [`FlowEvent`]s and every GPU upload happens on the event loop.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window (bound to the page's canvas on the web) and
//!    the GPU context, renderer and an empty scene
//! 2. the environment and model loaders are spawned
//! 3. each `RedrawRequested` advances the rotation tween, refreshes the model's
//!    transforms, renders through the effect chain and presents
//! 4. loader completions attach the environment or the model when they arrive

use std::{fmt::Debug, future::Future, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    controls::{RotationControl, to_quaternion},
    data_structures::scene_graph::{Model, Scene},
    pipelines::{lighting::LightingResources, pmrem::PmremGenerator},
    render::Renderer,
    resources::{
        asset::{LoadProgress, ModelAsset},
        environment::{HdrImage, load_hdri},
        load_model_gltf,
    },
};

/// Progress of one asset. Only the first completion counts, failures are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loaded,
    Failed,
}

impl LoadState {
    /// Records a completion. Returns false if the asset had already settled.
    pub fn complete(&mut self, success: bool) -> bool {
        if *self != LoadState::NotLoaded {
            return false;
        }
        *self = if success {
            LoadState::Loaded
        } else {
            LoadState::Failed
        };
        true
    }
}

pub struct AppState {
    pub(crate) ctx: Context,
    pub(crate) renderer: Renderer,
    pub(crate) scene: Scene,
    pub(crate) controls: RotationControl,
    environment_size: u32,
    environment: LoadState,
    model: LoadState,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        let lighting = LightingResources::new(&ctx.device, &ctx.queue, config);
        let renderer = Renderer::new(
            &ctx.device,
            ctx.config.format,
            ctx.sample_count,
            ctx.size(),
            config,
            &lighting.bind_group_layout,
        );
        Ok(Self {
            ctx,
            renderer,
            scene: Scene::new(lighting),
            controls: RotationControl::from_config(config),
            environment_size: config.environment_size,
            environment: LoadState::NotLoaded,
            model: LoadState::NotLoaded,
            is_surface_configured: false,
        })
    }

    /// Projection, surface and effect chain all follow the new size together.
    fn resize(&mut self, physical: PhysicalSize<u32>) {
        let size = self.ctx.drawing_size(physical);
        if !self.ctx.resize(size) {
            return;
        }
        self.is_surface_configured = true;
        self.renderer
            .resize(&self.ctx.device, &self.ctx.queue, size.width, size.height);
        log::debug!(
            "Resized to {}x{} ({}x{} drawing buffer)",
            physical.width,
            physical.height,
            size.width,
            size.height
        );
    }

    fn update(&mut self, dt: Duration) {
        let rotation = self.controls.update(dt).map(to_quaternion);
        self.scene.update(&self.ctx.queue, rotation);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.renderer
            .render(&self.ctx.device, &self.ctx.queue, &self.scene, &view);
        self.ctx.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn on_environment_loaded(&mut self, result: anyhow::Result<HdrImage>) {
        if !self.environment.complete(result.is_ok()) {
            return;
        }
        match result {
            Ok(image) => {
                let mut generator = PmremGenerator::new(&self.ctx.device);
                let map = generator.from_equirectangular(
                    &self.ctx.device,
                    &self.ctx.queue,
                    &image,
                    self.environment_size,
                );
                generator.dispose();
                self.scene
                    .set_environment(&self.ctx.device, &self.ctx.queue, map);
            }
            Err(e) => log::warn!("Environment unavailable, keeping the neutral one: {:#}", e),
        }
    }

    fn on_model_loaded(&mut self, result: anyhow::Result<ModelAsset>) {
        if !self.model.complete(result.is_ok()) {
            return;
        }
        match result {
            Ok(asset) => {
                let mut model = Model::upload(
                    &self.ctx.device,
                    &self.ctx.queue,
                    &self.renderer.material_layout,
                    &asset,
                );
                model.set_rotation(to_quaternion(self.controls.rotation()));
                self.scene.attach_model(model);
            }
            Err(e) => log::error!("Failed to load model: {:#}", e),
        }
    }
}

pub enum FlowEvent {
    /// The web has no blocking executor, so setup finishes in a task.
    #[cfg(target_arch = "wasm32")]
    Initialized {
        state: anyhow::Result<AppState>,
    },
    EnvironmentLoaded(anyhow::Result<HdrImage>),
    ModelProgress(LoadProgress),
    ModelLoaded(anyhow::Result<ModelAsset>),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized { state } => f
                .debug_struct("Initialized")
                .field("ok", &state.is_ok())
                .finish(),
            Self::EnvironmentLoaded(result) => f
                .debug_tuple("EnvironmentLoaded")
                .field(&result.as_ref().map(|image| (image.width, image.height)))
                .finish(),
            Self::ModelProgress(progress) => f.debug_tuple("ModelProgress").field(progress).finish(),
            Self::ModelLoaded(result) => f
                .debug_tuple("ModelLoaded")
                .field(&result.as_ref().map(|asset| &asset.name))
                .finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    config: ViewerConfig,
    state: Option<AppState>,
    last_time: Instant,
    last_logged_progress: Option<u32>,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            state: None,
            last_time: Instant::now(),
            last_logged_progress: None,
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn<F: Future<Output = ()> + Send + 'static>(&self, future: F) {
        self.async_runtime.spawn(future);
    }

    #[cfg(target_arch = "wasm32")]
    fn spawn<F: Future<Output = ()> + 'static>(&self, future: F) {
        wasm_bindgen_futures::spawn_local(future);
    }

    /// Starts both loads. They are independent and may finish in any order.
    fn spawn_loaders(&self) {
        let proxy = self.proxy.clone();
        let url = self.config.hdri_url.clone();
        self.spawn(async move {
            let result = load_hdri(&url).await;
            send(&proxy, FlowEvent::EnvironmentLoaded(result));
        });

        let proxy = self.proxy.clone();
        let path = self.config.model_path.clone();
        self.spawn(async move {
            let progress_proxy = proxy.clone();
            let result = load_model_gltf(&path, move |progress| {
                send(&progress_proxy, FlowEvent::ModelProgress(progress));
            })
            .await;
            send(&proxy, FlowEvent::ModelLoaded(result));
        });
    }

    fn on_initialized(&mut self, event_loop: &ActiveEventLoop, state: anyhow::Result<AppState>) {
        let mut state = match state {
            Ok(state) => state,
            Err(e) => {
                log::error!("App initialization failed: {:#}", e);
                event_loop.exit();
                return;
            }
        };
        // Important: Trigger a resize and redraw now that we are initialized
        let size = state.ctx.window.inner_size();
        state.resize(size);
        state.ctx.window.request_redraw();
        self.state = Some(state);
        self.last_time = Instant::now();
        self.spawn_loaders();
    }

    fn log_progress(&mut self, progress: LoadProgress) {
        match progress.percent() {
            Some(percent) => {
                let decile = (percent / 10.0) as u32;
                if self.last_logged_progress.is_none_or(|last| decile > last) {
                    self.last_logged_progress = Some(decile);
                    log::info!("Loading model: {:.0}%", percent);
                }
            }
            None => log::debug!("Loading model: {} bytes", progress.loaded),
        }
    }
}

fn send(proxy: &EventLoopProxy<FlowEvent>, event: FlowEvent) {
    if let Err(e) = proxy.send_event(event) {
        log::warn!("Event loop closed before {:?} could be delivered", e.0);
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("helmet-viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(&self.config.canvas_id));
            let Some(canvas) = canvas else {
                log::error!("No element with id {:?} to render into", self.config.canvas_id);
                event_loop.exit();
                return;
            };
            window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let config = self.config.clone();
        let init_future = async move { AppState::new(window, &config).await };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let state = self.async_runtime.block_on(init_future);
            self.on_initialized(event_loop, state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = init_future.await;
                send(&proxy, FlowEvent::Initialized { state });
            });
        }
    }

    #[cfg_attr(not(target_arch = "wasm32"), allow(unused_variables))]
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized { state } => {
                // This is the message from our wasm `spawn_local`
                self.on_initialized(event_loop, state);
            }
            FlowEvent::EnvironmentLoaded(result) => {
                if let Some(state) = &mut self.state {
                    state.on_environment_loaded(result);
                }
            }
            FlowEvent::ModelProgress(progress) => self.log_progress(progress),
            FlowEvent::ModelLoaded(result) => {
                if let Some(state) = &mut self.state {
                    state.on_model_loaded(result);
                }
            }
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

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = state.ctx.window.inner_size();
                state.resize(size);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let viewport = state.ctx.window.inner_size();
                let has_model = state.scene.has_model();
                state.controls.pointer_moved(has_model, position, viewport);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                state.update(dt);

                match state.render() {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Runs the viewer with the default configuration until the window closes.
pub fn run() -> anyhow::Result<()> {
    run_with(ViewerConfig::default())
}

pub fn run_with(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_settles_the_state() {
        let mut state = LoadState::NotLoaded;
        assert!(state.complete(true));
        assert_eq!(state, LoadState::Loaded);
        assert!(!state.complete(false));
        assert_eq!(state, LoadState::Loaded);
    }

    #[test]
    fn failure_is_permanent() {
        let mut state = LoadState::NotLoaded;
        assert!(state.complete(false));
        assert_eq!(state, LoadState::Failed);
        assert!(!state.complete(true));
        assert_eq!(state, LoadState::Failed);
    }
}
