//! The viewer instance: scene ownership, render loop, and input plumbing.
//!
//! One tokio task owns all scene state. External inputs (photo bytes,
//! landmark sets, customization) arrive as messages on a single channel and
//! are applied run-to-completion between frame ticks, so a mutation can never
//! interleave with a draw. Image decode is the only suspending operation; it
//! runs off-task and its result re-enters the command queue tagged with the
//! generation captured at request time.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ViewerConfig;
use crate::customize::Customization;
use crate::error::{
    AvatarViewError, ExportError, InitError, Result, TextureLoadError, ViewerError,
};
use crate::export;
use crate::pose::{self, Landmark};
use crate::render::resources::SwapOutcome;
use crate::render::texture::{self, AvatarTexture};
use crate::render::{GpuContext, OrbitCamera, ResourceRegistry, SceneRenderer, TextureSlot};

/// Commands accepted by the viewer task.
enum ViewerCommand {
    ApplyImage(Vec<u8>),
    ApplyLandmarks(Option<Vec<Landmark>>),
    ApplyConfig(Customization),
    Orbit { yaw: f32, pitch: f32 },
    Zoom { factor: f32 },
    Resize { width: u32, height: u32 },
    Export(oneshot::Sender<Result<Vec<u8>>>),
    Teardown(oneshot::Sender<()>),
    // internal: a decode finished (possibly stale)
    TextureDecoded {
        generation: u64,
        result: std::result::Result<image::RgbaImage, TextureLoadError>,
    },
}

/// Handle for driving a spawned viewer from the outside.
#[derive(Clone)]
pub struct ViewerHandle {
    tx: mpsc::Sender<ViewerCommand>,
}

impl ViewerHandle {
    async fn send(&self, cmd: ViewerCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| ViewerError::TornDown.into())
    }

    /// Project a newly captured photo onto the avatar surface.
    pub async fn apply_image(&self, encoded: Vec<u8>) -> Result<()> {
        self.send(ViewerCommand::ApplyImage(encoded)).await
    }

    /// Update (or clear) the landmark set driving head orientation.
    pub async fn apply_landmarks(&self, landmarks: Option<Vec<Landmark>>) -> Result<()> {
        self.send(ViewerCommand::ApplyLandmarks(landmarks)).await
    }

    /// Apply a customization change.
    pub async fn apply_config(&self, config: Customization) -> Result<()> {
        self.send(ViewerCommand::ApplyConfig(config)).await
    }

    /// Orbit the camera by the given angle deltas (radians).
    pub async fn orbit(&self, yaw: f32, pitch: f32) -> Result<()> {
        self.send(ViewerCommand::Orbit { yaw, pitch }).await
    }

    /// Dolly the camera toward or away from the head by a distance factor.
    pub async fn zoom(&self, factor: f32) -> Result<()> {
        self.send(ViewerCommand::Zoom { factor }).await
    }

    /// Notify the viewer of a viewport size change.
    pub async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.send(ViewerCommand::Resize { width, height }).await
    }

    /// Export the most recently rendered frame as PNG bytes.
    pub async fn export_png(&self) -> Result<Vec<u8>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ViewerCommand::Export(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| AvatarViewError::from(ViewerError::TornDown))?
    }

    /// Stop the render loop and release every GPU resource.
    pub async fn teardown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ViewerCommand::Teardown(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| AvatarViewError::from(ViewerError::TornDown))
    }
}

/// One viewer instance: scene, camera, avatar, and resource bookkeeping.
///
/// Never a process-wide singleton; multiple instances can coexist, each with
/// its own GPU context and lifetime.
pub struct Viewer {
    ctx: GpuContext,
    registry: ResourceRegistry,
    renderer: SceneRenderer,
    camera: OrbitCamera,
    surface: TextureSlot<AvatarTexture>,
    frame_rate: f32,
}

impl Viewer {
    /// Create the scene for a mount surface of the given size.
    ///
    /// Fails with an initialization error when no GPU context can be created
    /// or the surface size is degenerate.
    pub async fn initialize(config: ViewerConfig, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(InitError::SurfaceSize { width, height }.into());
        }
        config.validate()?;

        let ctx = GpuContext::new().await?;
        let mut registry = ResourceRegistry::new();
        let renderer = SceneRenderer::new(&ctx.device, &ctx.queue, &mut registry, &config, width, height);
        let camera = OrbitCamera::from_config(&config.camera, width as f32 / height as f32);

        tracing::info!("viewer initialized at {}x{}", width, height);

        Ok(Self {
            ctx,
            registry,
            renderer,
            camera,
            surface: TextureSlot::new(),
            frame_rate: config.render.frame_rate,
        })
    }

    /// Advance interactive-control damping and draw one frame.
    pub fn render_once(&mut self) {
        let dt = 1.0 / self.frame_rate;
        self.camera.update(dt);
        self.renderer
            .render(&self.ctx.device, &self.ctx.queue, self.camera.view_projection());
    }

    /// Apply a customization change directly, without the spawned loop.
    pub fn apply_customization(&mut self, config: Customization) {
        self.renderer.set_material(config.material_params());
    }

    /// Apply a landmark set directly. A set missing any required index is
    /// silently "no pose update", never an error.
    pub fn apply_landmark_set(&mut self, landmarks: Option<&[Landmark]>) {
        if let Some(rotation) = pose::estimate(landmarks) {
            self.renderer.set_head_rotation(rotation);
        }
    }

    /// Decode and bind a photo synchronously. The spawned loop decodes
    /// off-task instead; this is for callers that drive frames themselves.
    pub fn apply_image_blocking(&mut self, encoded: &[u8]) -> Result<()> {
        let pixels = texture::decode_rgba(encoded)?;
        let generation = self.surface.begin_load();
        self.apply_decoded(generation, &pixels);
        Ok(())
    }

    /// Update output dimensions and camera projection for a new viewport
    /// size. Atomic from the render loop's perspective and idempotent.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer
            .resize(&self.ctx.device, &mut self.registry, width, height);
        let (w, h) = self.renderer.output_size();
        self.camera.set_aspect(w as f32 / h as f32);
    }

    /// Snapshot the current rendered frame as an encoded PNG.
    ///
    /// Fails with `ExportError::NotReady` before the first completed frame.
    pub fn export_frame(&mut self) -> Result<Vec<u8>> {
        if self.renderer.frames_rendered() == 0 {
            return Err(ExportError::NotReady.into());
        }
        let (pixels, width, height) =
            self.renderer
                .read_pixels(&self.ctx.device, &self.ctx.queue, &mut self.registry)?;
        Ok(export::encode_png(&pixels, width, height)?)
    }

    /// Current output dimensions.
    pub fn output_size(&self) -> (u32, u32) {
        self.renderer.output_size()
    }

    /// Current camera aspect ratio.
    pub fn aspect(&self) -> f32 {
        self.camera.aspect()
    }

    /// Number of frames drawn so far.
    pub fn frames_rendered(&self) -> u64 {
        self.renderer.frames_rendered()
    }

    /// Live tracked GPU objects (for leak verification).
    pub fn live_resources(&self) -> usize {
        self.registry.live_count()
    }

    /// Release every GPU resource. Returns the number of objects still
    /// tracked afterwards; anything non-zero is a leak.
    pub fn dispose(mut self) -> usize {
        if let Some(old) = self.surface.take() {
            old.destroy(&mut self.registry);
        }
        self.renderer.dispose(&mut self.registry);

        let leaked = self.registry.live_count();
        if leaked > 0 {
            tracing::error!("{leaked} GPU resources still tracked after teardown");
        }
        leaked
    }

    fn apply_decoded(&mut self, generation: u64, pixels: &image::RgbaImage) {
        // A newer request supersedes this one; never upload or bind a stale
        // decode.
        if !self.surface.is_current(generation) {
            tracing::debug!("discarding stale texture decode (generation {generation})");
            return;
        }

        let tex = texture::upload_rgba(&self.ctx.device, &self.ctx.queue, &mut self.registry, pixels);
        match self.surface.complete(generation, tex) {
            SwapOutcome::Applied { retired } => {
                if let Some(current) = self.surface.current() {
                    self.renderer.bind_surface_texture(&self.ctx.device, current);
                }
                // retire the previous texture only after the replacement is
                // bound
                if let Some(old) = retired {
                    old.destroy(&mut self.registry);
                }
            }
            SwapOutcome::Stale(rejected) => rejected.destroy(&mut self.registry),
        }
    }

    fn handle_command(
        &mut self,
        cmd: ViewerCommand,
        loopback: &mpsc::WeakSender<ViewerCommand>,
    ) -> LoopControl {
        match cmd {
            ViewerCommand::ApplyImage(bytes) => {
                let generation = self.surface.begin_load();
                let loopback = loopback.clone();
                tokio::spawn(async move {
                    let result = match tokio::task::spawn_blocking(move || texture::decode_rgba(&bytes)).await {
                        Ok(r) => r,
                        Err(e) => Err(TextureLoadError::Cancelled(e.to_string())),
                    };
                    // the viewer may already be gone; nothing to clean up then
                    if let Some(tx) = loopback.upgrade() {
                        let _ = tx.send(ViewerCommand::TextureDecoded { generation, result }).await;
                    }
                });
            }
            ViewerCommand::TextureDecoded { generation, result } => match result {
                Ok(pixels) => self.apply_decoded(generation, &pixels),
                Err(e) => {
                    // previous material state stays fully intact
                    self.surface.fail(generation);
                    tracing::warn!("texture load failed: {e}");
                }
            },
            ViewerCommand::ApplyLandmarks(landmarks) => {
                self.apply_landmark_set(landmarks.as_deref());
            }
            ViewerCommand::ApplyConfig(config) => {
                self.apply_customization(config);
            }
            ViewerCommand::Orbit { yaw, pitch } => {
                self.camera.orbit(yaw, pitch);
            }
            ViewerCommand::Zoom { factor } => {
                self.camera.zoom(factor);
            }
            ViewerCommand::Resize { width, height } => {
                self.resize(width, height);
            }
            ViewerCommand::Export(reply) => {
                let _ = reply.send(self.export_frame());
            }
            ViewerCommand::Teardown(reply) => {
                // reply only after dispose() has run, so an awaiting caller
                // never observes this instance's GPU memory still live
                return LoopControl::Stop(Some(reply));
            }
        }
        LoopControl::Continue
    }

    /// Spawn the render loop task; the returned handle drives it.
    ///
    /// The join result is `Ok` after a clean teardown and
    /// [`ViewerError::DeviceLost`] when the loop stopped because the device
    /// failed mid-frame.
    pub fn spawn(self) -> (ViewerHandle, JoinHandle<std::result::Result<(), ViewerError>>) {
        let (tx, rx) = mpsc::channel(64);
        // the loop holds only a weak loopback sender, so dropping every
        // handle tears the viewer down instead of leaking the task
        let loopback = tx.downgrade();
        let handle = ViewerHandle { tx };
        let join = tokio::spawn(self.run(loopback, rx));
        (handle, join)
    }

    async fn run(
        mut self,
        loopback: mpsc::WeakSender<ViewerCommand>,
        mut rx: mpsc::Receiver<ViewerCommand>,
    ) -> std::result::Result<(), ViewerError> {
        let period = std::time::Duration::from_secs_f32(1.0 / self.frame_rate);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut teardown_reply = None;
        let mut device_lost = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.render_once();
                    if self.ctx.is_poisoned() {
                        // a draw failure at this level means the device is
                        // gone; tearing down is the only safe response
                        tracing::error!("GPU device failure during frame; tearing down viewer");
                        device_lost =
                            Some(ViewerError::DeviceLost("uncaptured device error during frame".into()));
                        break;
                    }
                }
                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => match self.handle_command(cmd, &loopback) {
                            LoopControl::Continue => {}
                            LoopControl::Stop(reply) => {
                                teardown_reply = reply;
                                break;
                            }
                        },
                        // every handle dropped: implicit teardown
                        None => break,
                    }
                }
            }
        }

        rx.close();
        let leaked = self.dispose();
        if leaked == 0 {
            tracing::info!("viewer torn down cleanly");
        }

        if let Some(reply) = teardown_reply {
            let _ = reply.send(());
        }
        match device_lost {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Whether the viewer loop keeps running after a command, and the teardown
/// acknowledgement to send once disposal is done.
enum LoopControl {
    Continue,
    Stop(Option<oneshot::Sender<()>>),
}
