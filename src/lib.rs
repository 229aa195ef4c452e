//! Patagon Measure: look around a room model and measure it by clicking.

pub mod calibration;
pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod i18n;
pub mod measurement;
pub mod model;
pub mod overlay;
pub mod picking;
mod renderer;
pub mod report;
pub mod storage;

pub use calibration::Calibration;
pub use config::ViewerConfig;
pub use engine::{Command, MeasureEngine, Mode, Outcome};
pub use error::{MeasureError, MeasureResult};
pub use measurement::{Measurement, MeasurementId, MeasurementKind, MeasurementPoint, SurfaceRef};
pub use report::Report;

use std::f32::consts::FRAC_PI_2;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use csgrs::mesh::Mesh;
use csgrs::traits::CSG;
use eframe::egui;
use nalgebra::{UnitQuaternion, Vector3};
use rfd::AsyncFileDialog;

use crate::camera::OrbitCamera;
use crate::i18n::{Lang, tr};
use crate::model::LoadedModel;
use crate::overlay::SceneOverlay;
use crate::picking::{ModelPicker, Picker};
use crate::report::ReportSummary;
use crate::storage::KeyValueStore;

const NOTICE_SECONDS: f64 = 4.0;
const GRID_COLOR: [f32; 3] = [0.3, 0.3, 0.3];
const MODEL_COLOR: [f32; 3] = [0.7, 0.7, 0.7];

type Engine = MeasureEngine<SceneOverlay, Box<dyn KeyValueStore>>;

struct Notice {
    text: String,
    error: bool,
    until: f64,
}

pub struct PatagonApp {
    camera: OrbitCamera,
    config: ViewerConfig,
    lang: Lang,
    engine: Engine,
    /// Normalized y-up geometry that is rendered and picked.
    model: Mesh<()>,
    picker: ModelPicker,
    model_data: Arc<Mutex<Option<Vec<u8>>>>,
    wireframe: bool,
    grid: bool,
    gpu: Option<Arc<renderer::GpuLines>>,
    vertex_storage: Vec<f32>,
    /// What the vertex buffer was last built from.
    synced: Option<SyncKey>,
    model_generation: u64,
    calibration_input: String,
    editing: Option<(MeasurementId, String)>,
    notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncKey {
    model: u64,
    overlay: u64,
    wireframe: bool,
    grid: bool,
}

impl PatagonApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let store = storage::open_platform_store();
        let config = ViewerConfig::load(&store);
        let engine = MeasureEngine::new(SceneOverlay::new(), store, &config);

        #[allow(clippy::cast_possible_truncation)]
        let extent = config.model_extent as f32;
        let mut app = Self {
            camera: OrbitCamera::new(extent),
            lang: config.lang(),
            config,
            engine,
            model: Mesh::new(),
            picker: ModelPicker::default(),
            model_data: Arc::new(Mutex::new(None)),
            wireframe: true,
            grid: true,
            gpu: None,
            vertex_storage: Vec::new(),
            synced: None,
            model_generation: 0,
            calibration_input: String::new(),
            editing: None,
            notice: None,
        };
        match model::normalize(model::demo_room(), app.config.model_extent) {
            Ok(loaded) => app.install_model(loaded, 0.0),
            Err(e) => log::error!("demo room: {e}"),
        }
        app
    }

    fn install_model(&mut self, loaded: LoadedModel, now: f64) {
        self.picker = ModelPicker::from_mesh(&loaded.mesh);
        self.model = loaded.mesh;
        self.model_generation += 1;
        log::info!(
            "model installed: {} polygons, {} triangles, scale {:.5}",
            self.model.polygons.len(),
            self.picker.triangle_count(),
            loaded.scale
        );
        if let Err(e) = self.engine.set_model_scale(loaded.scale) {
            self.fail(&e, now);
        }
    }

    fn notify(&mut self, key: &str, now: f64) {
        self.notice = Some(Notice {
            text: tr(self.lang, key).to_owned(),
            error: false,
            until: now + NOTICE_SECONDS,
        });
    }

    fn fail(&mut self, e: &MeasureError, now: f64) {
        log::warn!("{e}");
        self.notice = Some(Notice {
            text: format!("{}: {e}", tr(self.lang, e.notice_key())),
            error: true,
            until: now + NOTICE_SECONDS,
        });
    }

    fn run(&mut self, command: Command, now: f64) {
        match self.engine.apply(command) {
            Ok(outcome) => self.on_outcome(outcome, now),
            Err(e) => self.fail(&e, now),
        }
    }

    fn on_outcome(&mut self, outcome: Outcome, now: f64) {
        match outcome {
            Outcome::Finalized(_) => self.notify("notice.saved", now),
            Outcome::Calibrated(_) => {
                self.calibration_input.clear();
                self.notify("calibration.done", now);
            }
            Outcome::Deleted(_) => self.notify("notice.deleted", now),
            Outcome::Cleared => self.notify("notice.cleared", now),
            Outcome::Exported(report) => match report::download(&report) {
                Ok(()) => self.notify("notice.exported", now),
                Err(e) => {
                    log::error!("export failed: {e:#}");
                    self.notice = Some(Notice {
                        text: format!("{}: {e}", tr(self.lang, "error.storage")),
                        error: true,
                        until: now + NOTICE_SECONDS,
                    });
                }
            },
            Outcome::ModeChanged(_)
            | Outcome::PointAdded { .. }
            | Outcome::Renamed(_)
            | Outcome::Unchanged => {}
        }
    }

    fn save_config(&mut self, now: f64) {
        if let Err(e) = self.config.save(self.engine.store_mut()) {
            self.fail(&e, now);
        }
    }

    fn take_loaded_bytes(&self) -> Option<Vec<u8>> {
        self.model_data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Rebuild the line buffer when the model, overlay or toggles changed.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    unsafe fn sync_buffers(&mut self, gl: &glow::Context) {
        let key = SyncKey {
            model: self.model_generation,
            overlay: self.engine.overlay().revision(),
            wireframe: self.wireframe,
            grid: self.grid,
        };
        if self.synced == Some(key) {
            return;
        }
        self.vertex_storage.clear();

        let seg = |out: &mut Vec<f32>, a: [f32; 3], b: [f32; 3], c: [f32; 3]| {
            out.extend_from_slice(&[a[0], a[1], a[2], c[0], c[1], c[2]]);
            out.extend_from_slice(&[b[0], b[1], b[2], c[0], c[1], c[2]]);
        };

        // floor grid, one scene unit apart
        if self.grid {
            let half = (self.camera.extent * 0.5).ceil() + 1.0;
            let lines = (half * 2.0) as i32;
            for i in 0..=lines {
                let t = -half + i as f32;
                seg(&mut self.vertex_storage, [t, 0.0, -half], [t, 0.0, half], GRID_COLOR);
                seg(&mut self.vertex_storage, [-half, 0.0, t], [half, 0.0, t], GRID_COLOR);
            }
        }

        if self.wireframe {
            for p in &self.model.polygons {
                for (a, b) in p.edges() {
                    seg(
                        &mut self.vertex_storage,
                        [a.pos.x as f32, a.pos.y as f32, a.pos.z as f32],
                        [b.pos.x as f32, b.pos.y as f32, b.pos.z as f32],
                        MODEL_COLOR,
                    );
                }
            }
        }

        self.engine.overlay().push_line_vertices(&mut self.vertex_storage);

        // upload only while we hold the single strong ref
        if let Some(gpu_arc) = &mut self.gpu {
            if let Some(gpu) = Arc::get_mut(gpu_arc) {
                unsafe { gpu.upload_vertices(gl, &self.vertex_storage) };
                self.synced = Some(key);
            }
        }
    }

    fn side_panel(&mut self, ui: &mut egui::Ui, now: f64) {
        let lang = self.lang;
        ui.heading(tr(lang, "panel.heading"));

        ui.horizontal_wrapped(|ui| {
            for mode in Mode::TOOLS {
                let key = format!("mode.{}", mode.key());
                let active = self.engine.mode() == mode;
                if ui.selectable_label(active, tr(lang, &key)).clicked() {
                    self.run(Command::SelectMode(mode), now);
                }
            }
        });
        let hint = format!("hint.{}", self.engine.mode().key());
        ui.label(tr(lang, &hint));
        if self.engine.buffered() > 0 {
            ui.label(format!("{}: {}", tr(lang, "panel.points"), self.engine.buffered()));
        }

        ui.separator();
        ui.collapsing(tr(lang, "calibration.heading"), |ui| {
            ui.label(format!(
                "{}: {:.4}",
                tr(lang, "calibration.scale"),
                self.engine.calibration().feet_per_unit()
            ));
            ui.horizontal(|ui| {
                ui.label(tr(lang, "calibration.known"));
                ui.add(egui::TextEdit::singleline(&mut self.calibration_input).desired_width(60.0));
            });
            ui.horizontal(|ui| {
                if ui.button(tr(lang, "calibration.apply")).clicked() {
                    match self.calibration_input.trim().parse::<f64>() {
                        Ok(known_feet) => self.run(Command::Calibrate { known_feet }, now),
                        Err(_) => {
                            let e = MeasureError::invalid_input(format!(
                                "`{}` is not a number",
                                self.calibration_input.trim()
                            ));
                            self.fail(&e, now);
                        }
                    }
                }
                if ui.button(tr(lang, "calibration.reset")).clicked() {
                    self.run(Command::ResetCalibration, now);
                }
            });
        });

        ui.separator();
        ui.label(tr(lang, "list.heading"));
        let mut pending = Vec::new();
        let measurements = self.engine.measurements();
        if measurements.is_empty() {
            ui.weak(tr(lang, "list.empty"));
        }
        egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
            for m in measurements {
                ui.horizontal(|ui| {
                    if let Some((_, text)) = self.editing.as_mut().filter(|(id, _)| *id == m.id) {
                        ui.add(egui::TextEdit::singleline(text).desired_width(110.0));
                        if ui.small_button(tr(lang, "list.save")).clicked() {
                            pending.push(Command::Rename { id: m.id, label: text.trim().to_owned() });
                        }
                        return;
                    }
                    ui.label(format!("{}: {}", m.label, m.display_value));
                    if ui.small_button(tr(lang, "list.rename")).clicked() {
                        self.editing = Some((m.id, m.label.clone()));
                    }
                    if ui.small_button(tr(lang, "list.delete")).clicked() {
                        pending.push(Command::Delete(m.id));
                    }
                });
            }
        });
        let summary = ReportSummary::of(measurements);
        ui.label(format!(
            "{}: {}",
            tr(lang, "list.total_area"),
            geometry::format_square_feet(summary.total_area_sqft)
        ));
        ui.label(format!(
            "{}: {}",
            tr(lang, "list.total_linear"),
            geometry::format_feet_inches(summary.total_linear_ft)
        ));
        ui.horizontal(|ui| {
            if ui.button(tr(lang, "list.clear")).clicked() {
                pending.push(Command::ClearAll);
            }
            if ui.button(tr(lang, "list.export")).clicked() {
                pending.push(Command::Export { project: self.config.project_label.clone() });
            }
        });
        for command in pending {
            if matches!(command, Command::Rename { .. }) {
                self.editing = None;
            }
            self.run(command, now);
        }

        ui.separator();
        ui.label(tr(lang, "panel.view"));
        ui.horizontal_wrapped(|ui| {
            if ui.button(tr(lang, "view.front")).clicked() {
                self.camera.rotation = UnitQuaternion::identity();
            }
            if ui.button(tr(lang, "view.top")).clicked() {
                self.camera.rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
            }
            if ui.button(tr(lang, "view.side")).clicked() {
                self.camera.rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -FRAC_PI_2);
            }
            if ui.button(tr(lang, "view.reset")).clicked() {
                self.camera.rotation = OrbitCamera::default_rotation();
                self.camera.zoom = 1.0;
            }
        });
        ui.checkbox(&mut self.wireframe, tr(lang, "panel.wireframe"));
        ui.checkbox(&mut self.grid, tr(lang, "panel.grid"));
        ui.horizontal(|ui| {
            if ui.button(tr(lang, "panel.load_model")).clicked() {
                spawn_file_picker(Arc::clone(&self.model_data), "Room mesh (stl,dxf)", &["stl", "dxf"]);
            }
            if ui.button(tr(lang, "panel.demo_room")).clicked() {
                match model::normalize(model::demo_room(), self.config.model_extent) {
                    Ok(loaded) => self.install_model(loaded, now),
                    Err(e) => log::error!("demo room: {e}"),
                }
            }
        });

        ui.separator();
        let mut config_changed = false;
        egui::ComboBox::from_label(tr(lang, "panel.language"))
            .selected_text(self.lang.native_name())
            .show_ui(ui, |ui| {
                for candidate in Lang::ALL {
                    if ui
                        .selectable_value(&mut self.lang, candidate, candidate.native_name())
                        .changed()
                    {
                        config_changed = true;
                    }
                }
            });
        ui.horizontal(|ui| {
            ui.label(tr(lang, "panel.project"));
            if ui.text_edit_singleline(&mut self.config.project_label).lost_focus() {
                config_changed = true;
            }
        });
        if config_changed {
            self.config.language = self.lang.tag().to_owned();
            self.save_config(now);
        }
    }

    fn viewport(&mut self, ui: &mut egui::Ui, frame: &eframe::Frame, now: f64) {
        ui.set_min_size(ui.available_size());
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());

        if response.dragged() && ui.input(|i| i.pointer.primary_down()) {
            self.camera.orbit(response.drag_delta());
        }
        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if response.hovered() && scroll.abs() > 0.0 {
            self.camera.dolly(scroll);
        }

        if response.clicked() && self.engine.mode() != Mode::Idle {
            let hit = response
                .interact_pointer_pos()
                .and_then(|pos| self.camera.pointer_ray(rect, pos))
                .and_then(|ray| self.picker.cast_ray(&ray));
            match hit {
                Some(pick) => {
                    let point = MeasurementPoint::new(pick.position, SurfaceRef::ModelPolygon(pick.polygon));
                    self.run(Command::AddPoint(point), now);
                }
                None => log::debug!("click missed the model"),
            }
        }

        if let Some(gl) = frame.gl() {
            if self.gpu.is_none() {
                match unsafe { renderer::GpuLines::new(gl) } {
                    Ok(gpu) => self.gpu = Some(Arc::new(gpu)),
                    Err(e) => log::error!("line renderer unavailable: {e}"),
                }
            }

            unsafe { self.sync_buffers(gl) };

            if let Some(gpu_arc) = &self.gpu {
                let gpu_for_cb = Arc::clone(gpu_arc);
                let mvp = self.camera.mvp(rect);
                let callback = egui_glow::CallbackFn::new(move |_info, painter| unsafe {
                    gpu_for_cb.paint(painter.gl(), mvp);
                });
                ui.painter().add(egui::PaintCallback {
                    rect,
                    callback: Arc::new(callback),
                });
            }
        }

        let painter = ui.painter_at(rect);
        for (text, anchor) in self.engine.overlay().labels() {
            if let Some(pos) = self.camera.project(rect, &anchor) {
                painter.text(
                    pos,
                    egui::Align2::CENTER_BOTTOM,
                    text,
                    egui::FontId::proportional(14.0),
                    egui::Color32::WHITE,
                );
            }
        }

        if let Some(notice) = &self.notice {
            let color = if notice.error {
                egui::Color32::from_rgb(255, 110, 110)
            } else {
                egui::Color32::from_rgb(140, 230, 140)
            };
            painter.text(
                rect.center_top() + egui::vec2(0.0, 12.0),
                egui::Align2::CENTER_TOP,
                &notice.text,
                egui::FontId::proportional(16.0),
                color,
            );
        }
    }
}

impl eframe::App for PatagonApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time);

        if let Some(bytes) = self.take_loaded_bytes() {
            match model::load(&bytes, self.config.model_extent) {
                Ok(loaded) => {
                    log::info!("model file read ({} bytes)", bytes.len());
                    self.install_model(loaded, now);
                    self.notify("notice.model_loaded", now);
                }
                Err(e) => {
                    log::error!("could not load model: {e:#}");
                    self.notice = Some(Notice {
                        text: format!("{}: {e}", tr(self.lang, "error.model")),
                        error: true,
                        until: now + NOTICE_SECONDS,
                    });
                }
            }
        }

        if let Some(notice) = &self.notice {
            if now >= notice.until {
                self.notice = None;
            } else {
                ctx.request_repaint_after(Duration::from_secs_f64(notice.until - now));
            }
        }

        egui::SidePanel::left("side_panel")
            .resizable(false)
            .min_width(220.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.side_panel(ui, now));
            });

        egui::CentralPanel::default().show(ctx, |ui| self.viewport(ui, frame, now));
    }
}

fn spawn_file_picker(
    target: Arc<Mutex<Option<Vec<u8>>>>,
    filter_name: &'static str,
    exts: &'static [&'static str],
) {
    execute(async move {
        if let Some(handle) = AsyncFileDialog::new()
            .add_filter(filter_name, exts)
            .pick_file()
            .await
        {
            let bytes = handle.read().await;
            *target.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        }
    });
}

// ── Web entry-point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    eframe::WebLogger::init(log::LevelFilter::Debug).ok();
    console_error_panic_hook::set_once();

    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("patagon_canvas"))
        .ok_or_else(|| JsValue::from_str("missing <canvas id=\"patagon_canvas\">"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(|cc| Ok(Box::new(PatagonApp::new(cc)))),
        )
        .await
}

// ── Native entry-point ──
#[cfg(not(target_arch = "wasm32"))]
pub fn run_native() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(tr(Lang::En, "app.title"))
            .with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        tr(Lang::En, "app.title"),
        options,
        Box::new(|cc| Ok(Box::new(PatagonApp::new(cc)))),
    )
}

// Runs an async future without blocking the egui thread
#[cfg(not(target_arch = "wasm32"))]
fn execute<F: Future<Output = ()> + Send + 'static>(f: F) {
    std::thread::spawn(move || futures::executor::block_on(f));
}
#[cfg(target_arch = "wasm32")]
fn execute<F: Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}
