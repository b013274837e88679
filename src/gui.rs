use eframe::egui;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use rodio::OutputStream;

use crate::audio::{self, AudioData};
use crate::controller::{ControllerConfig, LoopController};
use crate::display::{ChannelSink, DisplayUpdate};
use crate::engine::TrackSource;
use crate::i18n;
use crate::input::InputEvent;
use crate::player::RodioEngine;
use crate::timefmt::{format_position, format_precise};

pub fn run(
    initial_file: Option<PathBuf>,
    config: ControllerConfig,
    volume: f32,
) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 420.0])
            .with_min_inner_size([520.0, 360.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Strumline",
        options,
        Box::new(move |cc| {
            configure_visuals(&cc.egui_ctx);
            Ok(Box::new(StrumlineApp::new(initial_file, config, volume, cc.egui_ctx.clone())))
        }),
    ).map_err(|e| anyhow::anyhow!("GUI Error: {}", e))
}

pub fn configure_visuals(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.window_corner_radius = egui::CornerRadius::same(8);
    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_gray(20);
    ctx.set_visuals(visuals);
}

#[derive(Clone)]
enum AppState {
    Idle,
    Loading,
    Ready,
    Error(String),
}

enum AppMessage {
    Decoded(Arc<AudioData>),
    Error(String),
}

#[derive(Default)]
struct Labels {
    position_ms: u64,
    position: String,
    start_ms: u64,
    start: String,
    end_ms: u64,
    end: String,
}

impl Labels {
    fn reset() -> Self {
        Self {
            position: format_position(0),
            start: format_precise(0),
            end: format_precise(0),
            ..Default::default()
        }
    }

    fn apply(&mut self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::Position { ms, label } => {
                self.position_ms = ms;
                self.position = label;
            }
            DisplayUpdate::Bounds { start_ms, end_ms, start_label, end_label } => {
                self.start_ms = start_ms;
                self.end_ms = end_ms;
                self.start = start_label;
                self.end = end_label;
            }
        }
    }
}

pub struct StrumlineApp {
    state: AppState,
    msg_receiver: Receiver<AppMessage>,
    msg_sender: Sender<AppMessage>,
    display_receiver: Receiver<DisplayUpdate>,
    ctx: egui::Context,

    // Must outlive the engine's sink.
    _stream: Option<OutputStream>,
    engine: Option<Arc<RodioEngine>>,
    controller: Option<LoopController>,
    pending: VecDeque<InputEvent>,

    file_name: Option<String>,
    track: Option<Arc<AudioData>>,
    labels: Labels,
    volume: f32,
    cover_texture: Option<egui::TextureHandle>,
    minimized: bool,
}

impl StrumlineApp {
    pub fn new(
        initial_file: Option<PathBuf>,
        config: ControllerConfig,
        volume: f32,
        ctx: egui::Context,
    ) -> Self {
        let (sender, receiver) = unbounded();
        let (display_sender, display_receiver) = unbounded();

        let mut app = Self {
            state: AppState::Idle,
            msg_receiver: receiver,
            msg_sender: sender,
            display_receiver,
            ctx: ctx.clone(),
            _stream: None,
            engine: None,
            controller: None,
            pending: VecDeque::new(),
            file_name: None,
            track: None,
            labels: Labels::reset(),
            volume,
            cover_texture: None,
            minimized: false,
        };

        match OutputStream::try_default() {
            Ok((stream, stream_handle)) => match RodioEngine::new(&stream_handle) {
                Ok(engine) => {
                    let engine = Arc::new(engine);
                    engine.set_volume(volume);
                    let repaint = ctx.clone();
                    let sink = Arc::new(ChannelSink::with_wake(display_sender, move || {
                        repaint.request_repaint()
                    }));
                    app.controller = Some(LoopController::new(engine.clone(), sink, config));
                    app.engine = Some(engine);
                    app._stream = Some(stream);
                }
                Err(e) => {
                    warn!("cannot create audio sink: {}", e);
                    app.state = AppState::Error(i18n::t("no_audio_device"));
                }
            },
            Err(e) => {
                warn!("cannot open audio output: {}", e);
                app.state = AppState::Error(i18n::t("no_audio_device"));
            }
        }

        if let Some(path) = initial_file {
            app.load_file(path);
        }

        app
    }

    fn load_file(&mut self, path: PathBuf) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        controller.unload();

        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        info!("opening {}", name);
        self.file_name = Some(name);
        self.track = None;
        self.cover_texture = None;
        self.labels = Labels::reset();
        self.state = AppState::Loading;

        let sender = self.msg_sender.clone();
        let ctx = self.ctx.clone();

        thread::spawn(move || {
            let msg = match audio::decode(&TrackSource::Path(path)) {
                Ok(data) => AppMessage::Decoded(data),
                Err(e) => AppMessage::Error(e.to_string()),
            };
            sender.send(msg).ok();
            ctx.request_repaint();
        });
    }

    fn pick_file(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Audio", &["mp3", "wav", "flac", "ogg", "m4a", "aac", "aiff"])
            .pick_file()
        {
            self.load_file(path);
        }
    }

    fn handle_message(&mut self, ctx: &egui::Context, msg: AppMessage) {
        match msg {
            AppMessage::Decoded(data) => {
                let Some(controller) = self.controller.as_mut() else {
                    return;
                };
                match controller.load(&TrackSource::Decoded(data.clone())) {
                    Ok(_) => {
                        if let Some(img) = &data.cover_art {
                            let size = [img.width() as usize, img.height() as usize];
                            let image_buffer = img.to_rgba8();
                            let pixels = image_buffer.as_flat_samples();
                            let color_image =
                                egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                            self.cover_texture =
                                Some(ctx.load_texture("cover", color_image, Default::default()));
                        }
                        self.track = Some(data);
                        self.state = AppState::Ready;
                    }
                    Err(e) => self.state = AppState::Error(e.to_string()),
                }
            }
            AppMessage::Error(e) => {
                self.state = AppState::Error(e);
            }
        }
    }

    fn track_lifecycle(&mut self, ctx: &egui::Context) {
        let minimized = ctx.input(|i| i.viewport().minimized).unwrap_or(false);
        if minimized != self.minimized {
            self.minimized = minimized;
            if let Some(controller) = self.controller.as_mut() {
                if minimized {
                    controller.suspend();
                } else {
                    controller.resume();
                }
            }
        }
    }

    fn render_player_ui(&mut self, ui: &mut egui::Ui) {
        let Some(data) = self.track.clone() else {
            return;
        };
        let playing = self.controller.as_ref().is_some_and(|c| c.is_playing());

        ui.horizontal(|ui| {
            if let Some(texture) = &self.cover_texture {
                ui.add(
                    egui::Image::from_texture(texture).fit_to_exact_size(egui::vec2(96.0, 96.0)),
                );
            }
            ui.vertical(|ui| {
                let title = data.title.clone()
                    .or_else(|| self.file_name.clone())
                    .unwrap_or_else(|| i18n::t("unknown_title"));
                ui.heading(title);
                ui.label(data.artist.clone().unwrap_or_else(|| i18n::t("unknown_artist")));
                ui.small(data.album.clone().unwrap_or_else(|| i18n::t("unknown_album")));
                ui.small(format!(
                    "{} Hz, {} ch, {}",
                    data.sample_rate,
                    data.channels,
                    format_precise(data.duration_ms())
                ));
            });
        });

        ui.add_space(8.0);

        let total = data.duration_ms();
        let mut start = self.labels.start_ms;
        let mut end = self.labels.end_ms;
        if range_bar(ui, &mut start, &mut end, total, self.labels.position_ms) {
            self.pending.push_back(InputEvent::RangeChanged { min: start, max: end });
        }

        ui.add_space(8.0);

        egui::Grid::new("loop_labels").num_columns(3).spacing([40.0, 4.0]).show(ui, |ui| {
            ui.label(i18n::t("position"));
            ui.label(i18n::t("loop_start"));
            ui.label(i18n::t("loop_end"));
            ui.end_row();
            ui.monospace(&self.labels.position);
            ui.monospace(&self.labels.start);
            ui.monospace(&self.labels.end);
            ui.end_row();
        });

        ui.add_space(8.0);

        ui.horizontal(|ui| {
            let toggle = if playing { i18n::t("pause") } else { i18n::t("play") };
            if ui.button(toggle).clicked() {
                self.pending.push_back(InputEvent::TogglePlayback);
            }
            if ui.button(i18n::t("mark_start")).clicked() {
                self.pending.push_back(InputEvent::MarkStart);
            }
            if ui.button(i18n::t("mark_end")).clicked() {
                self.pending.push_back(InputEvent::MarkEnd);
            }
            if ui.button(i18n::t("reset_loop")).clicked() {
                self.pending.push_back(InputEvent::RangeChanged { min: 0, max: total });
            }
        });

        ui.horizontal(|ui| {
            ui.label(i18n::t("volume"));
            if ui.add(egui::Slider::new(&mut self.volume, 0.0..=1.0).show_value(false)).changed() {
                if let Some(engine) = &self.engine {
                    engine.set_volume(self.volume);
                }
            }
        });
    }
}

/// Dual-handle range control. The handle nearest to the press is dragged
/// and can never cross the other one. Returns true when a handle moved.
fn range_bar(ui: &mut egui::Ui, start: &mut u64, end: &mut u64, total: u64, position: u64) -> bool {
    let desired = egui::vec2(ui.available_width(), 32.0);
    let (rect, response) = ui.allocate_exact_size(desired, egui::Sense::click_and_drag());
    let rect = rect.shrink2(egui::vec2(8.0, 0.0));
    let total_f = total.max(1) as f32;
    let to_x = |ms: u64| egui::lerp(rect.left()..=rect.right(), ms as f32 / total_f);
    let to_ms = |x: f32| (((x - rect.left()) / rect.width()).clamp(0.0, 1.0) * total_f) as u64;

    let grabbed_id = response.id.with("grabbed_start");
    let mut changed = false;
    if response.is_pointer_button_down_on() {
        if let Some(pointer) = response.interact_pointer_pos() {
            let grabbed = ui.memory(|m| m.data.get_temp::<bool>(grabbed_id));
            let grabbed_start = grabbed.unwrap_or_else(|| {
                let nearest =
                    (pointer.x - to_x(*start)).abs() <= (pointer.x - to_x(*end)).abs();
                ui.memory_mut(|m| m.data.insert_temp(grabbed_id, nearest));
                nearest
            });
            let ms = to_ms(pointer.x);
            if grabbed_start {
                let value = ms.min(*end);
                changed = value != *start;
                *start = value;
            } else {
                let value = ms.max(*start);
                changed = value != *end;
                *end = value;
            }
        }
    } else {
        ui.memory_mut(|m| m.data.remove::<bool>(grabbed_id));
    }

    let painter = ui.painter();
    let track = egui::Rect::from_center_size(rect.center(), egui::vec2(rect.width(), 6.0));
    painter.rect_filled(track, egui::CornerRadius::same(3), egui::Color32::from_gray(60));
    let selected = egui::Rect::from_x_y_ranges(to_x(*start)..=to_x(*end), track.y_range());
    let accent = egui::Color32::from_rgb(90, 150, 230);
    painter.rect_filled(selected, egui::CornerRadius::same(3), accent);

    let playhead = to_x(position.min(total));
    painter.line_segment(
        [egui::pos2(playhead, rect.top()), egui::pos2(playhead, rect.bottom())],
        egui::Stroke::new(2.0, egui::Color32::from_rgb(240, 200, 80)),
    );
    for ms in [*start, *end] {
        painter.circle_filled(egui::pos2(to_x(ms), rect.center().y), 8.0, egui::Color32::WHITE);
    }

    changed
}

impl eframe::App for StrumlineApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(msg) = self.msg_receiver.try_recv() {
            self.handle_message(ctx, msg);
        }
        while let Ok(update) = self.display_receiver.try_recv() {
            self.labels.apply(update);
        }
        self.track_lifecycle(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let spacing = 10.0;
            ui.spacing_mut().item_spacing = egui::vec2(spacing, spacing);

            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(i18n::t("app_title"))
                        .strong()
                        .color(egui::Color32::from_gray(100)),
                );

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    egui::ComboBox::from_id_salt("lang_select")
                        .selected_text(i18n::get_language().native_name())
                        .show_ui(ui, |ui| {
                            for lang in [i18n::Language::En, i18n::Language::Zh] {
                                let selected = i18n::get_language() == lang;
                                if ui.selectable_label(selected, lang.native_name()).clicked() {
                                    i18n::set_language(lang);
                                }
                            }
                        });

                    let open = egui::Button::new(i18n::t("open_file"));
                    if ui.add_enabled(self.controller.is_some(), open).clicked() {
                        self.pick_file();
                    }
                });
            });
            ui.separator();

            let current_state = self.state.clone();
            match current_state {
                AppState::Idle => {
                    ui.centered_and_justified(|ui| {
                        ui.label(
                            egui::RichText::new(i18n::t("drag_drop"))
                                .heading()
                                .color(egui::Color32::GRAY),
                        );
                    });
                }
                AppState::Loading => {
                    ui.centered_and_justified(|ui| {
                        ui.vertical_centered(|ui| {
                            ui.spinner();
                            ui.label(i18n::t("reading"));
                        });
                    });
                }
                AppState::Ready => {
                    self.render_player_ui(ui);
                }
                AppState::Error(e) => {
                    let message = format!("{}{}", i18n::t("load_fail"), e);
                    ui.centered_and_justified(|ui| {
                        ui.colored_label(egui::Color32::RED, message);
                    });
                }
            }

            let dropped = ctx.input(|i| i.raw.dropped_files.clone());
            if let Some(path) = dropped.first().and_then(|file| file.path.clone()) {
                self.load_file(path);
            }
        });

        if let Some(controller) = self.controller.as_mut() {
            controller.pump(&mut self.pending);
        }
    }
}
