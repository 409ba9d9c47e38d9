use std::time::Duration;

use anyhow::{Context, Result};
use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, DesignApi};
use crate::config::StudioSettings;
use crate::fun_facts::FunFactFeed;
use crate::gallery::{Gallery, GalleryState, MutationState, SortMode};
use crate::generation::{IMAGE_GENERATION_MODELS, generate_all};
use crate::login_modal::LoginModal;
use crate::results::{ResultsView, SaveState};
use crate::session::{SessionProvider, SessionState, SessionUser};
use crate::wizard::{
    DEFAULT_BASE_COLOR, PICK_BASE_COLOR, SelectOutcome, Wizard, WizardPhase, WizardStep,
    format_hex_color, parse_hex_color,
};

pub mod events;

use self::events::{StudioCommand, StudioEvent, ViewRuns};

const APP_TITLE: &str = "Nail Studio";
const ACCENT: egui::Color32 = egui::Color32::from_rgb(95, 36, 97);
const ERROR_RED: egui::Color32 = egui::Color32::from_rgb(173, 33, 33);

pub fn run_studio(settings: &StudioSettings) -> Result<()> {
    let runtime_handle = Handle::try_current().context("studio requires a tokio runtime")?;

    let session = SessionProvider::from_token(settings.auth_token.as_deref());
    let api = ApiClient::from_settings(settings, session.handle())
        .context("failed to build API client")?;

    let (command_tx, command_rx) = unbounded_channel::<StudioCommand>();
    let (event_tx, event_rx) = unbounded_channel::<StudioEvent>();
    spawn_runtime_worker(&runtime_handle, api.clone(), command_rx, event_tx);

    info!(
        api_base_url = %settings.api_base_url,
        signed_in = session.state().user().is_some(),
        "starting native studio shell"
    );

    let app_settings = settings.clone();
    eframe::run_native(
        APP_TITLE,
        eframe::NativeOptions::default(),
        Box::new(move |_cc| {
            Ok(Box::new(StudioApp::new(
                app_settings,
                session,
                api,
                runtime_handle,
                command_tx,
                event_rx,
            )))
        }),
    )
    .map_err(|error| anyhow::anyhow!("studio UI exited with error: {error}"))
}

fn spawn_runtime_worker(
    handle: &Handle,
    api: ApiClient,
    mut command_rx: UnboundedReceiver<StudioCommand>,
    event_tx: UnboundedSender<StudioEvent>,
) {
    let _task = handle.spawn(async move {
        while let Some(command) = command_rx.recv().await {
            if matches!(command, StudioCommand::Shutdown) {
                break;
            }

            // Generation can take minutes; gallery actions must not queue behind it.
            let api = api.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                if let Some(event) = run_command(&api, command).await {
                    let _ = event_tx.send(event);
                }
            });
        }
    });
}

async fn run_command(api: &ApiClient, command: StudioCommand) -> Option<StudioEvent> {
    match command {
        StudioCommand::Generate { selections } => Some(StudioEvent::GenerationFinished {
            outcome: generate_all(api, &selections, &IMAGE_GENERATION_MODELS).await,
        }),
        StudioCommand::SaveDesign {
            run,
            index,
            request,
        } => Some(StudioEvent::DesignSaved {
            run,
            index,
            outcome: api.save_design(request).await,
        }),
        StudioCommand::LoadGallery { run } => Some(StudioEvent::GalleryLoaded {
            run,
            outcome: api.my_designs().await,
        }),
        StudioCommand::ToggleFavorite { run, ticket } => {
            let outcome = api.toggle_favorite(ticket.design_id()).await;
            Some(StudioEvent::MutationSettled {
                run,
                ticket,
                outcome,
            })
        }
        StudioCommand::DeleteDesign { run, ticket } => {
            let outcome = api.delete_design(ticket.design_id()).await;
            Some(StudioEvent::MutationSettled {
                run,
                ticket,
                outcome,
            })
        }
        StudioCommand::Shutdown => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Wizard,
    Generating,
    Results,
    Gallery,
}

enum GalleryAction {
    ToggleFavorite(String),
    Delete(String),
}

struct StudioApp {
    settings: StudioSettings,
    session: SessionProvider,
    login_modal: LoginModal,
    login_token_input: String,
    api: ApiClient,
    runtime_handle: Handle,
    command_tx: UnboundedSender<StudioCommand>,
    event_rx: UnboundedReceiver<StudioEvent>,
    screen: Screen,
    wizard: Wizard,
    color_rgb: [u8; 3],
    fun_facts: Option<FunFactFeed>,
    results: Option<ResultsView>,
    runs: ViewRuns,
    gallery: GalleryState,
    sort_mode: SortMode,
    alert: Option<String>,
    runtime_disconnected: bool,
}

impl StudioApp {
    fn new(
        settings: StudioSettings,
        session: SessionProvider,
        api: ApiClient,
        runtime_handle: Handle,
        command_tx: UnboundedSender<StudioCommand>,
        event_rx: UnboundedReceiver<StudioEvent>,
    ) -> Self {
        Self {
            settings,
            session,
            login_modal: LoginModal::new(),
            login_token_input: String::new(),
            api,
            runtime_handle,
            command_tx,
            event_rx,
            screen: Screen::Wizard,
            wizard: Wizard::new(),
            color_rgb: parse_hex_color(DEFAULT_BASE_COLOR).unwrap_or([179, 229, 252]),
            fun_facts: None,
            results: None,
            runs: ViewRuns::default(),
            gallery: GalleryState::Loading,
            sort_mode: SortMode::Recent,
            alert: None,
            runtime_disconnected: false,
        }
    }

    fn send(&mut self, command: StudioCommand) -> bool {
        if let Err(error) = self.command_tx.send(command) {
            warn!(error = %error, "studio runtime worker is gone");
            self.runtime_disconnected = true;
            self.alert = Some("Runtime worker disconnected. Restart the studio.".to_owned());
            return false;
        }
        true
    }

    fn drain_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    if !self.runs.is_current(&event) {
                        debug!(event = ?event, "discarding event for a replaced view");
                        continue;
                    }
                    if event.requires_login() {
                        self.login_modal.open();
                    }
                    self.apply_event(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.runtime_disconnected {
                        warn!("studio runtime worker disconnected");
                        self.alert =
                            Some("Runtime worker disconnected. Restart the studio.".to_owned());
                    }
                    self.runtime_disconnected = true;
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: StudioEvent) {
        match event {
            StudioEvent::GenerationFinished { outcome } => {
                self.fun_facts = None;
                let prompt = self.wizard.selections().describe();
                match self.wizard.finish_submission(outcome) {
                    Ok(result) => {
                        self.runs.next_results();
                        self.results = Some(ResultsView::new(result.clone(), prompt));
                        self.screen = Screen::Results;
                    }
                    Err(error) => {
                        self.screen = Screen::Wizard;
                        self.alert = Some(error.to_string());
                    }
                }
            }
            StudioEvent::DesignSaved { index, outcome, .. } => {
                let Some(results) = self.results.as_mut() else {
                    return;
                };
                if let Err(error) = results.finish_save(index, outcome) {
                    self.alert = Some(error.to_string());
                }
            }
            StudioEvent::GalleryLoaded { outcome, .. } => {
                self.gallery = GalleryState::from_outcome(outcome);
            }
            StudioEvent::MutationSettled {
                ticket, outcome, ..
            } => {
                let Some(gallery) = self.gallery.gallery_mut() else {
                    return;
                };
                if let Err(error) = gallery.settle(ticket, outcome) {
                    self.alert = Some(error.to_string());
                }
            }
        }
    }

    fn open_gallery(&mut self) {
        self.screen = Screen::Gallery;
        self.gallery = GalleryState::Loading;
        let run = self.runs.next_gallery();
        self.send(StudioCommand::LoadGallery { run });
    }

    fn start_new_design(&mut self) {
        self.wizard = Wizard::new();
        self.results = None;
        self.screen = Screen::Wizard;
    }

    fn select_option(&mut self, value: &str) {
        match self.wizard.select(value) {
            Ok(SelectOutcome::ReadyToSubmit(selections)) => {
                self.fun_facts = Some(FunFactFeed::spawn(
                    &self.runtime_handle,
                    self.api.clone(),
                    self.settings.fun_fact_interval(),
                ));
                self.screen = Screen::Generating;
                if !self.send(StudioCommand::Generate { selections }) {
                    let outcome = Err(crate::api::ApiError::Configuration(
                        "runtime worker disconnected".to_owned(),
                    ));
                    // `send` has already raised the disconnect alert.
                    if let Err(error) = self.wizard.finish_submission(outcome) {
                        warn!(error = %error, "generation request was never dispatched");
                    }
                    self.fun_facts = None;
                    self.screen = Screen::Wizard;
                }
            }
            Ok(SelectOutcome::ColorPickerOpened { draft }) => {
                if let Some(rgb) = parse_hex_color(&draft) {
                    self.color_rgb = rgb;
                }
            }
            Ok(SelectOutcome::Advanced { .. } | SelectOutcome::Ignored) => {}
            Err(error) => self.alert = Some(error.to_string()),
        }
    }

    fn apply_gallery_action(&mut self, action: GalleryAction) {
        let Some(gallery) = self.gallery.gallery_mut() else {
            return;
        };
        let run = self.runs.gallery;
        let command = match action {
            GalleryAction::ToggleFavorite(design_id) => gallery
                .begin_toggle_favorite(&design_id)
                .map(|ticket| StudioCommand::ToggleFavorite { run, ticket }),
            GalleryAction::Delete(design_id) => gallery
                .begin_delete(&design_id)
                .map(|ticket| StudioCommand::DeleteDesign { run, ticket }),
        };
        match command {
            Ok(command) => {
                self.send(command);
            }
            Err(error) => self.alert = Some(error.to_string()),
        }
    }

    fn render_nav(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new(APP_TITLE).color(ACCENT));
            ui.separator();
            let busy = self.wizard.is_submitting();
            if ui
                .add_enabled(!busy, egui::Button::new("New design"))
                .clicked()
            {
                self.start_new_design();
            }
            if ui
                .add_enabled(!busy, egui::Button::new("My designs"))
                .clicked()
            {
                self.open_gallery();
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                match self.session.state() {
                    SessionState::SignedIn(user) => {
                        if ui.button("Log out").clicked() {
                            self.session.sign_out();
                        }
                        ui.label(format!("Signed in as {}", user.uid));
                    }
                    SessionState::SignedOut | SessionState::Initializing => {
                        if ui.button("Log in").clicked() {
                            self.login_modal.open();
                        }
                    }
                }
            });
        });
    }

    fn render_wizard(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading("Create Your Masterpiece");
            let (current, total) = self.wizard.progress();
            ui.add(
                egui::ProgressBar::new(current as f32 / total as f32)
                    .text(format!("Step {current} of {total}")),
            );
            ui.add_space(12.0);
            ui.label("SELECT");
            ui.label(egui::RichText::new(self.wizard.current_step().title()).size(24.0));
        });
        ui.add_space(16.0);

        let step = self.wizard.current_step();
        let picking = matches!(self.wizard.phase(), WizardPhase::PickingColor { .. });
        let mut chosen = None;
        ui.horizontal_wrapped(|ui| {
            for option in step.options() {
                let selected = self.wizard.selections().get(step) == Some(*option);
                if ui
                    .add_enabled(!picking, egui::SelectableLabel::new(selected, *option))
                    .clicked()
                {
                    chosen = Some(*option);
                }
            }
        });

        if step == WizardStep::Color {
            if let Some(base_color) = self.wizard.selections().base_color() {
                ui.horizontal(|ui| {
                    ui.label(format!("Base color: {base_color}"));
                    if let Some([r, g, b]) = parse_hex_color(base_color) {
                        let (rect, _) =
                            ui.allocate_exact_size(egui::vec2(24.0, 24.0), egui::Sense::hover());
                        ui.painter()
                            .rect_filled(rect, 4.0, egui::Color32::from_rgb(r, g, b));
                    }
                });
            } else {
                ui.label(format!("Choose \"{PICK_BASE_COLOR}\" to bias the palette."));
            }
        }

        if let Some(option) = chosen {
            self.select_option(option);
        }
    }

    fn render_color_picker(&mut self, ctx: &egui::Context) {
        if !matches!(self.wizard.phase(), WizardPhase::PickingColor { .. }) {
            return;
        }

        let mut confirm = false;
        let mut cancel = false;
        egui::Window::new(PICK_BASE_COLOR)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                if egui::color_picker::color_edit_button_srgb(ui, &mut self.color_rgb).changed() {
                    let hex = format_hex_color(self.color_rgb);
                    if let Err(error) = self.wizard.set_color_draft(&hex) {
                        warn!(error = %error, "color picker produced an invalid draft");
                    }
                }
                ui.label(format_hex_color(self.color_rgb));
                ui.horizontal(|ui| {
                    confirm = ui.button("Select").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });

        if confirm {
            if let Err(error) = self.wizard.confirm_color() {
                self.alert = Some(error.to_string());
            }
        } else if cancel {
            self.wizard.cancel_color_picker();
        }
    }

    fn render_generating(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading("Generating your designs...");
            ui.label("Please wait, this can take a moment.");
            ui.add_space(12.0);
            ui.spinner();
            ui.add_space(24.0);
            if let Some(feed) = &self.fun_facts {
                ui.label(egui::RichText::new(feed.current().display_text()).size(20.0));
            }
        });
    }

    fn render_results(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(results) = self.results.as_mut() else {
            ui.label(crate::results::NO_IMAGES_MESSAGE);
            return;
        };

        ui.heading("Generated Designs");
        if let Some(message) = results.empty_message() {
            ui.label(message);
            return;
        }

        let mut save_index = None;
        let mut view_index = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (index, image) in results.images().iter().enumerate() {
                ui.group(|ui| {
                    ui.hyperlink_to(format!("Generated design {}", index + 1), &image.url);
                    ui.horizontal(|ui| {
                        if ui.button("View").clicked() {
                            view_index = Some(index);
                        }
                        let can_save = matches!(
                            image.save_state,
                            SaveState::Unsaved | SaveState::Failed { .. }
                        );
                        if ui
                            .add_enabled(can_save, egui::Button::new("Save"))
                            .clicked()
                        {
                            save_index = Some(index);
                        }
                        match &image.save_state {
                            SaveState::Unsaved => {}
                            SaveState::Saving => {
                                ui.spinner();
                            }
                            SaveState::Saved { .. } => {
                                ui.label("Saved");
                            }
                            SaveState::Failed { message } => {
                                ui.colored_label(ERROR_RED, message);
                            }
                        }
                    });
                });
            }
        });

        if let Some(index) = view_index {
            results.open_full_screen(index);
        }

        let mut close_viewer = false;
        if let Some(url) = results.full_screen_image() {
            egui::Window::new("Design")
                .collapsible(false)
                .show(ctx, |ui| {
                    ui.hyperlink(url);
                    close_viewer = ui.button("Close").clicked();
                });
        }
        if close_viewer {
            results.close_full_screen();
        }

        if let Some(index) = save_index {
            match results.begin_save(index) {
                Ok(request) => {
                    let run = self.runs.results;
                    self.send(StudioCommand::SaveDesign {
                        run,
                        index,
                        request,
                    });
                }
                Err(error) => self.alert = Some(error.to_string()),
            }
        }
    }

    fn render_gallery(&mut self, ui: &mut egui::Ui) {
        ui.heading("My Saved Designs");
        ui.horizontal(|ui| {
            ui.label("Sort by:");
            ui.selectable_value(&mut self.sort_mode, SortMode::Recent, "Recent");
            ui.selectable_value(&mut self.sort_mode, SortMode::Favorites, "Favorites");
        });
        ui.separator();

        let gallery = match &self.gallery {
            GalleryState::Loading => {
                ui.spinner();
                ui.label("Loading...");
                return;
            }
            GalleryState::Failed { message } => {
                ui.colored_label(ERROR_RED, format!("Error: {message}"));
                return;
            }
            GalleryState::Ready(gallery) => gallery,
        };

        let action = render_gallery_grid(ui, gallery, self.sort_mode);
        if let Some(action) = action {
            self.apply_gallery_action(action);
        }
    }

    fn render_login_modal(&mut self, ctx: &egui::Context) {
        if !self.login_modal.is_open() {
            return;
        }

        let mut submit = false;
        let mut dismiss = false;
        egui::Window::new("Log in")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Paste an ID token from your identity provider.");
                ui.add(
                    egui::TextEdit::singleline(&mut self.login_token_input)
                        .password(true)
                        .hint_text("ID token"),
                );
                ui.horizontal(|ui| {
                    submit = ui
                        .add_enabled(
                            !self.login_token_input.trim().is_empty(),
                            egui::Button::new("Sign in"),
                        )
                        .clicked();
                    dismiss = ui.button("Cancel").clicked();
                });
            });

        if submit {
            let token = self.login_token_input.trim().to_owned();
            self.session
                .sign_in(SessionUser::with_token("studio", token));
            self.login_token_input.clear();
            self.login_modal.close();
        } else if dismiss {
            self.login_modal.close();
        }
    }

    fn render_alert(&mut self, ctx: &egui::Context) {
        let Some(message) = self.alert.clone() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(message);
                dismissed = ui.button("OK").clicked();
            });
        if dismissed {
            self.alert = None;
        }
    }
}

fn render_gallery_grid(
    ui: &mut egui::Ui,
    gallery: &Gallery,
    sort_mode: SortMode,
) -> Option<GalleryAction> {
    if let Some(message) = gallery.empty_message() {
        ui.label(message);
        return None;
    }

    let mut action = None;
    egui::ScrollArea::vertical().show(ui, |ui| {
        for record in gallery.sorted(sort_mode) {
            let state = gallery
                .get(&record.id)
                .map(|item| item.state)
                .unwrap_or_default();
            ui.group(|ui| {
                ui.hyperlink_to(&record.prompt, &record.image_url);
                ui.label(record.created_at.format("%Y-%m-%d %H:%M").to_string());
                ui.horizontal(|ui| {
                    let pending = matches!(state, MutationState::Pending(_));
                    let favorite_label = if record.is_favorite { "♥" } else { "♡" };
                    if ui
                        .add_enabled(!pending, egui::Button::new(favorite_label))
                        .clicked()
                    {
                        action = Some(GalleryAction::ToggleFavorite(record.id.clone()));
                    }
                    if ui
                        .add_enabled(!pending, egui::Button::new("Delete"))
                        .clicked()
                    {
                        action = Some(GalleryAction::Delete(record.id.clone()));
                    }
                    match state {
                        MutationState::Pending(_) => {
                            ui.spinner();
                        }
                        MutationState::RolledBack => {
                            ui.colored_label(ERROR_RED, "Change reverted");
                        }
                        MutationState::Stable => {}
                    }
                });
            });
        }
    });
    action
}

impl Drop for StudioApp {
    fn drop(&mut self) {
        let _ = self.command_tx.send(StudioCommand::Shutdown);
    }
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::TopBottomPanel::top("studio_nav").show(ctx, |ui| self.render_nav(ui));

        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::Wizard => self.render_wizard(ui),
            Screen::Generating => self.render_generating(ui),
            Screen::Results => self.render_results(ctx, ui),
            Screen::Gallery => self.render_gallery(ui),
        });

        self.render_color_picker(ctx);
        self.render_login_modal(ctx);
        self.render_alert(ctx);

        ctx.request_repaint_after(Duration::from_millis(120));
    }
}
