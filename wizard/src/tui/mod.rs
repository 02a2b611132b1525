//! Terminal host for the onboarding wizard.
//!
//! Layout:
//! - Centered window titled "FitPlan" with the step title and a stepper row
//! - Form of the current step, one field per line, errors next to their field
//! - Status line and key help at the bottom
//! - Modal confirmations (leaving the form, losing premium choices)
//!
//! Keys emulate the web page: Enter is "Next", Esc the "Back" button, PgUp/PgDn the
//! browser's back/forward, F1-F8 the stepper dots and F9 the language switcher.
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to avoid corrupting the terminal UI.

use anyhow::Result;
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::{info, warn};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::errors::WizardError;
use crate::i18n::{contact_email_for, Translate, SUPPORTED};
use crate::models::catalog::SportsCatalog;
use crate::models::draft::{
    ActivityLevel, Diet, EnergyUnit, FormDraft, GoalTarget, Intensity, Macros, MealRepeats,
    NumberInput, PlanPeriod, PlanVariant, Sex, ShowGrams, SportBlock, SportLevel, StepsBucket,
};
use crate::wizard::controller::{Prompt, StepView, Submission, Transition};
use crate::wizard::handle::WizardHandle;
use crate::wizard::history::SessionHistory;
use crate::wizard::sport::{ordered_sport_ids, INTEREST_TAGS};
use crate::wizard::steps::Step;
use crate::wizard::validators::FieldErrors;

// =============================================================================
// View bridge
// =============================================================================

enum UiMsg {
    Mounted(Step),
    Errors(Step, FieldErrors),
    LoadError(Step, String),
    Confirm(Prompt, oneshot::Sender<bool>),
    Done(Result<Transition, WizardError>),
}

/// `StepView` that forwards everything to the render loop.
pub struct TerminalView {
    tx: mpsc::Sender<UiMsg>,
}

pub struct ViewReceiver(mpsc::Receiver<UiMsg>);

pub fn view_channel() -> (TerminalView, ViewReceiver) {
    let (tx, rx) = mpsc::channel();
    (TerminalView { tx }, ViewReceiver(rx))
}

#[async_trait]
impl StepView for TerminalView {
    async fn mount(&self, step: Step, _markup: &str) {
        let _ = self.tx.send(UiMsg::Mounted(step));
    }

    async fn show_errors(&self, step: Step, errors: &FieldErrors) {
        let _ = self.tx.send(UiMsg::Errors(step, errors.clone()));
    }

    async fn show_load_error(&self, step: Step, message: &str) {
        let _ = self.tx.send(UiMsg::LoadError(step, message.to_string()));
    }

    async fn confirm(&self, prompt: Prompt) -> bool {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(UiMsg::Confirm(prompt, reply)).is_err() {
            return false;
        }
        answer.await.unwrap_or(false)
    }
}

// =============================================================================
// Form model
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Sex,
    Age,
    Height,
    Weight,
    Activity,
    StepsBucket,
    Target,
    EnergyUnit,
    Bmr,
    Level,
    Interest(usize),
    FutureText,
    BlockSport(usize),
    BlockSessions(usize),
    BlockMinutes(usize),
    BlockIntensity(usize),
    MainSport,
    MacroC,
    MacroP,
    MacroF,
    Diet,
    Dislikes,
    Repeats,
    ShowGrams,
    Variant,
    Period,
    Discount,
    Name,
    Email,
    Newsletter,
    Terms,
    Privacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Choice,
    Toggle,
}

impl Field {
    fn kind(self) -> FieldKind {
        match self {
            Field::Age
            | Field::Height
            | Field::Weight
            | Field::Bmr
            | Field::FutureText
            | Field::BlockSessions(_)
            | Field::BlockMinutes(_)
            | Field::MacroC
            | Field::MacroP
            | Field::MacroF
            | Field::Dislikes
            | Field::Discount
            | Field::Name
            | Field::Email => FieldKind::Text,
            Field::Interest(_) | Field::Newsletter | Field::Terms | Field::Privacy => {
                FieldKind::Toggle
            }
            _ => FieldKind::Choice,
        }
    }

    /// Key the validators report errors under.
    fn error_key(self) -> String {
        match self {
            Field::Sex => "sex".into(),
            Field::Age => "age".into(),
            Field::Height => "height_cm".into(),
            Field::Weight => "weight_kg".into(),
            Field::Activity => "activity".into(),
            Field::StepsBucket => "steps_bucket".into(),
            Field::Target => "target".into(),
            Field::EnergyUnit => "energy_unit".into(),
            Field::Bmr => "bmr".into(),
            Field::Level => "sport_level".into(),
            Field::Interest(_) | Field::FutureText => "future".into(),
            Field::BlockSport(i) => format!("picked_own_{}", i),
            Field::BlockSessions(i) => format!("sessions_per_week_{}", i),
            Field::BlockMinutes(i) => format!("minutes_{}", i),
            Field::BlockIntensity(i) => format!("intensity_{}", i),
            Field::MainSport => "mainSportId".into(),
            Field::MacroC => "macro_c".into(),
            Field::MacroP => "macro_p".into(),
            Field::MacroF => "macro_f".into(),
            Field::Diet => "diet".into(),
            Field::Dislikes => "dislikes".into(),
            Field::Repeats => "repeats".into(),
            Field::ShowGrams => "show_grams".into(),
            Field::Variant => "variant".into(),
            Field::Period => "period".into(),
            Field::Discount => "discount_code".into(),
            Field::Name => "customer_name".into(),
            Field::Email => "customer_email".into(),
            Field::Newsletter => "newsletter".into(),
            Field::Terms => "consent_terms".into(),
            Field::Privacy => "consent_privacy".into(),
        }
    }

    fn block_index(self) -> Option<usize> {
        match self {
            Field::BlockSport(i)
            | Field::BlockSessions(i)
            | Field::BlockMinutes(i)
            | Field::BlockIntensity(i) => Some(i),
            _ => None,
        }
    }
}

fn fields_for(step: Step, draft: &FormDraft) -> Vec<Field> {
    match step {
        Step::Profile => vec![
            Field::Sex,
            Field::Age,
            Field::Height,
            Field::Weight,
            Field::Activity,
            Field::StepsBucket,
        ],
        Step::Goal => vec![Field::Target, Field::EnergyUnit, Field::Bmr],
        Step::Sport => {
            let mut fields = vec![Field::Level];
            match draft.sport.level {
                Some(SportLevel::NoSport) => {
                    fields.extend((0..INTEREST_TAGS.len()).map(Field::Interest));
                    if draft.sport.future_multi.iter().any(|t| t == "other") {
                        fields.push(Field::FutureText);
                    }
                }
                Some(SportLevel::Sport) => {
                    for i in 0..draft.sport.own_blocks.len() {
                        fields.extend([
                            Field::BlockSport(i),
                            Field::BlockSessions(i),
                            Field::BlockMinutes(i),
                            Field::BlockIntensity(i),
                        ]);
                    }
                    fields.push(Field::MainSport);
                }
                None => {}
            }
            fields
        }
        Step::Balance => vec![Field::MacroC, Field::MacroP, Field::MacroF],
        Step::Diet => vec![Field::Diet, Field::Dislikes],
        Step::MenuSettings => vec![Field::Repeats, Field::ShowGrams],
        Step::Plan => vec![Field::Variant, Field::Period, Field::Discount],
        Step::Review => vec![
            Field::Name,
            Field::Email,
            Field::Newsletter,
            Field::Terms,
            Field::Privacy,
        ],
    }
}

fn text(t: &dyn Translate, key: &str, default: &str) -> String {
    t.lookup(key).unwrap_or_else(|| default.to_string())
}

fn field_label(field: Field, t: &dyn Translate) -> String {
    match field {
        Field::Sex => text(t, "step1.sex", "Sex"),
        Field::Age => text(t, "step1.age", "Age"),
        Field::Height => text(t, "step1.height", "Height (cm)"),
        Field::Weight => text(t, "step1.weight", "Weight (kg)"),
        Field::Activity => text(t, "step1.activity", "Daily activity"),
        Field::StepsBucket => text(t, "step1.steps", "Steps per day"),
        Field::Target => text(t, "step2.target", "Goal"),
        Field::EnergyUnit => text(t, "step2.unit", "Energy unit"),
        Field::Bmr => text(t, "step2.bmr", "Basal metabolic rate"),
        Field::Level => text(t, "step3.level", "Do you train?"),
        Field::Interest(i) => INTEREST_TAGS
            .get(i)
            .map(|tag| text(t, &format!("step3.tag_{}", tag), tag))
            .unwrap_or_default(),
        Field::FutureText => text(t, "step3.future_other", "Other sport"),
        Field::BlockSport(i) => format!("#{} {}", i + 1, text(t, "step3.sport", "Sport")),
        Field::BlockSessions(i) => {
            format!("#{} {}", i + 1, text(t, "step3.sessions", "Trainings per week"))
        }
        Field::BlockMinutes(i) => format!("#{} {}", i + 1, text(t, "step3.minutes", "Minutes")),
        Field::BlockIntensity(i) => {
            format!("#{} {}", i + 1, text(t, "step3.intensity", "Intensity"))
        }
        Field::MainSport => text(t, "step3.main_sport", "Main sport"),
        Field::MacroC => text(t, "step4.carbs", "Carbohydrates %"),
        Field::MacroP => text(t, "step4.protein", "Protein %"),
        Field::MacroF => text(t, "step4.fat", "Fat %"),
        Field::Diet => text(t, "step5.diet", "Diet"),
        Field::Dislikes => text(t, "step5.dislikes", "Dislikes (comma separated)"),
        Field::Repeats => text(t, "step6.repeats", "Meal repeats"),
        Field::ShowGrams => text(t, "step6.show_grams", "Show grams"),
        Field::Variant => text(t, "step7.variant", "Plan"),
        Field::Period => text(t, "step7.period", "Period"),
        Field::Discount => text(t, "step7.discount", "Discount code"),
        Field::Name => text(t, "step8.name", "Name"),
        Field::Email => text(t, "step8.email", "E-mail"),
        Field::Newsletter => text(t, "step8.newsletter", "Newsletter"),
        Field::Terms => text(t, "step8.terms", "I accept the terms"),
        Field::Privacy => text(t, "step8.privacy", "I accept the privacy policy"),
    }
}

fn number_text(input: Option<&NumberInput>) -> String {
    match input {
        Some(NumberInput::Number(n)) => format_number(*n),
        Some(NumberInput::Text(s)) => s.clone(),
        None => String::new(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn enum_text<T: serde::Serialize>(value: Option<T>) -> String {
    value
        .and_then(|v| serde_json::to_value(v).ok())
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "-".to_string())
}

fn block(draft: &FormDraft, i: usize) -> Option<&SportBlock> {
    draft.sport.own_blocks.get(i)
}

fn field_value(field: Field, draft: &FormDraft, catalog: &SportsCatalog, lang: &str) -> String {
    let p = &draft.profile;
    match field {
        Field::Sex => enum_text(p.sex),
        Field::Age => number_text(p.age.as_ref()),
        Field::Height => number_text(p.height_cm.as_ref()),
        Field::Weight => number_text(p.weight_kg.as_ref()),
        Field::Activity => enum_text(p.activity),
        Field::StepsBucket => enum_text(p.steps_bucket),
        Field::Target => enum_text(draft.goal.target),
        Field::EnergyUnit => draft.goal.energy_unit.label().to_string(),
        Field::Bmr => draft
            .goal
            .display_bmr()
            .map(format_number)
            .unwrap_or_default(),
        Field::Level => enum_text(draft.sport.level),
        Field::Interest(i) => {
            let picked = INTEREST_TAGS
                .get(i)
                .is_some_and(|tag| draft.sport.future_multi.iter().any(|t| t == tag));
            if picked { "[x]" } else { "[ ]" }.to_string()
        }
        Field::FutureText => draft.sport.future_text.clone(),
        Field::BlockSport(i) => block(draft, i)
            .map(|b| {
                if b.sport_id.is_empty() {
                    "-".to_string()
                } else {
                    catalog.label(&b.sport_id, lang)
                }
            })
            .unwrap_or_default(),
        Field::BlockSessions(i) => {
            number_text(block(draft, i).and_then(|b| b.sessions_per_week.as_ref()))
        }
        Field::BlockMinutes(i) => number_text(block(draft, i).and_then(|b| b.minutes.as_ref())),
        Field::BlockIntensity(i) => enum_text(block(draft, i).and_then(|b| b.intensity)),
        Field::MainSport => draft
            .sport
            .main_sport_id()
            .map(|id| catalog.label(id, lang))
            .unwrap_or_else(|| "-".to_string()),
        Field::MacroC => number_text(Some(&draft.nutrition.macros.c)),
        Field::MacroP => number_text(Some(&draft.nutrition.macros.p)),
        Field::MacroF => number_text(Some(&draft.nutrition.macros.f)),
        Field::Diet => enum_text(draft.nutrition.diet),
        Field::Dislikes => draft.nutrition.dislikes.join(", "),
        Field::Repeats => enum_text(draft.nutrition.repeats),
        Field::ShowGrams => enum_text(draft.nutrition.show_grams),
        Field::Variant => enum_text(draft.plan.variant),
        Field::Period => enum_text(draft.plan.period),
        Field::Discount => draft.plan.discount_code.clone().unwrap_or_default(),
        Field::Name => draft.customer.name.clone(),
        Field::Email => draft.customer.email.clone(),
        Field::Newsletter => checkbox(draft.customer.newsletter),
        Field::Terms => checkbox(draft.consents.terms),
        Field::Privacy => checkbox(draft.consents.privacy),
    }
}

fn checkbox(on: bool) -> String {
    if on { "[x]" } else { "[ ]" }.to_string()
}

fn cycle<T: Copy + PartialEq>(options: &[T], current: Option<T>, delta: i32) -> Option<T> {
    if options.is_empty() {
        return None;
    }
    let len = options.len() as i32;
    let next = match current.and_then(|c| options.iter().position(|o| *o == c)) {
        Some(pos) => (pos as i32 + delta).rem_euclid(len),
        None if delta >= 0 => 0,
        None => len - 1,
    };
    options.get(next as usize).copied()
}

fn cycle_id(options: &[String], current: &str, delta: i32) -> Option<String> {
    let refs: Vec<&str> = options.iter().map(String::as_str).collect();
    let current = refs.iter().position(|o| *o == current).map(|p| refs[p]);
    cycle(&refs, current, delta).map(str::to_string)
}

fn parse_dislikes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Text input
// =============================================================================

/// Single-line editor; `cursor` counts characters.
struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    fn new(value: impl Into<String>) -> Self {
        let v = value.into();
        Self {
            cursor: v.chars().count(),
            value: v,
        }
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    /// Returns true when the value changed.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_at(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return false;
                }
                self.cursor -= 1;
                let at = self.byte_at(self.cursor);
                self.value.remove(at);
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                false
            }
            KeyCode::Home => {
                self.cursor = 0;
                false
            }
            KeyCode::End => {
                self.cursor = self.len();
                false
            }
            _ => false,
        }
    }
}

// =============================================================================
// UI state
// =============================================================================

struct Modal {
    prompt: Prompt,
    reply: Option<oneshot::Sender<bool>>,
    accept_focused: bool,
}

struct UiState {
    step: Step,
    furthest: Step,
    finalized: bool,
    draft: FormDraft,
    catalog: SportsCatalog,
    errors: FieldErrors,
    load_error: Option<String>,
    focus: usize,
    input: Option<(Field, TextInput)>,
    modal: Option<Modal>,
    busy: bool,
    status: String,
    quit: bool,
    lang: String,
    translator: Arc<dyn Translate>,
}

impl UiState {
    fn new(translator: Arc<dyn Translate>) -> Self {
        Self {
            step: Step::FIRST,
            furthest: Step::FIRST,
            finalized: false,
            draft: FormDraft::default(),
            catalog: SportsCatalog::default(),
            errors: FieldErrors::new(),
            load_error: None,
            focus: 0,
            input: None,
            modal: None,
            busy: false,
            status: String::new(),
            quit: false,
            lang: translator.lang().to_string(),
            translator,
        }
    }

    fn fields(&self) -> Vec<Field> {
        fields_for(self.step, &self.draft)
    }

    fn focused_field(&self) -> Option<Field> {
        self.fields().get(self.focus).copied()
    }

    /// Keep the focus in range and (re)open the editor of a focused text field.
    fn sync_input(&mut self) {
        let count = self.fields().len();
        if count == 0 {
            self.focus = 0;
        } else if self.focus >= count {
            self.focus = count - 1;
        }
        let focused = self.focused_field();
        let same = matches!((&self.input, focused), (Some((f, _)), Some(g)) if *f == g);
        if same {
            return;
        }
        self.input = focused
            .filter(|f| f.kind() == FieldKind::Text)
            .map(|f| (f, TextInput::new(field_value(f, &self.draft, &self.catalog, &self.lang))));
    }
}

fn refresh(state: &mut UiState, handle: &WizardHandle<SessionHistory>) {
    let Ok((ws, draft)) = handle.snapshot() else {
        return;
    };
    if ws.current() != state.step {
        state.focus = 0;
        state.input = None;
    }
    state.step = ws.current();
    state.furthest = ws.furthest();
    state.finalized = ws.is_finalized();
    state.draft = draft;
    let shared = handle.with_controller(|c| (c.catalog(), c.shared_translator()));
    if let Ok((catalog, translator)) = shared {
        state.catalog = catalog;
        state.lang = translator.lang().to_string();
        state.translator = translator;
    }
    state.sync_input();
}

// =============================================================================
// Entry points
// =============================================================================

pub fn run(
    handle: WizardHandle<SessionHistory>,
    receiver: ViewReceiver,
    runtime: tokio::runtime::Handle,
    translator: Arc<dyn Translate>,
) -> Result<()> {
    info!("[PHASE: tui] [STEP: start] Starting TUI wizard");

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, handle, receiver, runtime, translator);
    restore_terminal(&mut terminal)?;

    result
}

/// Render a single frame of `target` (step name or number) to an in-memory backend.
pub fn smoke(target: &str, translator: Arc<dyn Translate>) -> Result<String> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let state = new_smoke_state(target.trim(), translator);

    // Use an in-memory backend so this can be executed in CI/tooling without
    // manipulating the real terminal (no raw mode / alternate screen).
    let backend = TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &state))?;

    let buffer = terminal.backend().buffer();
    let mut screen = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            screen.push_str(buffer.get(x, y).symbol());
        }
        screen.push('\n');
    }
    Ok(screen)
}

fn parse_step(target: &str) -> Step {
    if let Ok(n) = target.parse::<i64>() {
        return Step::clamped(n - 1);
    }
    let wanted = target.to_ascii_lowercase().replace('-', "_");
    Step::ALL
        .into_iter()
        .find(|s| enum_text(Some(*s)) == wanted)
        .unwrap_or(Step::FIRST)
}

fn new_smoke_state(target: &str, translator: Arc<dyn Translate>) -> UiState {
    let mut state = UiState::new(translator);
    let step = parse_step(target);

    // Sample answers so every step has something to show.
    let d = &mut state.draft;
    d.profile.sex = Some(Sex::Female);
    d.profile.age = Some(NumberInput::from(34_i64));
    d.profile.height_cm = Some(NumberInput::from(168_i64));
    d.profile.weight_kg = Some(NumberInput::from(64_i64));
    d.profile.activity = Some(ActivityLevel::Light);
    d.profile.steps_bucket = Some(StepsBucket::From5kTo10k);
    d.goal.target = Some(GoalTarget::Maintain);
    let profile = d.profile.clone();
    d.goal.refresh_computed_bmr(&profile);
    d.sport.set_level(SportLevel::Sport);
    d.sport.set_block_sport(0, "running");
    d.nutrition.diet = Some(Diet::NoRestrictions);
    d.nutrition.repeats = Some(MealRepeats::Two);
    d.nutrition.show_grams = Some(ShowGrams::Yes);
    d.plan.variant = Some(PlanVariant::Standard);
    d.plan.period = Some(PlanPeriod::Week);
    d.plan.refresh_price(&state.lang);
    d.customer.name = "Jana Nováková".into();
    d.customer.email = "jana@example.cz".into();

    state.step = step;
    state.furthest = step;
    state.status = format!("Smoke render of step {}", step.number());
    state.sync_input();
    state
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    handle: WizardHandle<SessionHistory>,
    receiver: ViewReceiver,
    runtime: tokio::runtime::Handle,
    translator: Arc<dyn Translate>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut state = UiState::new(translator);
    // Transition results travel apart from the view's own messages.
    let (done_tx, done_rx) = mpsc::channel::<UiMsg>();
    refresh(&mut state, &handle);

    while !state.quit {
        drain_messages(&mut state, &receiver.0, &handle);
        drain_messages(&mut state, &done_rx, &handle);
        terminal.draw(|f| draw(f.size(), f, &state))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                handle_key(&mut state, key, &handle, &runtime, &done_tx);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    Ok(())
}

fn drain_messages(
    state: &mut UiState,
    rx: &mpsc::Receiver<UiMsg>,
    handle: &WizardHandle<SessionHistory>,
) {
    while let Ok(msg) = rx.try_recv() {
        match msg {
            UiMsg::Mounted(step) => {
                show_step(state, step);
                state.load_error = None;
                state.errors = FieldErrors::new();
                state.status = format!("Step {} of {}", step.number(), Step::ALL.len());
            }
            UiMsg::Errors(step, errors) => show_errors(state, step, errors),
            UiMsg::LoadError(step, message) => {
                show_step(state, step);
                state.load_error = Some(format!("Step {} loading error: {}", step.number(), message));
            }
            UiMsg::Confirm(prompt, reply) => {
                state.modal = Some(Modal {
                    prompt,
                    reply: Some(reply),
                    accept_focused: false,
                });
            }
            UiMsg::Done(result) => {
                state.busy = false;
                apply_transition(state, result);
                refresh(state, handle);
            }
        }
    }
}

/// The controller entered `step`. A multi-step replay reports several steps before the
/// transition finishes, so the screen follows each one.
fn show_step(state: &mut UiState, step: Step) {
    if step != state.step {
        state.focus = 0;
        state.input = None;
    }
    state.step = step;
}

/// Errors belong to the step they were reported for; late ones for another step are dropped.
fn show_errors(state: &mut UiState, step: Step, errors: FieldErrors) {
    if step == state.step {
        state.errors = errors;
    } else {
        warn!(
            "[PHASE: tui] [STEP: errors] Dropping {} error(s) of step {} while on step {}",
            errors.len(),
            step.number(),
            state.step.number()
        );
    }
}

fn apply_transition(state: &mut UiState, result: Result<Transition, WizardError>) {
    match result {
        Ok(Transition::Submitted(Submission::Accepted { order_id, redirect })) => {
            state.status = format!("Order {} created. Continue at {}", order_id, redirect);
        }
        Ok(Transition::Submitted(Submission::Failed { reason, redirect })) => {
            state.status = format!(
                "Order failed ({}). Your answers are saved; resume at {}. Contact: {}",
                reason,
                redirect,
                contact_email_for(&state.lang)
            );
        }
        Ok(Transition::Left) => state.quit = true,
        Ok(Transition::Blocked { errors, .. }) => {
            state.status = format!("Please fix {} field(s)", errors.len());
        }
        Ok(Transition::Declined { .. }) | Ok(Transition::Stayed) | Ok(Transition::Moved { .. }) => {}
        Err(WizardError::Busy) => state.status = "Please wait...".to_string(),
        Err(e) => state.status = e.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Nav {
    Next,
    Back,
    HistoryBack,
    HistoryForward,
    Stepper(Step),
    Language(&'static str),
}

fn spawn_nav(
    state: &mut UiState,
    nav: Nav,
    handle: &WizardHandle<SessionHistory>,
    runtime: &tokio::runtime::Handle,
    done: &mpsc::Sender<UiMsg>,
) {
    state.busy = true;
    let handle = handle.clone();
    let done = done.clone();
    runtime.spawn(async move {
        let result = match nav {
            Nav::Next => handle.next().await,
            Nav::Back => handle.back_button().await,
            Nav::HistoryBack => handle.navigate_back().await,
            Nav::HistoryForward => handle.navigate_forward().await,
            Nav::Stepper(step) => handle.stepper_click(step).await,
            Nav::Language(lang) => handle.switch_language(lang).await.map(|_| Transition::Stayed),
        };
        let _ = done.send(UiMsg::Done(result));
    });
}

fn handle_key(
    state: &mut UiState,
    key: KeyEvent,
    handle: &WizardHandle<SessionHistory>,
    runtime: &tokio::runtime::Handle,
    done: &mpsc::Sender<UiMsg>,
) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        state.quit = true;
        return;
    }

    if let Some(modal) = state.modal.as_mut() {
        let answer = match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                modal.accept_focused = !modal.accept_focused;
                None
            }
            KeyCode::Enter => Some(modal.accept_focused),
            KeyCode::Char('y') => Some(true),
            KeyCode::Char('n') | KeyCode::Esc => Some(false),
            _ => None,
        };
        if let Some(accept) = answer {
            if let Some(reply) = modal.reply.take() {
                let _ = reply.send(accept);
            }
            state.modal = None;
        }
        return;
    }

    if state.finalized {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            state.quit = true;
        }
        return;
    }

    match key.code {
        KeyCode::Enter => return spawn_nav(state, Nav::Next, handle, runtime, done),
        KeyCode::Esc => return spawn_nav(state, Nav::Back, handle, runtime, done),
        KeyCode::PageUp => return spawn_nav(state, Nav::HistoryBack, handle, runtime, done),
        KeyCode::PageDown => return spawn_nav(state, Nav::HistoryForward, handle, runtime, done),
        KeyCode::F(9) => {
            let pos = SUPPORTED.iter().position(|l| *l == state.lang).unwrap_or(0);
            let lang = SUPPORTED[(pos + 1) % SUPPORTED.len()];
            return spawn_nav(state, Nav::Language(lang), handle, runtime, done);
        }
        KeyCode::F(n) if (1..=8).contains(&n) => {
            if let Some(step) = Step::from_index(usize::from(n - 1)) {
                spawn_nav(state, Nav::Stepper(step), handle, runtime, done);
            }
            return;
        }
        KeyCode::Tab | KeyCode::Down => {
            state.focus += 1;
            let count = state.fields().len();
            if state.focus >= count {
                state.focus = 0;
            }
            state.input = None;
            state.sync_input();
            return;
        }
        KeyCode::BackTab | KeyCode::Up => {
            let count = state.fields().len();
            state.focus = if state.focus == 0 {
                count.saturating_sub(1)
            } else {
                state.focus - 1
            };
            state.input = None;
            state.sync_input();
            return;
        }
        _ => {}
    }

    let Some(field) = state.focused_field() else {
        return;
    };

    let outcome = match (field.kind(), key.code) {
        (_, KeyCode::Insert) if state.step == Step::Sport => {
            handle.edit(|d| d.sport.add_block().map(|_| ())).and_then(|r| r)
        }
        (_, KeyCode::Delete) if field.block_index().is_some() => {
            let i = field.block_index().unwrap_or_default();
            handle.edit(|d| {
                d.sport.remove_block(i);
            })
        }
        (FieldKind::Choice, KeyCode::Left) => change_choice(state, field, -1, handle),
        (FieldKind::Choice, KeyCode::Right | KeyCode::Char(' ')) => {
            change_choice(state, field, 1, handle)
        }
        (FieldKind::Toggle, KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right) => {
            toggle(field, handle)
        }
        (FieldKind::Text, code) => {
            let changed = state
                .input
                .as_mut()
                .map(|(_, input)| input.handle_key(code))
                .unwrap_or(false);
            let value = state.input.as_ref().map(|(_, i)| i.value.clone());
            match value {
                Some(value) if changed => commit_text(field, &value, handle),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    };

    match outcome {
        Ok(()) => {}
        Err(WizardError::Busy) => state.status = "Please wait...".to_string(),
        Err(e) => state.status = e.to_string(),
    }
    refresh(state, handle);
}

fn change_choice(
    state: &UiState,
    field: Field,
    delta: i32,
    handle: &WizardHandle<SessionHistory>,
) -> Result<(), WizardError> {
    const SEX: [Sex; 2] = [Sex::Male, Sex::Female];
    const ACTIVITY: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];
    const STEPS: [StepsBucket; 4] = [
        StepsBucket::Under5k,
        StepsBucket::From5kTo10k,
        StepsBucket::From10kTo15k,
        StepsBucket::Over15k,
    ];
    const TARGETS: [GoalTarget; 3] = [GoalTarget::Lose, GoalTarget::Maintain, GoalTarget::Gain];
    const UNITS: [EnergyUnit; 2] = [EnergyUnit::Kcal, EnergyUnit::KJ];
    const LEVELS: [SportLevel; 2] = [SportLevel::NoSport, SportLevel::Sport];
    const INTENSITY: [Intensity; 3] = [Intensity::Low, Intensity::Medium, Intensity::High];
    const DIETS: [Diet; 7] = [
        Diet::NoRestrictions,
        Diet::Vegetarian,
        Diet::Vegan,
        Diet::Pescatarian,
        Diet::GlutenFree,
        Diet::LactoseFree,
        Diet::LowCarb,
    ];
    const REPEATS: [MealRepeats; 3] = [MealRepeats::One, MealRepeats::Two, MealRepeats::Three];
    const GRAMS: [ShowGrams; 2] = [ShowGrams::Yes, ShowGrams::No];
    const VARIANTS: [PlanVariant; 2] = [PlanVariant::Standard, PlanVariant::Premium];
    const PERIODS: [PlanPeriod; 2] = [PlanPeriod::Week, PlanPeriod::Month];

    let d = &state.draft;
    match field {
        Field::Sex => handle.edit(|x| x.profile.sex = cycle(&SEX, d.profile.sex, delta)),
        Field::Activity => {
            handle.edit(|x| x.profile.activity = cycle(&ACTIVITY, d.profile.activity, delta))
        }
        Field::StepsBucket => handle.edit(|x| {
            x.profile.steps_bucket = cycle(&STEPS, d.profile.steps_bucket, delta)
        }),
        Field::Target => handle.edit(|x| x.goal.target = cycle(&TARGETS, d.goal.target, delta)),
        Field::EnergyUnit => handle.edit(|x| {
            if let Some(unit) = cycle(&UNITS, Some(d.goal.energy_unit), delta) {
                x.goal.energy_unit = unit;
            }
        }),
        Field::Level => handle.edit(|x| {
            if let Some(level) = cycle(&LEVELS, d.sport.level, delta) {
                x.sport.set_level(level);
            }
        }),
        Field::BlockSport(i) => {
            let ids = ordered_sport_ids(&state.catalog);
            let current = block(d, i).map(|b| b.sport_id.as_str()).unwrap_or_default();
            match cycle_id(&ids, current, delta) {
                Some(id) => handle.edit(|x| {
                    x.sport.set_block_sport(i, &id);
                }),
                None => Ok(()),
            }
        }
        Field::BlockIntensity(i) => handle.edit(|x| {
            let current = block(d, i).and_then(|b| b.intensity);
            if let Some(b) = x.sport.own_blocks.get_mut(i) {
                b.intensity = cycle(&INTENSITY, current, delta);
            }
        }),
        Field::MainSport => {
            let picked = d.sport.picked_ids().to_vec();
            let current = d.sport.main_sport_id().unwrap_or_default();
            match cycle_id(&picked, current, delta) {
                Some(id) => handle.edit(|x| {
                    x.sport.set_main_sport(&id);
                }),
                None => Ok(()),
            }
        }
        Field::Diet => handle.edit(|x| {
            x.nutrition.diet = cycle(&DIETS, d.nutrition.diet, delta);
            x.refresh_auto_premium();
        }),
        Field::Repeats => {
            handle.edit(|x| x.nutrition.repeats = cycle(&REPEATS, d.nutrition.repeats, delta))
        }
        Field::ShowGrams => handle.edit(|x| {
            x.nutrition.show_grams = cycle(&GRAMS, d.nutrition.show_grams, delta)
        }),
        Field::Variant => match cycle(&VARIANTS, d.plan.variant, delta) {
            Some(v) => handle.with_controller(|c| c.select_variant(v)).and_then(|r| r),
            None => Ok(()),
        },
        Field::Period => match cycle(&PERIODS, d.plan.period, delta) {
            Some(p) => handle.with_controller(|c| c.select_period(p)).and_then(|r| r),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

fn toggle(field: Field, handle: &WizardHandle<SessionHistory>) -> Result<(), WizardError> {
    handle.edit(|d| match field {
        Field::Interest(i) => {
            if let Some(tag) = INTEREST_TAGS.get(i) {
                d.sport.toggle_interest(tag);
            }
        }
        Field::Newsletter => d.customer.newsletter = !d.customer.newsletter,
        Field::Terms => d.consents.terms = !d.consents.terms,
        Field::Privacy => d.consents.privacy = !d.consents.privacy,
        _ => {}
    })
}

fn commit_text(
    field: Field,
    value: &str,
    handle: &WizardHandle<SessionHistory>,
) -> Result<(), WizardError> {
    let number = || Some(NumberInput::from(value));
    match field {
        Field::MacroC | Field::MacroP | Field::MacroF => handle
            .with_controller(|c| {
                let mut macros: Macros = c.draft().nutrition.macros.clone();
                let slot = match field {
                    Field::MacroC => &mut macros.c,
                    Field::MacroP => &mut macros.p,
                    _ => &mut macros.f,
                };
                *slot = NumberInput::from(value);
                c.update_macros(macros)
            })
            .and_then(|r| r),
        Field::Discount => handle
            .with_controller(|c| c.apply_discount_code(value).map(|_| ()))
            .and_then(|r| r),
        _ => handle.edit(|d| match field {
            Field::Age => d.profile.age = number(),
            Field::Height => d.profile.height_cm = number(),
            Field::Weight => d.profile.weight_kg = number(),
            Field::Bmr => d.goal.set_bmr_input(value),
            Field::FutureText => d.sport.future_text = value.to_string(),
            Field::BlockSessions(i) => {
                if let Some(b) = d.sport.own_blocks.get_mut(i) {
                    b.sessions_per_week = number();
                }
            }
            Field::BlockMinutes(i) => {
                if let Some(b) = d.sport.own_blocks.get_mut(i) {
                    b.minutes = number();
                }
            }
            Field::Dislikes => {
                d.nutrition.dislikes = parse_dislikes(value);
                d.refresh_auto_premium();
            }
            Field::Name => d.customer.name = value.to_string(),
            Field::Email => d.customer.email = value.to_string(),
            _ => {}
        }),
    }
}

// =============================================================================
// Drawing
// =============================================================================

fn draw(area: Rect, f: &mut ratatui::Frame<'_>, state: &UiState) {
    let window_area = centered_window(area, 100, 30);

    let outer_block = Block::default().borders(Borders::ALL).title("FitPlan");
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&ratatui::layout::Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(inner);

    draw_stepper(f, rows[0], state);

    let t = state.translator.as_ref();
    let title = state.step.title(t);
    let body_block = Block::default().borders(Borders::ALL).title(title);
    let body = Paragraph::new(Text::from(body_lines(state)))
        .block(body_block)
        .wrap(Wrap { trim: false });
    f.render_widget(body, rows[1]);

    let status_style = if state.load_error.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let status = match (&state.load_error, state.busy) {
        (Some(err), _) => err.clone(),
        (None, true) => "Loading...".to_string(),
        (None, false) => state.status.clone(),
    };
    f.render_widget(
        Paragraph::new(status)
            .style(status_style)
            .wrap(Wrap { trim: true }),
        rows[2],
    );

    let help = if state.finalized {
        "Enter/Esc: close"
    } else {
        "Enter: next  Esc: back  PgUp/PgDn: history  F1-F8: steps  F9: language  Tab: field  Ctrl+C: quit"
    };
    f.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        rows[3],
    );

    if let Some(modal) = &state.modal {
        draw_confirm_modal(f, window_area, modal, t);
    }
}

fn draw_stepper(f: &mut ratatui::Frame<'_>, area: Rect, state: &UiState) {
    let mut spans = Vec::new();
    for step in Step::ALL {
        let mut style = Style::default();
        if step > state.furthest {
            style = style.fg(Color::DarkGray);
        }
        if step == state.step {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(format!(" {} ", step.number()), style));
        spans.push(Span::raw(" "));
    }
    let title = Line::from(Span::styled(
        format!(
            "{} {}/{}",
            state.step.title(state.translator.as_ref()),
            state.step.number(),
            Step::ALL.len()
        ),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    f.render_widget(
        Paragraph::new(Text::from(vec![title, Line::from(spans)])),
        area,
    );
}

fn body_lines(state: &UiState) -> Vec<Line<'static>> {
    let t = state.translator.as_ref();
    let mut lines = Vec::new();

    if state.finalized {
        lines.push(Line::from(text(t, "thanks.title", "Thank you for your order!")));
        lines.push(Line::from(""));
    }

    for (i, field) in state.fields().into_iter().enumerate() {
        let focused = i == state.focus && state.modal.is_none();
        let value = match (&state.input, focused) {
            (Some((f, input)), true) if *f == field => format!("{}_", input.value),
            _ => field_value(field, &state.draft, &state.catalog, &state.lang),
        };
        let marker = if focused { "> " } else { "  " };
        let mut spans = vec![
            Span::raw(marker.to_string()),
            Span::raw(format!("{:<28}", field_label(field, t))),
            Span::styled(
                value,
                if focused {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                },
            ),
        ];
        if let Some(err) = state.errors.get(&field.error_key()) {
            spans.push(Span::styled(
                format!("  {}", err),
                Style::default().fg(Color::Red),
            ));
        }
        lines.push(Line::from(spans));
    }

    // Errors without a field of their own on this screen.
    let shown: Vec<String> = state.fields().iter().map(|f| f.error_key()).collect();
    for (key, msg) in state.errors.iter() {
        if !shown.iter().any(|k| k == key) {
            lines.push(Line::from(Span::styled(
                format!("  {}", msg),
                Style::default().fg(Color::Red),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.extend(step_notes(state).into_iter().map(Line::from));
    lines
}

/// Read-only information under the form.
fn step_notes(state: &UiState) -> Vec<String> {
    let t = state.translator.as_ref();
    let d = &state.draft;
    match state.step {
        Step::Goal => d
            .goal
            .bmr_kcal
            .map(|kcal| {
                vec![format!(
                    "{}: {} kcal",
                    text(t, "step2.bmr_computed", "Computed BMR"),
                    format_number(kcal)
                )]
            })
            .unwrap_or_default(),
        Step::Sport if d.sport.level == Some(SportLevel::Sport) => vec![
            format!(
                "{}: {}",
                text(t, "step3.sessions_total", "Trainings per week"),
                d.sport.total_sessions()
            ),
            "Ins: add sport  Del: remove sport".to_string(),
        ],
        Step::Balance | Step::Diet if d.plan.auto_premium => {
            vec![text(t, "step5.premium_note", "These choices need the Premium plan.")]
        }
        Step::Plan | Step::Review => {
            let mut notes = Vec::new();
            if let Some(price) = &d.plan.price {
                notes.push(format!("{}: {}", text(t, "step7.price", "Price"), price.formatted));
            }
            if let Some(pct) = d.plan.discount_percent {
                notes.push(format!("-{}%", pct));
            }
            if state.step == Step::Review {
                notes.extend(review_summary(d, &state.catalog, t, &state.lang));
            }
            notes
        }
        _ => Vec::new(),
    }
}

fn review_summary(
    d: &FormDraft,
    catalog: &SportsCatalog,
    t: &dyn Translate,
    lang: &str,
) -> Vec<String> {
    let bmr = d
        .goal
        .display_bmr()
        .map(|v| format!("{} {}", format_number(v), d.goal.energy_unit.label()))
        .unwrap_or_else(|| "-".to_string());
    let sports = match d.sport.level {
        Some(SportLevel::Sport) => d
            .sport
            .picked_ids()
            .iter()
            .map(|id| catalog.label(id, lang))
            .collect::<Vec<_>>()
            .join(", "),
        Some(SportLevel::NoSport) => d.sport.future_multi.join(", "),
        None => "-".to_string(),
    };
    let m = &d.nutrition.macros;
    vec![
        format!(
            "{}: {} · BMR {}",
            text(t, "step8.goal", "Goal"),
            enum_text(d.goal.target),
            bmr
        ),
        format!("{}: {}", text(t, "step8.sports", "Sports"), sports),
        format!(
            "{}: C {} / P {} / F {}",
            text(t, "step8.macros", "Macros"),
            number_text(Some(&m.c)),
            number_text(Some(&m.p)),
            number_text(Some(&m.f))
        ),
        format!(
            "{}: {} · {}",
            text(t, "step8.plan", "Plan"),
            enum_text(d.plan.variant),
            enum_text(d.plan.period)
        ),
    ]
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(60);
    let h = height.min(area.height.saturating_sub(2)).max(20);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_confirm_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, modal: &Modal, t: &dyn Translate) {
    let modal_w = 60u16.min(window_area.width.saturating_sub(4)).max(40);
    let modal_h = 8u16;
    let x = window_area.x + (window_area.width.saturating_sub(modal_w)) / 2;
    let y = window_area.y + (window_area.height.saturating_sub(modal_h)) / 2;
    let area = Rect {
        x,
        y,
        width: modal_w,
        height: modal_h,
    };

    let (title_default, body_default) = match modal.prompt {
        Prompt::LeaveForm => (
            "Leave the form?",
            "Your answers stay saved in this browser and you can come back later.",
        ),
        Prompt::PremiumLoss => (
            "Switch to Standard?",
            "Your diet, dislikes and custom macros need Premium and will be reset.",
        ),
    };

    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(text(t, modal.prompt.title_key(), title_default));
    let body = Paragraph::new(Text::from(vec![
        Line::from(text(t, modal.prompt.text_key(), body_default)),
        Line::from(""),
    ]))
    .block(block)
    .wrap(Wrap { trim: false });
    f.render_widget(body, area);

    let buttons_area = Rect {
        x: area.x + 1,
        y: area.y + area.height - 2,
        width: area.width - 2,
        height: 1,
    };
    let styled = |label: String, focused: bool| {
        Span::styled(
            format!("[ {} ]", label),
            if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            },
        )
    };
    let line = Line::from(vec![
        styled(text(t, "common.yes", "Yes"), modal.accept_focused),
        Span::raw(" "),
        styled(text(t, "common.no", "No"), !modal.accept_focused),
    ]);
    f.render_widget(
        Paragraph::new(Text::from(line)).alignment(Alignment::Right),
        buttons_area,
    );
}

/// Log the final state of an interactive session.
pub fn log_exit(handle: &WizardHandle<SessionHistory>) {
    match handle.snapshot() {
        Ok((ws, _)) => info!(
            "[PHASE: tui] [STEP: exit] Left at step {} (finalized: {})",
            ws.current().number(),
            ws.is_finalized()
        ),
        Err(e) => warn!("[PHASE: tui] [STEP: exit] Exit while busy: {}", e),
    }
}
