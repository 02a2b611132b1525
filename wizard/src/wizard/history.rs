// Session history synchronization
//
// Mirrors the controller's step into a browser-like history stack. Each entry carries
// `{"step": N}` and the page URL with `?step=N`; entries the wizard did not create are
// `HistoryEntry::Unknown`.
//
// Rules:
//   - every successful UI transition pushes exactly one entry
//   - repairing an invalid entry replaces it
//   - popping to an earlier step jumps directly, to a later one replays `go_next`

use log::{debug, info, warn};
use serde_json::{json, Value};
use url::Url;

use super::controller::{NavigationController, Prompt, Transition};
use super::steps::Step;
use crate::errors::WizardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEntry {
    Step(Step),
    Unknown,
}

impl HistoryEntry {
    /// Decode a history state object. Anything without a valid `step` is `Unknown`.
    pub fn from_state(state: Option<&Value>) -> Self {
        state
            .and_then(|s| s.get("step"))
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
            .and_then(|i| usize::try_from(i).ok())
            .and_then(Step::from_index)
            .map_or(HistoryEntry::Unknown, HistoryEntry::Step)
    }

    pub fn to_state(self) -> Value {
        match self {
            HistoryEntry::Step(step) => json!({ "step": step.index() }),
            HistoryEntry::Unknown => Value::Null,
        }
    }
}

/// Session history the synchronizer writes to.
pub trait HistoryBackend: Send {
    fn current(&self) -> HistoryEntry;

    fn push(&mut self, entry: HistoryEntry, url: &str);

    fn replace(&mut self, entry: HistoryEntry, url: &str);

    /// Move one entry back; returns the entry now active, `None` when there is none.
    fn back(&mut self) -> Option<HistoryEntry>;

    fn forward(&mut self) -> Option<HistoryEntry>;

    /// The user leaves the wizard page.
    fn leave(&mut self);
}

/// In-memory history with browser semantics: pushing drops the forward entries.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    entries: Vec<(HistoryEntry, String)>,
    index: usize,
    left: bool,
}

impl SessionHistory {
    /// History of a freshly opened page; its own entry has no wizard state.
    pub fn new(initial_url: &str) -> Self {
        Self {
            entries: vec![(HistoryEntry::Unknown, initial_url.to_string())],
            index: 0,
            left: false,
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().map(|(e, _)| *e).collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_url(&self) -> &str {
        self.entries
            .get(self.index)
            .map(|(_, url)| url.as_str())
            .unwrap_or_default()
    }

    pub fn has_left(&self) -> bool {
        self.left
    }
}

impl HistoryBackend for SessionHistory {
    fn current(&self) -> HistoryEntry {
        self.entries
            .get(self.index)
            .map_or(HistoryEntry::Unknown, |(e, _)| *e)
    }

    fn push(&mut self, entry: HistoryEntry, url: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push((entry, url.to_string()));
        self.index = self.entries.len() - 1;
    }

    fn replace(&mut self, entry: HistoryEntry, url: &str) {
        match self.entries.get_mut(self.index) {
            Some(slot) => *slot = (entry, url.to_string()),
            None => self.push(entry, url),
        }
    }

    fn back(&mut self) -> Option<HistoryEntry> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    fn forward(&mut self) -> Option<HistoryEntry> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    fn leave(&mut self) {
        self.left = true;
    }
}

pub struct HistorySynchronizer<B: HistoryBackend> {
    controller: NavigationController,
    backend: B,
    page: Url,
}

impl<B: HistoryBackend> HistorySynchronizer<B> {
    pub fn new(controller: NavigationController, backend: B, page: Url) -> Self {
        Self {
            controller,
            backend,
            page,
        }
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut NavigationController {
        &mut self.controller
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Relative page URL for `step`; other query parameters are kept. An existing `step`
    /// parameter keeps its position, later duplicates are dropped.
    pub fn step_url(&self, step: Step) -> String {
        let mut url = self.page.clone();
        let value = step.index().to_string();
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut found = false;
        for (k, v) in url.query_pairs() {
            if k != "step" {
                pairs.push((k.into_owned(), v.into_owned()));
            } else if !found {
                found = true;
                pairs.push(("step".to_string(), value.clone()));
            }
        }
        if !found {
            pairs.push(("step".to_string(), value));
        }
        url.query_pairs_mut().clear().extend_pairs(pairs);

        let mut relative = url.path().to_string();
        if let Some(query) = url.query() {
            relative.push('?');
            relative.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            relative.push('#');
            relative.push_str(fragment);
        }
        relative
    }

    fn push_current(&mut self) {
        let step = self.controller.current();
        let url = self.step_url(step);
        debug!("[PHASE: history] [STEP: push] {}", url);
        self.backend.push(HistoryEntry::Step(step), &url);
    }

    fn replace_current(&mut self) {
        let step = self.controller.current();
        let url = self.step_url(step);
        debug!("[PHASE: history] [STEP: replace] {}", url);
        self.backend.replace(HistoryEntry::Step(step), &url);
    }

    /// Start or resume, then record the initial entry. A reload that already sits on a
    /// wizard entry replaces it instead of stacking a duplicate.
    pub async fn boot(&mut self, resume: bool) -> bool {
        let restored = if resume {
            self.controller.resume().await
        } else {
            self.controller.start().await;
            false
        };
        match self.backend.current() {
            HistoryEntry::Step(_) => self.replace_current(),
            HistoryEntry::Unknown => self.push_current(),
        }
        restored
    }

    /// The "Next" button.
    pub async fn next(&mut self) -> Result<Transition, WizardError> {
        let transition = self.controller.go_next().await?;
        if transition.moved() {
            self.push_current();
        }
        Ok(transition)
    }

    pub async fn go_to(&mut self, step: Step) -> Result<Transition, WizardError> {
        let transition = self.controller.go_to_step(step).await?;
        if transition.moved() {
            self.push_current();
        }
        Ok(transition)
    }

    /// Click on a stepper dot.
    pub async fn stepper_click(&mut self, target: Step) -> Result<Transition, WizardError> {
        let current = self.controller.current();
        if target == current {
            return Ok(Transition::Stayed);
        }
        if target < current {
            return self.go_to(target).await;
        }
        if current.next() == Some(target) {
            return self.next().await;
        }
        if !self.controller.state().is_reachable(target) {
            return Err(WizardError::Unreachable(target));
        }

        let transition = self.controller.go_forward_to_step(target).await?;
        if self.controller.current() != current {
            self.push_current();
        }
        Ok(transition)
    }

    /// The "Back" button: leaving from the first step needs confirmation, elsewhere it is a
    /// history back.
    pub async fn back_button(&mut self) -> Result<Transition, WizardError> {
        if self.controller.current() == Step::FIRST {
            return Ok(self.confirm_leave().await);
        }
        self.navigate_back().await
    }

    /// Browser back.
    pub async fn navigate_back(&mut self) -> Result<Transition, WizardError> {
        match self.backend.back() {
            Some(entry) => self.on_pop_state(entry).await,
            None => Ok(Transition::Stayed),
        }
    }

    /// Browser forward.
    pub async fn navigate_forward(&mut self) -> Result<Transition, WizardError> {
        match self.backend.forward() {
            Some(entry) => self.on_pop_state(entry).await,
            None => Ok(Transition::Stayed),
        }
    }

    /// React to the history moving to `entry`.
    pub async fn on_pop_state(&mut self, entry: HistoryEntry) -> Result<Transition, WizardError> {
        let current = self.controller.current();
        let target = match entry {
            HistoryEntry::Step(step) => step,
            HistoryEntry::Unknown if current == Step::FIRST => {
                let transition = self.confirm_leave().await;
                if transition == Transition::Stayed {
                    self.push_current();
                }
                return Ok(transition);
            }
            HistoryEntry::Unknown => {
                warn!("[PHASE: history] [STEP: popstate] Entry without step, repairing");
                self.replace_current();
                return Ok(Transition::Stayed);
            }
        };

        if target < current {
            return self.controller.go_to_step(target).await;
        }
        if target > current && !self.controller.state().is_reachable(target) {
            warn!(
                "[PHASE: history] [STEP: popstate] Step {} is not unlocked, repairing",
                target.number()
            );
            self.replace_current();
            return Ok(Transition::Stayed);
        }
        if target > current {
            let transition = self.controller.go_forward_to_step(target).await?;
            if self.controller.current() != target {
                info!(
                    "[PHASE: history] [STEP: popstate] Replay stopped at step {}",
                    self.controller.current().number()
                );
                self.replace_current();
            }
            return Ok(transition);
        }
        Ok(Transition::Stayed)
    }

    async fn confirm_leave(&mut self) -> Transition {
        if self.controller.confirm(Prompt::LeaveForm).await {
            info!("[PHASE: history] [STEP: leave] User left the wizard");
            self.backend.leave();
            Transition::Left
        } else {
            Transition::Stayed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::draft::FormDraft;
    use crate::persistence::draft::DraftStore;
    use crate::wizard::controller::tests::{fill_valid, fixture, Fixture, RecordingView};
    use std::sync::Arc;

    const PAGE: &str = "https://fitplan.example/wizard.html?lang=cs";

    fn synced(f: Fixture) -> (HistorySynchronizer<SessionHistory>, Arc<RecordingView>) {
        let view = f.view.clone();
        let page = Url::parse(PAGE).expect("url");
        let sync = HistorySynchronizer::new(f.controller, SessionHistory::new(PAGE), page);
        (sync, view)
    }

    async fn booted_valid() -> (HistorySynchronizer<SessionHistory>, Arc<RecordingView>) {
        let (mut sync, view) = synced(fixture());
        sync.boot(false).await;
        fill_valid(sync.controller_mut().draft_mut().expect("editable"));
        (sync, view)
    }

    #[test]
    fn entry_state_decoding() {
        assert_eq!(
            HistoryEntry::from_state(Some(&json!({ "step": 3 }))),
            HistoryEntry::Step(Step::Balance)
        );
        assert_eq!(
            HistoryEntry::from_state(Some(&json!({ "step": "2" }))),
            HistoryEntry::Step(Step::Sport)
        );
        assert_eq!(HistoryEntry::from_state(None), HistoryEntry::Unknown);
        assert_eq!(
            HistoryEntry::from_state(Some(&json!({ "step": 9 }))),
            HistoryEntry::Unknown
        );
        assert_eq!(
            HistoryEntry::from_state(Some(&json!({ "other": 1 }))),
            HistoryEntry::Unknown
        );
        assert_eq!(HistoryEntry::Step(Step::Goal).to_state(), json!({ "step": 1 }));
    }

    #[tokio::test]
    async fn boot_pushes_first_step_and_keeps_query() {
        let (mut sync, _) = synced(fixture());
        sync.boot(false).await;
        assert_eq!(
            sync.backend().entries(),
            vec![HistoryEntry::Unknown, HistoryEntry::Step(Step::Profile)]
        );
        assert_eq!(sync.backend().current_url(), "/wizard.html?lang=cs&step=0");
    }

    #[tokio::test]
    async fn three_nexts_push_three_entries_and_back_restores() {
        let (mut sync, _) = booted_valid().await;
        for _ in 0..3 {
            assert!(sync.next().await.expect("next").moved());
        }
        assert_eq!(
            sync.backend().entries(),
            vec![
                HistoryEntry::Unknown,
                HistoryEntry::Step(Step::Profile),
                HistoryEntry::Step(Step::Goal),
                HistoryEntry::Step(Step::Sport),
                HistoryEntry::Step(Step::Balance),
            ]
        );

        sync.navigate_back().await.expect("back");
        assert_eq!(sync.controller().current(), Step::Sport);
        assert_eq!(sync.backend().current(), HistoryEntry::Step(Step::Sport));
        assert_eq!(sync.backend().entries().len(), 5);

        sync.navigate_forward().await.expect("forward");
        assert_eq!(sync.controller().current(), Step::Balance);
    }

    #[tokio::test]
    async fn forward_replay_failure_repairs_entry() {
        let (mut sync, _) = booted_valid().await;
        for _ in 0..3 {
            sync.next().await.expect("next");
        }
        sync.navigate_back().await.expect("back");
        sync.navigate_back().await.expect("back");
        assert_eq!(sync.controller().current(), Step::Goal);

        sync.controller_mut()
            .draft_mut()
            .expect("editable")
            .goal
            .target = None;
        sync.navigate_forward().await.expect("forward");
        assert_eq!(sync.controller().current(), Step::Goal);
        assert_eq!(sync.backend().current(), HistoryEntry::Step(Step::Goal));
        assert!(sync.backend().current_url().ends_with("step=1"));
    }

    #[tokio::test]
    async fn unknown_entry_on_first_step_asks_before_leaving() {
        let (mut sync, view) = synced(fixture());
        sync.boot(false).await;

        // Declined: the user stays and a valid entry is pushed again.
        let t = sync.navigate_back().await.expect("back");
        assert_eq!(t, Transition::Stayed);
        assert_eq!(view.prompts(), vec![Prompt::LeaveForm]);
        assert_eq!(sync.backend().current(), HistoryEntry::Step(Step::Profile));
        assert!(!sync.backend().has_left());

        view.answer(true);
        let t = sync.back_button().await.expect("back button");
        assert_eq!(t, Transition::Left);
        assert!(sync.backend().has_left());
    }

    #[tokio::test]
    async fn unknown_entry_elsewhere_is_replaced() {
        let (mut sync, view) = booted_valid().await;
        sync.next().await.expect("next");
        let t = sync.on_pop_state(HistoryEntry::Unknown).await.expect("pop");
        assert_eq!(t, Transition::Stayed);
        assert!(view.prompts().is_empty());
        assert_eq!(sync.backend().current(), HistoryEntry::Step(Step::Goal));
        assert_eq!(sync.backend().entries().len(), 3);
    }

    #[tokio::test]
    async fn back_button_off_first_step_is_history_back() {
        let (mut sync, view) = booted_valid().await;
        sync.next().await.expect("next");
        sync.back_button().await.expect("back");
        assert_eq!(sync.controller().current(), Step::Profile);
        assert!(view.prompts().is_empty());
    }

    #[tokio::test]
    async fn stepper_clicks() {
        let (mut sync, _) = booted_valid().await;
        for _ in 0..4 {
            sync.next().await.expect("next");
        }
        sync.go_to(Step::Goal).await.expect("jump back");
        let pushed = sync.backend().entries().len();

        let t = sync.stepper_click(Step::Diet).await.expect("replay");
        assert!(t.moved());
        assert_eq!(sync.controller().current(), Step::Diet);
        assert_eq!(sync.backend().entries().len(), pushed + 1);

        assert_eq!(
            sync.stepper_click(Step::Review).await,
            Err(WizardError::Unreachable(Step::Review))
        );
        assert_eq!(sync.stepper_click(Step::Diet).await, Ok(Transition::Stayed));
    }

    #[tokio::test]
    async fn resume_boot_lands_on_plan() {
        let f = fixture();
        let mut draft = FormDraft::default();
        fill_valid(&mut draft);
        DraftStore::new(f.raw.clone())
            .save(&draft, Step::Plan, "cs")
            .await;

        let (mut sync, _) = synced(f);
        assert!(sync.boot(true).await);
        assert_eq!(sync.controller().current(), Step::Plan);
        assert_eq!(sync.backend().current(), HistoryEntry::Step(Step::Plan));
        assert!(sync.backend().current_url().ends_with("step=6"));
    }

    #[tokio::test]
    async fn reload_on_wizard_entry_replaces() {
        let (mut sync, _) = synced(fixture());
        sync.boot(false).await;
        sync.boot(false).await;
        assert_eq!(sync.backend().entries().len(), 2);
    }

    #[test]
    fn step_url_replaces_existing_step_param() {
        let f = fixture();
        let page =
            Url::parse("https://fitplan.example/wizard.html?step=4&resume=true&step=5#top")
                .expect("url");
        let sync = HistorySynchronizer::new(f.controller, SessionHistory::new(PAGE), page);
        assert_eq!(
            sync.step_url(Step::Sport),
            "/wizard.html?step=2&resume=true#top"
        );
    }

    #[tokio::test]
    async fn pop_to_locked_step_is_ignored() {
        let (mut sync, _) = booted_valid().await;
        let t = sync
            .on_pop_state(HistoryEntry::Step(Step::Plan))
            .await
            .expect("pop");
        assert_eq!(t, Transition::Stayed);
        assert_eq!(sync.controller().current(), Step::Profile);
        assert_eq!(sync.controller().state().furthest(), Step::Profile);
        assert_eq!(sync.backend().current(), HistoryEntry::Step(Step::Profile));
        assert!(sync.backend().current_url().ends_with("step=0"));
    }
}
