// Shared wizard handle
//
// Hosts hold a cloneable handle instead of the synchronizer. Every operation takes the lock
// with `try_lock`: a request arriving while a transition is still in flight (waiting for
// markup, the settling delay or a confirmation) is refused with `WizardError::Busy`.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::controller::{NavigationController, Transition};
use super::history::{HistoryBackend, HistoryEntry, HistorySynchronizer};
use super::steps::Step;
use crate::errors::WizardError;
use crate::models::draft::FormDraft;
use crate::models::state::WizardState;

pub struct WizardHandle<B: HistoryBackend> {
    inner: Arc<Mutex<HistorySynchronizer<B>>>,
}

impl<B: HistoryBackend> Clone for WizardHandle<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: HistoryBackend> WizardHandle<B> {
    pub fn new(sync: HistorySynchronizer<B>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sync)),
        }
    }

    fn acquire(&self) -> Result<MutexGuard<'_, HistorySynchronizer<B>>, WizardError> {
        self.inner.try_lock().map_err(|_| WizardError::Busy)
    }

    pub async fn boot(&self, resume: bool) -> Result<bool, WizardError> {
        let mut sync = self.acquire()?;
        Ok(sync.boot(resume).await)
    }

    pub async fn next(&self) -> Result<Transition, WizardError> {
        self.acquire()?.next().await
    }

    pub async fn go_to(&self, step: Step) -> Result<Transition, WizardError> {
        self.acquire()?.go_to(step).await
    }

    pub async fn stepper_click(&self, step: Step) -> Result<Transition, WizardError> {
        self.acquire()?.stepper_click(step).await
    }

    pub async fn back_button(&self) -> Result<Transition, WizardError> {
        self.acquire()?.back_button().await
    }

    pub async fn navigate_back(&self) -> Result<Transition, WizardError> {
        self.acquire()?.navigate_back().await
    }

    pub async fn navigate_forward(&self) -> Result<Transition, WizardError> {
        self.acquire()?.navigate_forward().await
    }

    pub async fn pop_state(&self, entry: HistoryEntry) -> Result<Transition, WizardError> {
        self.acquire()?.on_pop_state(entry).await
    }

    pub async fn switch_language(&self, lang: &str) -> Result<bool, WizardError> {
        let mut sync = self.acquire()?;
        Ok(sync.controller_mut().switch_language(lang).await)
    }

    /// Edit the draft in place.
    pub fn edit<R>(&self, f: impl FnOnce(&mut FormDraft) -> R) -> Result<R, WizardError> {
        let mut sync = self.acquire()?;
        let draft = sync.controller_mut().draft_mut()?;
        Ok(f(draft))
    }

    /// Run a controller operation that needs no await (plan selection, macro edits).
    pub fn with_controller<R>(
        &self,
        f: impl FnOnce(&mut NavigationController) -> R,
    ) -> Result<R, WizardError> {
        let mut sync = self.acquire()?;
        Ok(f(sync.controller_mut()))
    }

    /// Current step state and a copy of the draft.
    pub fn snapshot(&self) -> Result<(WizardState, FormDraft), WizardError> {
        let sync = self.acquire()?;
        let controller = sync.controller();
        Ok((controller.state(), controller.draft().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::assets::tests::StubAssets;
    use crate::i18n::Localizer;
    use crate::persistence::draft::DraftStore;
    use crate::persistence::store::MemoryStore;
    use crate::wizard::controller::tests::{fill_profile, StubOrders};
    use crate::wizard::controller::{Collaborators, Prompt, StepView};
    use crate::wizard::history::SessionHistory;
    use crate::wizard::validators::FieldErrors;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// View whose first mount blocks until released.
    #[derive(Default)]
    struct GateView {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl StepView for GateView {
        async fn mount(&self, _step: Step, _markup: &str) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        async fn show_errors(&self, _step: Step, _errors: &FieldErrors) {}
        async fn show_load_error(&self, _step: Step, _message: &str) {}
        async fn confirm(&self, _prompt: Prompt) -> bool {
            false
        }
    }

    fn handle_with(view: Arc<dyn StepView>) -> WizardHandle<SessionHistory> {
        let controller = NavigationController::new(
            Collaborators {
                view,
                assets: Arc::new(StubAssets::new()),
                drafts: DraftStore::new(Arc::new(MemoryStore::new())),
                orders: Arc::new(StubOrders::accepting()),
                translator: Arc::new(Localizer::empty("en")),
            },
            Duration::ZERO,
        );
        let page = url::Url::parse("https://fitplan.example/wizard.html").expect("url");
        WizardHandle::new(HistorySynchronizer::new(
            controller,
            SessionHistory::new(page.as_str()),
            page,
        ))
    }

    #[tokio::test]
    async fn concurrent_transition_is_rejected() {
        let view = Arc::new(GateView::default());
        let handle = handle_with(view.clone());

        let booting = handle.clone();
        let task = tokio::spawn(async move { booting.boot(false).await });
        view.entered.notified().await;

        assert_eq!(handle.next().await, Err(WizardError::Busy));
        assert_eq!(handle.edit(|_| ()), Err(WizardError::Busy));
        assert!(handle.snapshot().is_err());

        view.release.notify_one();
        assert_eq!(task.await.expect("join"), Ok(false));

        let (state, _) = handle.snapshot().expect("snapshot");
        assert_eq!(state.current(), Step::Profile);
    }

    #[tokio::test]
    async fn edits_then_next() {
        let handle = handle_with(Arc::new(crate::wizard::controller::tests::RecordingView::default()));
        handle.boot(false).await.expect("boot");
        handle.edit(fill_profile).expect("edit");

        let t = handle.next().await.expect("next");
        assert!(t.moved());
        let (state, draft) = handle.snapshot().expect("snapshot");
        assert_eq!(state.current(), Step::Goal);
        assert_eq!(draft.goal.bmr_kcal, Some(1780.0));
    }
}
