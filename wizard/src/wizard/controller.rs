// Navigation controller
//
// Owns the draft and the step state. Every transition follows the same order: validate the
// current step, run leave side effects, unlock, move, enter the new step, persist.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::steps::{self, Step};
use super::validators::FieldErrors;
use crate::api::assets::{AssetSource, CatalogCache};
use crate::api::orders::OrderSubmitter;
use crate::errors::WizardError;
use crate::i18n::Translate;
use crate::models::catalog::SportsCatalog;
use crate::models::draft::{FormDraft, Macros, PlanPeriod, PlanVariant};
use crate::models::requests::OrderRequest;
use crate::models::state::WizardState;
use crate::persistence::draft::DraftStore;
use crate::utils::logging::mask_email;

/// Step restored when the persisted step index is missing or unparsable.
pub const RESUME_FALLBACK_STEP: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Leaving the wizard from the first step.
    LeaveForm,
    /// Standard plan chosen while premium-only nutrition choices are set.
    PremiumLoss,
}

impl Prompt {
    pub fn title_key(self) -> &'static str {
        match self {
            Prompt::LeaveForm => "common.leave_title",
            Prompt::PremiumLoss => "step7.standard_warning_title",
        }
    }

    pub fn text_key(self) -> &'static str {
        match self {
            Prompt::LeaveForm => "common.leave_text",
            Prompt::PremiumLoss => "step7.standard_warning_text",
        }
    }
}

/// Presentation side of the wizard.
#[async_trait]
pub trait StepView: Send + Sync {
    /// Show the fetched markup of `step`; the draft is already prepared for it.
    async fn mount(&self, step: Step, markup: &str);

    /// Replace the error display of `step`. An empty map clears it.
    async fn show_errors(&self, step: Step, errors: &FieldErrors);

    async fn show_load_error(&self, step: Step, message: &str);

    /// Modal confirmation; `true` means the user accepted.
    async fn confirm(&self, prompt: Prompt) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Accepted { order_id: String, redirect: String },
    Failed { reason: String, redirect: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing to do (target is the current step).
    Stayed,
    Moved { from: Step, to: Step },
    /// The validator of `step` failed; nothing changed.
    Blocked { step: Step, errors: FieldErrors },
    /// The user declined a confirmation on `step`.
    Declined { step: Step },
    /// The user confirmed leaving the wizard.
    Left,
    Submitted(Submission),
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

pub struct Collaborators {
    pub view: Arc<dyn StepView>,
    pub assets: Arc<dyn AssetSource>,
    pub drafts: DraftStore,
    pub orders: Arc<dyn OrderSubmitter>,
    pub translator: Arc<dyn Translate>,
}

pub struct NavigationController {
    state: WizardState,
    draft: FormDraft,
    lang: String,
    translator: Arc<dyn Translate>,
    view: Arc<dyn StepView>,
    assets: Arc<dyn AssetSource>,
    catalog: CatalogCache,
    drafts: DraftStore,
    orders: Arc<dyn OrderSubmitter>,
    settle_delay: Duration,
    order_id: Option<String>,
}

impl NavigationController {
    pub fn new(collaborators: Collaborators, settle_delay: Duration) -> Self {
        let Collaborators {
            view,
            assets,
            drafts,
            orders,
            translator,
        } = collaborators;
        Self {
            state: WizardState::default(),
            draft: FormDraft::default(),
            lang: translator.lang().to_string(),
            translator,
            view,
            assets,
            catalog: CatalogCache::new(),
            drafts,
            orders,
            settle_delay,
            order_id: None,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn current(&self) -> Step {
        self.state.current()
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    /// Mutable draft for field edits. Refused once the order was submitted.
    pub fn draft_mut(&mut self) -> Result<&mut FormDraft, WizardError> {
        if self.state.is_finalized() {
            return Err(WizardError::Finalized);
        }
        Ok(&mut self.draft)
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn translator(&self) -> &dyn Translate {
        self.translator.as_ref()
    }

    pub fn shared_translator(&self) -> Arc<dyn Translate> {
        Arc::clone(&self.translator)
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    /// Catalog loaded so far (empty until a step needing it was entered).
    pub fn catalog(&self) -> SportsCatalog {
        self.catalog.cached().cloned().unwrap_or_default()
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.state.is_finalized() {
            Err(WizardError::Finalized)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Boot
    // =========================================================================

    /// Fresh start on the first step.
    pub async fn start(&mut self) -> Step {
        info!("[PHASE: navigation] [STEP: start] Starting wizard ({})", self.lang);
        self.state = WizardState::default();
        self.load_step(Step::FIRST).await;
        self.state.current()
    }

    /// Hydrate from storage and continue where the user left off. Falls back to a fresh
    /// start when nothing is stored. Returns whether a draft was restored.
    pub async fn resume(&mut self) -> bool {
        let Some(snapshot) = self.drafts.load().await else {
            info!("[PHASE: navigation] [STEP: resume] No stored draft, starting fresh");
            self.start().await;
            return false;
        };

        let step = Step::clamped(snapshot.step.unwrap_or(RESUME_FALLBACK_STEP));
        self.draft = snapshot.draft;
        self.order_id = snapshot.order_id;
        self.state.resume_at(step);
        info!(
            "[PHASE: navigation] [STEP: resume] Resuming at step {}",
            step.number()
        );
        self.load_step(step).await;
        true
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Validate the current step and advance. On the last step the order is submitted.
    pub async fn go_next(&mut self) -> Result<Transition, WizardError> {
        self.ensure_editable()?;
        let step = self.state.current();

        let errors = steps::validate(step, &self.draft, self.translator.as_ref());
        self.view.show_errors(step, &errors).await;
        if !errors.is_empty() {
            debug!(
                "[PHASE: navigation] [STEP: validate] Step {} blocked by {} error(s)",
                step.number(),
                errors.len()
            );
            return Ok(Transition::Blocked { step, errors });
        }

        if step == Step::Sport {
            self.draft.sport.cleanup_before_leave();
        }
        if step == Step::Plan && !self.premium_gate().await {
            return Ok(Transition::Declined { step });
        }

        let Some(next) = step.next() else {
            return Ok(Transition::Submitted(self.submit().await));
        };

        self.state.unlock(next);
        self.state.move_to(next);
        self.load_step(next).await;
        info!(
            "[PHASE: navigation] [STEP: go_next] Moved to step {}",
            next.number()
        );
        Ok(Transition::Moved {
            from: step,
            to: next,
        })
    }

    /// Jump to an unlocked step without validation.
    pub async fn go_to_step(&mut self, target: Step) -> Result<Transition, WizardError> {
        self.ensure_editable()?;
        let from = self.state.current();
        if target == from {
            return Ok(Transition::Stayed);
        }
        if !self.state.is_reachable(target) {
            warn!(
                "[PHASE: navigation] [STEP: go_to] Step {} is not unlocked (furthest {})",
                target.number(),
                self.state.furthest().number()
            );
            return Err(WizardError::Unreachable(target));
        }

        if from == Step::Sport {
            self.draft.sport.cleanup_before_leave();
        }
        self.state.move_to(target);
        self.load_step(target).await;
        info!(
            "[PHASE: navigation] [STEP: go_to] Jumped from step {} to step {}",
            from.number(),
            target.number()
        );
        Ok(Transition::Moved { from, to: target })
    }

    /// Replay `go_next` until `target` is reached or a step refuses to advance. The refusing
    /// transition is returned as is. `target` must already be unlocked.
    pub async fn go_forward_to_step(&mut self, target: Step) -> Result<Transition, WizardError> {
        self.ensure_editable()?;
        if !self.state.is_reachable(target) {
            warn!(
                "[PHASE: navigation] [STEP: go_forward] Step {} is not unlocked (furthest {})",
                target.number(),
                self.state.furthest().number()
            );
            return Err(WizardError::Unreachable(target));
        }
        let from = self.state.current();
        while self.state.current() < target {
            let transition = self.go_next().await?;
            if !transition.moved() {
                return Ok(transition);
            }
        }
        let to = self.state.current();
        if to == from {
            Ok(Transition::Stayed)
        } else {
            Ok(Transition::Moved { from, to })
        }
    }

    /// Prepare the draft for `step`, fetch and mount its markup, persist.
    ///
    /// A failed fetch is shown on the view; the step state stays where it is.
    pub async fn load_step(&mut self, step: Step) -> bool {
        let catalog = if step.needs_catalog() {
            self.catalog.get(self.assets.as_ref()).await
        } else {
            self.catalog()
        };
        steps::on_enter(step, &mut self.draft, &catalog, &self.lang);

        match self.assets.step_markup(step).await {
            Ok(markup) => {
                self.view.mount(step, &markup).await;
                self.drafts.save(&self.draft, step, &self.lang).await;
                debug!(
                    "[PHASE: navigation] [STEP: load] Step {} ready",
                    step.number()
                );
                true
            }
            Err(e) => {
                warn!(
                    "[PHASE: navigation] [STEP: load] Step {} failed to load: {}",
                    step.number(),
                    e
                );
                self.view.show_load_error(step, &e.to_string()).await;
                false
            }
        }
    }

    /// Before the review: a standard plan cannot keep premium-only choices.
    async fn premium_gate(&mut self) -> bool {
        tokio::time::sleep(self.settle_delay).await;

        let standard = self.draft.plan.variant == Some(PlanVariant::Standard);
        if !standard || !self.draft.nutrition.needs_premium() {
            return true;
        }

        if !self.view.confirm(Prompt::PremiumLoss).await {
            info!("[PHASE: navigation] [STEP: premium_gate] User kept premium choices");
            return false;
        }
        let catalog = self.catalog.get(self.assets.as_ref()).await;
        self.draft.reset_to_standard_defaults(&catalog);
        info!("[PHASE: navigation] [STEP: premium_gate] Nutrition reset to standard defaults");
        true
    }

    async fn submit(&mut self) -> Submission {
        let step = Step::LAST;
        let lang = self.lang.clone();
        if self.draft.plan.price.is_none() {
            self.draft.plan.refresh_price(&lang);
        }
        self.drafts.save(&self.draft, step, &lang).await;

        let request = OrderRequest::from_draft(&self.draft, &lang);
        info!(
            "[PHASE: submit] [STEP: create_order] Submitting order for {}",
            mask_email(&request.email)
        );

        match self.orders.create_order(&request).await {
            Ok(receipt) => {
                self.drafts
                    .save_submitted(&self.draft, step, &lang, &receipt.order_id)
                    .await;
                self.state.finalize();
                self.order_id = Some(receipt.order_id.clone());
                Submission::Accepted {
                    order_id: receipt.order_id,
                    redirect: thanks_url(&lang),
                }
            }
            Err(e) => {
                warn!("[PHASE: submit] [STEP: create_order] Order failed: {}", e);
                self.drafts.save(&self.draft, step, &lang).await;
                Submission::Failed {
                    reason: e.to_string(),
                    redirect: fail_url(&lang),
                }
            }
        }
    }

    // =========================================================================
    // Field operations with side effects
    // =========================================================================

    /// Ask the view for a modal confirmation.
    pub async fn confirm(&self, prompt: Prompt) -> bool {
        self.view.confirm(prompt).await
    }

    /// Recommended macro split for the current main sport.
    pub fn recommended_macros(&self) -> Macros {
        super::nutrition::default_macros(&self.catalog(), self.draft.sport.main_sport_id())
    }

    /// Record a macro edit; `customized` and the premium flag follow.
    pub fn update_macros(&mut self, macros: Macros) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let recommended = self.recommended_macros();
        self.draft.nutrition.set_macros(macros, &recommended);
        self.draft.refresh_auto_premium();
        Ok(())
    }

    /// Choosing standard while premium is required drops the premium-only choices.
    pub fn select_variant(&mut self, variant: PlanVariant) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.draft.plan.variant = Some(variant);
        if variant == PlanVariant::Standard && self.draft.plan.auto_premium {
            let catalog = self.catalog();
            self.draft.reset_to_standard_defaults(&catalog);
        }
        self.draft.plan.refresh_price(&self.lang);
        Ok(())
    }

    pub fn select_period(&mut self, period: PlanPeriod) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.draft.plan.period = Some(period);
        self.draft.plan.refresh_price(&self.lang);
        Ok(())
    }

    /// Returns the applied percentage; an unknown code clears the discount.
    pub fn apply_discount_code(&mut self, code: &str) -> Result<Option<u8>, WizardError> {
        self.ensure_editable()?;
        let applied = self.draft.plan.apply_discount_code(code, &self.lang);
        info!(
            "[PHASE: pricing] [STEP: discount] Discount code {}",
            if applied.is_some() { "applied" } else { "rejected" }
        );
        Ok(applied)
    }

    /// Switch the UI language: remember it, re-price, re-mount the current step.
    pub async fn change_language(&mut self, translator: Arc<dyn Translate>) {
        self.lang = translator.lang().to_string();
        self.translator = translator;
        self.drafts.set_lang(&self.lang).await;
        self.draft.plan.refresh_price(&self.lang);
        let step = self.state.current();
        self.load_step(step).await;
    }

    /// Load the dictionaries for `lang` from the asset source and switch to it. Unsupported
    /// languages are ignored.
    pub async fn switch_language(&mut self, lang: &str) -> bool {
        if !crate::i18n::is_supported(lang) || lang == self.lang {
            return false;
        }
        let localizer = crate::i18n::Localizer::load(self.assets.as_ref(), lang).await;
        self.change_language(Arc::new(localizer)).await;
        true
    }
}

pub fn thanks_url(lang: &str) -> String {
    format!("/thanks.html?lang={}", lang)
}

pub fn fail_url(lang: &str) -> String {
    format!("/fail.html?resume=true&lang={}", lang)
}
