// Draft persistence
//
// The draft survives reloads and failed checkouts under fixed storage keys:
//   formState      draft JSON plus `locale` (and `order_id` once an order exists)
//   formStep       zero-based index of the step the user was on
//   lang           explicitly chosen UI language
//   cookieConsent  cookie banner choice
//
// Writes never fail the caller: a draft that cannot be saved is logged and the wizard keeps
// going.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::store::KeyValueStore;
use crate::models::draft::FormDraft;
use crate::wizard::steps::Step;

pub const FORM_STATE_KEY: &str = "formState";
pub const FORM_STEP_KEY: &str = "formStep";
pub const LANG_KEY: &str = "lang";
pub const COOKIE_CONSENT_KEY: &str = "cookieConsent";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedDraft {
    #[serde(flatten)]
    draft: FormDraft,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
}

/// What `load` found in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    pub draft: FormDraft,
    pub locale: Option<String>,
    /// Raw persisted step index; `None` when missing or unparsable.
    pub step: Option<i64>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieChoice {
    Accepted,
    Declined,
    Dismissed,
}

#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist the draft and the current step. Failures are logged, never returned.
    pub async fn save(&self, draft: &FormDraft, step: Step, lang: &str) {
        self.write(draft, step, lang, None).await;
    }

    /// Persist the draft together with the id of the order created from it.
    pub async fn save_submitted(&self, draft: &FormDraft, step: Step, lang: &str, order_id: &str) {
        self.write(draft, step, lang, Some(order_id)).await;
    }

    async fn write(&self, draft: &FormDraft, step: Step, lang: &str, order_id: Option<&str>) {
        let persisted = PersistedDraft {
            draft: draft.clone(),
            locale: Some(lang.to_string()),
            order_id: order_id.map(str::to_string),
        };

        let json = match serde_json::to_string(&persisted) {
            Ok(json) => json,
            Err(e) => {
                warn!(
                    "[PHASE: persistence] [STEP: save] Draft serialization failed: {}",
                    e
                );
                return;
            }
        };

        if let Err(e) = self.store.set(FORM_STATE_KEY, &json).await {
            warn!("[PHASE: persistence] [STEP: save] Draft save failed: {:#}", e);
            return;
        }
        if let Err(e) = self
            .store
            .set(FORM_STEP_KEY, &step.index().to_string())
            .await
        {
            warn!("[PHASE: persistence] [STEP: save] Step save failed: {:#}", e);
            return;
        }
        debug!(
            "[PHASE: persistence] [STEP: save] Draft saved at step {}",
            step.number()
        );
    }

    /// Stored draft, or `None` when absent, unreadable or corrupt.
    pub async fn load(&self) -> Option<DraftSnapshot> {
        let raw = match self.store.get(FORM_STATE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("[PHASE: persistence] [STEP: load] Draft read failed: {:#}", e);
                return None;
            }
        };

        let persisted: PersistedDraft = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "[PHASE: persistence] [STEP: load] Stored draft is corrupt, ignoring: {}",
                    e
                );
                return None;
            }
        };

        let step = match self.store.get(FORM_STEP_KEY).await {
            Ok(Some(s)) => s.trim().parse::<i64>().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("[PHASE: persistence] [STEP: load] Step read failed: {:#}", e);
                None
            }
        };

        Some(DraftSnapshot {
            draft: persisted.draft,
            locale: persisted.locale,
            step,
            order_id: persisted.order_id,
        })
    }

    /// Forget the draft (after a completed checkout or an explicit restart).
    pub async fn clear(&self) {
        for key in [FORM_STATE_KEY, FORM_STEP_KEY] {
            if let Err(e) = self.store.remove(key).await {
                warn!("[PHASE: persistence] [STEP: clear] Failed to remove {}: {:#}", key, e);
            }
        }
    }

    pub async fn stored_lang(&self) -> Option<String> {
        self.store
            .get(LANG_KEY)
            .await
            .ok()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub async fn set_lang(&self, lang: &str) {
        if let Err(e) = self.store.set(LANG_KEY, lang).await {
            warn!("[PHASE: persistence] [STEP: lang] Language save failed: {:#}", e);
        }
    }

    pub async fn cookie_choice(&self) -> Option<CookieChoice> {
        let raw = self.store.get(COOKIE_CONSENT_KEY).await.ok().flatten()?;
        serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
    }

    pub async fn set_cookie_choice(&self, choice: CookieChoice) {
        let value = match choice {
            CookieChoice::Accepted => "accepted",
            CookieChoice::Declined => "declined",
            CookieChoice::Dismissed => "dismissed",
        };
        if let Err(e) = self.store.set(COOKIE_CONSENT_KEY, value).await {
            warn!(
                "[PHASE: persistence] [STEP: cookies] Cookie choice save failed: {:#}",
                e
            );
        }
    }
}
