// API request models
// Body of `POST {api_base}/orders/`

use serde::{Deserialize, Serialize};

use super::draft::{ActivityLevel, EnergyUnit, FormDraft, PlanPeriod, PlanVariant, Sex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub name: String,
    pub email: String,
    pub locale: String,
    pub plan_variant: Option<PlanVariant>,
    pub plan_period: Option<PlanPeriod>,
    pub energy_unit: EnergyUnit,
    pub bmr_kcal: Option<f64>,
    pub sex: Option<Sex>,
    pub age: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity: Option<ActivityLevel>,
    /// Full draft snapshot (BMR already normalized).
    pub params: FormDraft,
}

impl OrderRequest {
    /// Build the order body from a draft.
    ///
    /// The submitted BMR is the effective one (override wins over computed), and the
    /// override field itself is dropped from the snapshot sent as `params`.
    pub fn from_draft(draft: &FormDraft, locale: &str) -> Self {
        let mut params = draft.clone();
        params.goal.bmr_kcal = params.goal.effective_bmr_kcal();
        params.goal.bmr_override = None;

        let profile = &params.profile;
        Self {
            name: params.customer.name.trim().to_string(),
            email: params.customer.email.trim().to_string(),
            locale: locale.to_string(),
            plan_variant: params.plan.variant,
            plan_period: params.plan.period,
            energy_unit: params.goal.energy_unit,
            bmr_kcal: params.goal.bmr_kcal,
            sex: profile.sex,
            age: profile.age.as_ref().and_then(|v| v.value()),
            height_cm: profile.height_cm.as_ref().and_then(|v| v.value()),
            weight_kg: profile.weight_kg.as_ref().and_then(|v| v.value()),
            activity: profile.activity,
            params,
        }
    }
}
