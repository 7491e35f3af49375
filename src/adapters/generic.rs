use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// Fallback for postings with no recognized ATS signature: heuristic
/// selectors that match the common shapes of standalone career forms.
pub struct GenericAdapter;

impl PlatformAdapter for GenericAdapter {
    fn platform(&self) -> Platform {
        Platform::Generic
    }

    fn matches(&self, _url: &str) -> bool {
        // Fallback only; the registry routes unmatched URLs here directly.
        false
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let url = apply_url(task)?;

        let mut steps = vec![
            PlanStep::Fill {
                selector: "input[name*='name' i]".to_string(),
                value: profile.full_name.clone(),
            },
            PlanStep::Fill {
                selector: "input[type='email'], input[name*='email' i]".to_string(),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: "input[type='tel'], input[name*='phone' i]".to_string(),
                value: phone.clone(),
            });
        }
        steps.push(PlanStep::Submit);

        Ok(AutomationPlan {
            apply_url: url,
            steps,
            manual_review_reason: None,
        })
    }
}
