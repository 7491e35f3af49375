use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// Taleo career sections: legacy markup rendered inside a content iframe,
/// so every selector is scoped under the frame.
pub struct TaleoAdapter;

const FRAME: &str = "iframe#careersectioniframe ";

impl PlatformAdapter for TaleoAdapter {
    fn platform(&self) -> Platform {
        Platform::Taleo
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("taleo.net")
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let url = apply_url(task)?;
        let (first, last) = profile.split_name();

        let mut steps = vec![
            PlanStep::Fill {
                selector: format!("{FRAME}input[name='firstName']"),
                value: first.to_string(),
            },
            PlanStep::Fill {
                selector: format!("{FRAME}input[name='lastName']"),
                value: last.to_string(),
            },
            PlanStep::Fill {
                selector: format!("{FRAME}input[name='emailAddress']"),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: format!("{FRAME}input[name='phoneNumber']"),
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
