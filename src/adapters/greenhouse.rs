use crate::models::{ApplicationTask, Platform};

use super::{apply_url, ApplicantProfile, AutomationPlan, PlanStep, PlatformAdapter, PrepareError};

/// Greenhouse job boards: single-page form with separate first/last name
/// inputs and an anchored application section.
pub struct GreenhouseAdapter;

impl PlatformAdapter for GreenhouseAdapter {
    fn platform(&self) -> Platform {
        Platform::Greenhouse
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("greenhouse.io")
    }

    fn prepare(&self, task: &ApplicationTask) -> Result<AutomationPlan, PrepareError> {
        let profile = ApplicantProfile::from_task(task)?;
        let mut url = apply_url(task)?;
        // The application form lives under the #app anchor on board pages.
        if !url.contains("#app") {
            url.push_str("#app");
        }

        let (first, last) = profile.split_name();
        let mut steps = vec![
            PlanStep::Fill {
                selector: "#first_name".to_string(),
                value: first.to_string(),
            },
            PlanStep::Fill {
                selector: "#last_name".to_string(),
                value: last.to_string(),
            },
            PlanStep::Fill {
                selector: "#email".to_string(),
                value: profile.email.clone(),
            },
        ];
        if let Some(phone) = &profile.phone {
            steps.push(PlanStep::Fill {
                selector: "#phone".to_string(),
                value: phone.clone(),
            });
        }
        if let Some(resume_url) = &profile.resume_url {
            steps.push(PlanStep::Fill {
                selector: "input#resume_url".to_string(),
                value: resume_url.clone(),
            });
        }
        if let Some(cover) = &profile.cover_letter {
            steps.push(PlanStep::Fill {
                selector: "textarea#cover_letter_text".to_string(),
                value: cover.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests_support::task_with;
    use serde_json::json;

    #[test]
    fn plan_splits_name_and_anchors_url() {
        let task = task_with(
            json!({ "apply_url": "https://boards.greenhouse.io/acme/jobs/1" }),
            json!({ "full_name": "Ada Lovelace", "email": "ada@example.com" }),
        );
        let plan = GreenhouseAdapter.prepare(&task).unwrap();
        assert!(plan.apply_url.ends_with("#app"));
        assert!(matches!(
            &plan.steps[0],
            PlanStep::Fill { selector, value } if selector == "#first_name" && value == "Ada"
        ));
        assert!(matches!(
            &plan.steps[1],
            PlanStep::Fill { selector, value } if selector == "#last_name" && value == "Lovelace"
        ));
        assert!(matches!(plan.steps.last(), Some(PlanStep::Submit)));
    }

    #[test]
    fn prepare_rejects_missing_email() {
        let task = task_with(
            json!({ "apply_url": "https://boards.greenhouse.io/acme/jobs/1" }),
            json!({ "full_name": "Ada Lovelace" }),
        );
        assert!(GreenhouseAdapter.prepare(&task).is_err());
    }
}
