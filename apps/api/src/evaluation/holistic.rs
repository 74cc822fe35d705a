//! Holistic context: the shared reading of an applicant that every analyzer
//! receives read-only. Produced upstream of the dimension stage.

use async_trait::async_trait;

use crate::models::context::HolisticContext;
use crate::models::profile::ApplicantProfile;

/// Upstream stage that produces the holistic context for a profile.
#[async_trait]
pub trait HolisticContextProvider: Send + Sync {
    async fn context_for(&self, profile: &ApplicantProfile) -> HolisticContext;
}

/// Deterministic provider that derives context from profile flags alone.
pub struct DerivedContextProvider;

#[async_trait]
impl HolisticContextProvider for DerivedContextProvider {
    async fn context_for(&self, profile: &ApplicantProfile) -> HolisticContext {
        derive_context(profile)
    }
}

pub fn derive_context(profile: &ApplicantProfile) -> HolisticContext {
    let major = profile
        .goals
        .intended_major
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let anchor = profile
        .activities
        .iter()
        .max_by(|a, b| a.total_hours().total_cmp(&b.total_hours()));

    let narrative_thread = match (major, anchor) {
        (Some(major), Some(activity)) => format!(
            "Aspiring {major} student whose most sustained commitment is {}",
            activity.name
        ),
        (Some(major), None) => format!("Aspiring {major} student without listed activities"),
        (None, Some(activity)) => format!(
            "Undeclared student whose most sustained commitment is {}",
            activity.name
        ),
        (None, None) => "Profile without a declared direction or listed activities".to_string(),
    };

    let ctx = &profile.context;
    let mut context_adjustments = Vec::new();
    if ctx.first_generation {
        context_adjustments.push(
            "First-generation applicant: read achievements against limited family guidance."
                .to_string(),
        );
    }
    if ctx.low_income {
        context_adjustments.push(
            "Low-income household: paid work and limited enrichment are context, not gaps."
                .to_string(),
        );
    }
    if ctx.under_resourced_school {
        context_adjustments.push(
            "Under-resourced school: judge rigor against what the school offers.".to_string(),
        );
    }
    if ctx.family_responsibilities {
        context_adjustments.push(match ctx.family_responsibility_hours {
            Some(hours) => format!(
                "Family responsibilities of about {hours:.0} hours per week limit time for activities."
            ),
            None => "Family responsibilities limit time for activities.".to_string(),
        });
    }
    if let Some(info) = ctx.additional_info.as_deref().map(str::trim) {
        if !info.is_empty() {
            context_adjustments.push(format!("Applicant note: {info}"));
        }
    }

    let mut preliminary_red_flags = Vec::new();
    if profile.written_essays().next().is_none() {
        preliminary_red_flags.push("No essays submitted".to_string());
    }
    if profile.academic.gpa_unweighted.is_none() && profile.academic.gpa_weighted.is_none() {
        preliminary_red_flags.push("No GPA reported".to_string());
    }
    if profile.activities.is_empty() {
        preliminary_red_flags.push("No activities listed".to_string());
    }

    HolisticContext {
        narrative_thread,
        context_adjustments,
        preliminary_red_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::fixtures::{strong_profile, struggling_profile};

    #[tokio::test]
    async fn test_strong_profile_thread_names_major_and_anchor() {
        let context = DerivedContextProvider.context_for(&strong_profile()).await;
        assert_eq!(
            context.narrative_thread,
            "Aspiring Computer Science student whose most sustained commitment is Robotics Team"
        );
        assert!(context.context_adjustments.is_empty());
        assert!(context.preliminary_red_flags.is_empty());
    }

    #[test]
    fn test_circumstances_become_adjustments() {
        let mut profile = struggling_profile();
        profile.context.first_generation = true;
        profile.context.under_resourced_school = true;
        profile.context.family_responsibilities = true;
        profile.context.family_responsibility_hours = Some(15.0);
        profile.context.additional_info = Some("  ".to_string());

        let context = derive_context(&profile);
        assert_eq!(context.context_adjustments.len(), 3);
        assert!(context.context_adjustments[2].contains("15 hours"));
        assert_eq!(
            context.preliminary_red_flags,
            vec!["No essays submitted".to_string(), "No activities listed".to_string()]
        );
    }
}
