mod blueprint;

pub use blueprint::SequenceBlueprint;

use serde::{Deserialize, Serialize};

use super::domain::{Lead, SequenceKind};

/// Outcome of a send-step operation. `AlreadySent` signals an idempotent
/// no-op: the step was delivered by an earlier attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Sent {
        step: u32,
        next_step: Option<u32>,
        sequence_completed: bool,
    },
    AlreadySent {
        step: u32,
    },
}

/// Template substitution for a step's email. Content generation is
/// deliberately thin; delivery mechanics belong to the contact channel.
pub fn compose_step_email(kind: SequenceKind, step: u32, lead: &Lead) -> (String, String) {
    let first_name = lead.first_name.as_deref().unwrap_or("there");
    let company = lead.company.as_deref().unwrap_or("your company");
    let industry = lead.industry.as_deref().unwrap_or("your industry");

    let subject = match (kind, step) {
        (SequenceKind::BasicNurture, 1) => {
            format!("{first_name}, quick question about {company}")
        }
        (SequenceKind::BasicNurture, 2) => {
            format!("{first_name}, did you see this {industry} case study?")
        }
        (SequenceKind::BasicNurture, _) => format!("Last chance, {first_name} ({company})"),
        (SequenceKind::AdvancedNurture, 1) => {
            format!("{first_name}, {industry} breakthrough (2-min read)")
        }
        (SequenceKind::AdvancedNurture, 2) => {
            format!("{first_name}, your competitors are doing this...")
        }
        (SequenceKind::AdvancedNurture, _) => {
            format!("Follow-up {step} for {company}")
        }
        (SequenceKind::PremiumNurture | SequenceKind::CustomNurture, 1) => {
            format!("{company} competitive intelligence")
        }
        (SequenceKind::PremiumNurture | SequenceKind::CustomNurture, _) => {
            format!("{first_name}, market opportunity update ({step})")
        }
    };

    let body = format!(
        "Hi {first_name},\n\nWe have been looking at how {industry} teams like {company} \
         generate qualified pipeline, and put together material for step {step} of this \
         series.\n\nWorth a look?\n\nBest,\nThe Outreach Team"
    );

    (subject, body)
}
