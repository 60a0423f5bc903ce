//! ADL questions and keyword-based category inference.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::QuestionId;

/// Category of an ADL question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum AdlCategory {
    #[serde(rename = "Personal Care")]
    PersonalCare,
    #[serde(rename = "Mobility")]
    Mobility,
    #[serde(rename = "Behavioral/Cognitive")]
    BehavioralCognitive,
    #[serde(rename = "Medical/Medication")]
    MedicalMedication,
    #[serde(rename = "Documentation & Communication")]
    DocumentationCommunication,
    #[serde(rename = "Other")]
    Other,
}

impl AdlCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalCare => "Personal Care",
            Self::Mobility => "Mobility",
            Self::BehavioralCognitive => "Behavioral/Cognitive",
            Self::MedicalMedication => "Medical/Medication",
            Self::DocumentationCommunication => "Documentation & Communication",
            Self::Other => "Other",
        }
    }

    /// Infer a category from question text.
    ///
    /// Rules are tried in [`CATEGORY_RULES`] order and the first match wins,
    /// so "assist with medication while dressing" is Personal Care.
    pub fn infer(text: &str) -> Self {
        let lowered = text.to_lowercase();
        CATEGORY_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(*k)))
            .map(|(category, _)| *category)
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for AdlCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered rule table. Order is significant: a question matching several
/// keyword sets takes the earliest category.
pub const CATEGORY_RULES: [(AdlCategory, &[&str]); 5] = [
    (
        AdlCategory::PersonalCare,
        &[
            "bath", "shower", "dress", "groom", "hygiene", "toilet", "continence", "oral care",
            "shave", "hair care", "nail care", "eating", "feed", "meal",
        ],
    ),
    (
        AdlCategory::Mobility,
        &[
            "transfer", "ambulat", "walk", "mobility", "wheelchair", "reposition", "turning",
            "lift", "fall",
        ],
    ),
    (
        AdlCategory::BehavioralCognitive,
        &[
            "behavio", "cognit", "redirect", "wander", "dementia", "memory", "agitat", "anxiety",
            "orient",
        ],
    ),
    (
        AdlCategory::MedicalMedication,
        &[
            "medicat", "medical", "insulin", "vital", "blood", "wound", "treatment", "oxygen",
            "injection", "glucose",
        ],
    ),
    (
        AdlCategory::DocumentationCommunication,
        &["document", "chart", "communicat", "report", "notify", "family", "notes"],
    ),
];

/// A care activity tracked per resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AdlQuestion {
    pub id: QuestionId,
    pub text: String,
    pub category: AdlCategory,
}

impl AdlQuestion {
    /// Create a question with its category inferred from the text.
    pub fn new(id: QuestionId, text: impl Into<String>) -> Self {
        let text = text.into();
        let category = AdlCategory::infer(&text);
        Self { id, text, category }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_each_category() {
        assert_eq!(AdlCategory::infer("Assist with showering"), AdlCategory::PersonalCare);
        assert_eq!(AdlCategory::infer("Two-person TRANSFER"), AdlCategory::Mobility);
        assert_eq!(AdlCategory::infer("Redirect when wandering"), AdlCategory::BehavioralCognitive);
        assert_eq!(AdlCategory::infer("Administer insulin"), AdlCategory::MedicalMedication);
        assert_eq!(AdlCategory::infer("Chart progress notes"), AdlCategory::DocumentationCommunication);
        assert_eq!(AdlCategory::infer("Laundry"), AdlCategory::Other);
    }

    #[test]
    fn test_first_rule_wins() {
        // Matches Personal Care ("dress") and Medical ("medicat")
        assert_eq!(
            AdlCategory::infer("Apply medicated cream while dressing"),
            AdlCategory::PersonalCare
        );
        // Matches Mobility ("walk") and Documentation ("report")
        assert_eq!(AdlCategory::infer("Report walking distance"), AdlCategory::Mobility);
    }

    #[test]
    fn test_question_new_infers() {
        let q = AdlQuestion::new(7, "Vital signs check");
        assert_eq!(q.category, AdlCategory::MedicalMedication);
        assert_eq!(
            serde_json::to_value(q.category).unwrap(),
            serde_json::json!("Medical/Medication")
        );
    }
}
