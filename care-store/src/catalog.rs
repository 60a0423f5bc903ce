//! Read-only catalogs: facility shift formats and the ADL question list.

use async_trait::async_trait;
use std::collections::HashMap;

use care_model::{AdlQuestion, FacilityId, QuestionId, ShiftFormat, ShiftSet};

use crate::traits::StoreError;

/// Facility configuration lookup.
#[async_trait]
pub trait FacilityCatalog: Send + Sync {
    /// The facility's shift format, if the facility is known.
    async fn shift_format(&self, facility_id: FacilityId) -> Result<Option<ShiftFormat>, StoreError>;

    /// Shift set for a facility. Unknown facilities get the 3-shift default.
    async fn shift_set(&self, facility_id: FacilityId) -> Result<ShiftSet, StoreError> {
        Ok(self
            .shift_format(facility_id)
            .await?
            .map(ShiftSet::for_format)
            .unwrap_or_default())
    }
}

/// The ADL question catalog.
#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    async fn questions(&self) -> Result<Vec<AdlQuestion>, StoreError>;
}

/// Fixed catalog built up front.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    facilities: HashMap<FacilityId, ShiftFormat>,
    questions: Vec<AdlQuestion>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facility(mut self, facility_id: FacilityId, format: ShiftFormat) -> Self {
        self.facilities.insert(facility_id, format);
        self
    }

    /// Add a question; its category is inferred from the text.
    pub fn with_question(mut self, id: QuestionId, text: impl Into<String>) -> Self {
        self.questions.retain(|q| q.id != id);
        self.questions.push(AdlQuestion::new(id, text));
        self
    }
}

#[async_trait]
impl FacilityCatalog for StaticCatalog {
    async fn shift_format(&self, facility_id: FacilityId) -> Result<Option<ShiftFormat>, StoreError> {
        Ok(self.facilities.get(&facility_id).copied())
    }
}

#[async_trait]
impl QuestionCatalog for StaticCatalog {
    async fn questions(&self) -> Result<Vec<AdlQuestion>, StoreError> {
        let mut questions = self.questions.clone();
        questions.sort_by_key(|q| q.id);
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use care_model::{AdlCategory, Shift};

    #[test]
    fn test_shift_set_lookup() {
        let catalog = StaticCatalog::new().with_facility(7, ShiftFormat::TwoShift);

        let two = tokio_test::block_on(catalog.shift_set(7)).unwrap();
        assert!(!two.contains(Shift::Swing));
        assert_eq!(two.len(), 2);

        let unknown = tokio_test::block_on(catalog.shift_set(8)).unwrap();
        assert_eq!(unknown, ShiftSet::three_shift());
    }

    #[tokio::test]
    async fn test_questions_sorted_and_categorised() {
        let catalog = StaticCatalog::new()
            .with_question(2, "Medication administration")
            .with_question(1, "Bathing assistance")
            .with_question(2, "Medication reminders");

        let questions = catalog.questions().await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].category, AdlCategory::PersonalCare);
        assert_eq!(questions[1].text, "Medication reminders");
        assert_eq!(questions[1].category, AdlCategory::MedicalMedication);
    }
}
