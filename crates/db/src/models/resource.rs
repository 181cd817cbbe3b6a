//! Row model for the `resource_versions` table.

use atelier_core::resource::{Availability, ModelType, Resource, StrengthSettings};
use atelier_core::types::DbId;
use sqlx::FromRow;

/// A row from the `resource_versions` table.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: DbId,
    pub model_id: DbId,
    pub name: String,
    pub model_type: String,
    pub base_model: String,
    pub trained_words: Vec<String>,
    pub covered: bool,
    pub availability: String,
    pub poi: bool,
    pub min_strength: Option<f64>,
    pub max_strength: Option<f64>,
}

impl ResourceRow {
    /// Convert into the domain resource used by the resolver cache.
    pub fn into_domain(self) -> Resource {
        let settings = match (self.min_strength, self.max_strength) {
            (Some(min_strength), Some(max_strength)) => Some(StrengthSettings {
                min_strength,
                max_strength,
            }),
            _ => None,
        };
        Resource {
            id: self.id,
            model_id: self.model_id,
            name: self.name,
            model_type: ModelType::from_str(&self.model_type),
            base_model: self.base_model,
            trained_words: self.trained_words,
            covered: self.covered,
            availability: Availability::from_str(&self.availability),
            poi: self.poi,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_maps_into_domain_resource() {
        let row = ResourceRow {
            id: 7,
            model_id: 3,
            name: "Dreamscape".into(),
            model_type: "checkpoint".into(),
            base_model: "SD1".into(),
            trained_words: vec!["dreamscape".into()],
            covered: true,
            availability: "public".into(),
            poi: false,
            min_strength: None,
            max_strength: None,
        };
        let resource = row.into_domain();
        assert_eq!(resource.model_type, ModelType::Checkpoint);
        assert_eq!(resource.availability, Availability::Public);
        assert!(resource.settings.is_none());
    }

    #[test]
    fn partial_strength_bounds_yield_no_settings() {
        let row = ResourceRow {
            id: 7,
            model_id: 3,
            name: "Style".into(),
            model_type: "lora".into(),
            base_model: "SD1".into(),
            trained_words: vec![],
            covered: true,
            availability: "public".into(),
            poi: false,
            min_strength: Some(-1.0),
            max_strength: None,
        };
        assert!(row.into_domain().settings.is_none());
    }
}
