use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;

/// EvaluationContext describes the entity a flag is being evaluated for.
///
/// The entity id drives rollout bucketing and distribution selection; the property map is what
/// segment constraints are matched against. A context without any property map never matches a
/// segment that has constraints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    #[serde(rename = "entityID", default)]
    pub(crate) entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) entity_context: Option<HashMap<String, AttributeValue>>,
}

impl EvaluationContext {
    /// Creates a context for `entity_id` with no type and no property map.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type: None,
            entity_context: None,
        }
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Sets a single property, creating the property map if needed.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.entity_context
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replaces the whole property map. An empty map is still a map: constraints are evaluated
    /// against it (and fail on missing properties) rather than failing closed up front.
    pub fn with_properties(mut self, properties: HashMap<String, AttributeValue>) -> Self {
        self.entity_context = Some(properties);
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn has_properties(&self) -> bool {
        self.entity_context.is_some()
    }

    pub fn property(&self, name: &str) -> Option<&AttributeValue> {
        self.entity_context.as_ref()?.get(name)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use spectral::prelude::*;

    #[test]
    fn builder_sets_properties() {
        let context = EvaluationContext::new("user-1")
            .with_entity_type("user")
            .with_property("country", "NZ")
            .with_property("age", 42_i64);

        assert_that!(context.entity_id()).is_equal_to("user-1");
        assert_that!(context.entity_type()).contains_value("user");
        assert_that!(context.has_properties()).is_true();
        assert_that!(context.property("country")).contains_value(&AttributeValue::from("NZ"));
        assert_that!(context.property("missing")).is_none();
    }

    #[test]
    fn context_without_properties() {
        let context = EvaluationContext::new("user-1");
        assert_that!(context.has_properties()).is_false();
        assert_that!(context.property("anything")).is_none();
    }

    #[test]
    fn parses_wire_shape() {
        let context: EvaluationContext = serde_json::from_str(
            r#"{"entityID": "e1", "entityType": "device", "entityContext": {"os": "ios", "build": 12, "beta": true}}"#,
        )
        .unwrap();

        assert_eq!(
            context,
            EvaluationContext::new("e1")
                .with_entity_type("device")
                .with_properties(hashmap! {
                    "os".to_string() => AttributeValue::from("ios"),
                    "build".to_string() => AttributeValue::Number(12.0),
                    "beta".to_string() => AttributeValue::Bool(true),
                })
        );
    }
}
