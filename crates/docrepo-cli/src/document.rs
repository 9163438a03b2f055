use docrepo_repository::{DocumentReference, Entity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schemaless entity: the document body as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonDocument {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    reference: Option<DocumentReference>,
}

impl JsonDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            reference: None,
        }
    }

    /// Body plus an `"id"` key when the document has been stored.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(id) = self.id() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        object.extend(self.fields.clone());
        Value::Object(object)
    }
}

impl Entity for JsonDocument {
    fn reference(&self) -> Option<&DocumentReference> {
        self.reference.as_ref()
    }

    fn set_reference(&mut self, reference: DocumentReference) {
        self.reference = Some(reference);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference(id: &str) -> DocumentReference {
        serde_json::from_value(json!({ "collection_path": "notes", "id": id })).unwrap()
    }

    #[test]
    fn test_body_excludes_reference() {
        let mut doc: JsonDocument = serde_json::from_value(json!({"title": "hi"})).unwrap();
        doc.set_reference(reference("n1"));

        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"title": "hi"}));
        assert_eq!(doc.to_json(), json!({"id": "n1", "title": "hi"}));
    }

    #[test]
    fn test_unstored_has_no_id() {
        let doc = JsonDocument::default();
        assert_eq!(doc.to_json(), json!({}));
    }
}
