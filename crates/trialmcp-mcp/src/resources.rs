use serde_json::{json, Value};

use trialmcp_core::{InsightStore, TrialError, TrialResult};

use crate::catalog::Catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

impl ResourceDescriptor {
    pub fn to_json(&self) -> Value {
        json!({
            "uri": self.uri,
            "name": self.name,
            "description": self.description,
            "mimeType": self.mime_type
        })
    }
}

pub fn resource_definitions(catalog: &Catalog) -> Value {
    json!({ "resources": [catalog.resource.to_json()] })
}

/// Contents payload for `resources/read`.
pub fn read_resource(catalog: &Catalog, insights: &InsightStore, uri: &str) -> TrialResult<Value> {
    let resource = &catalog.resource;
    if uri != resource.uri {
        return Err(TrialError::UnknownResource(uri.to_string()));
    }

    Ok(json!({
        "contents": [{
            "uri": resource.uri,
            "mimeType": resource.mime_type,
            "text": insights.render()
        }]
    }))
}
