//! JSON:API request documents sent to Target.

use serde_json::{json, Value};

/// i18n format every synced resource is created with.
pub const RESOURCE_FORMAT: &str = "KEYVALUEJSON";

pub fn create_resource(project_id: &str, slug: &str, name: &str) -> Value {
    json!({
        "data": {
            "type": "resources",
            "attributes": { "slug": slug, "name": name },
            "relationships": {
                "project": { "data": { "type": "projects", "id": project_id } },
                "i18n_format": { "data": { "type": "i18n_formats", "id": RESOURCE_FORMAT } }
            }
        }
    })
}

pub fn rename_resource(resource_id: &str, name: &str) -> Value {
    json!({
        "data": {
            "type": "resources",
            "id": resource_id,
            "attributes": { "name": name }
        }
    })
}

/// `content` is the already JSON-encoded key/value map.
pub fn strings_upload(resource_id: &str, content: &str) -> Value {
    json!({
        "data": {
            "type": "resource_strings_async_uploads",
            "attributes": { "content": content, "content_encoding": "text" },
            "relationships": {
                "resource": { "data": { "type": "resources", "id": resource_id } }
            }
        }
    })
}

pub fn tmx_export(project_id: &str) -> Value {
    json!({
        "data": {
            "type": "tmx_async_downloads",
            "relationships": {
                "project": { "data": { "type": "projects", "id": project_id } }
            }
        }
    })
}
