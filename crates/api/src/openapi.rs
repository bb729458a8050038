//! OpenAPI contract document.
//!
//! Served as plain JSON on `GET /openapi.json`; rendering a UI for it is out
//! of scope here.

use serde_json::{json, Value};

pub fn document() -> serde_json::Result<Value> {
    serde_json::to_value(json!({
        "openapi": "3.0.3",
        "info": {
            "title": "railview scope API",
            "description": "Viewport scope provisioning and scoped train-frame retrieval.",
            "version": "1.0.0"
        },
        "paths": {
            "/api/v1/trains/scopes": {
                "post": {
                    "summary": "Provision (or refresh) a viewport scope",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/ViewportRequest" }
                            }
                        }
                    },
                    "responses": {
                        "200": { "description": "Scope already had a frame", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ScopeResponse" } } } },
                        "201": { "description": "Scope provisioned with an empty frame", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ScopeResponse" } } } },
                        "400": { "description": "Invalid viewport request", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } } }
                    }
                },
                "get": {
                    "summary": "List active scope definitions",
                    "responses": {
                        "200": { "description": "Active scopes", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ScopeListResponse" } } } }
                    }
                }
            },
            "/api/v1/trains": {
                "get": {
                    "summary": "Latest frame for a scope",
                    "parameters": [{
                        "name": "scope",
                        "in": "query",
                        "required": true,
                        "schema": { "type": "string", "minLength": 1, "maxLength": 256 }
                    }],
                    "responses": {
                        "200": { "description": "Latest frame", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/FrameResponse" } } } },
                        "400": { "description": "Missing or invalid scope parameter", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } } },
                        "404": { "description": "Scope not found", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } } }
                    }
                }
            },
            "/healthz": {
                "get": {
                    "summary": "Liveness probe",
                    "responses": { "200": { "description": "Service is up" } }
                }
            },
            "/metrics": {
                "get": {
                    "summary": "Prometheus text exposition",
                    "responses": { "200": { "description": "Metrics snapshot" } }
                }
            }
        },
        "components": {
            "schemas": {
                "Coordinate": {
                    "type": "object",
                    "required": ["lat", "lng"],
                    "properties": {
                        "lat": { "type": "number", "minimum": -90, "maximum": 90 },
                        "lng": { "type": "number", "minimum": -180, "maximum": 180 }
                    }
                },
                "BBox": {
                    "type": "object",
                    "required": ["south", "west", "north", "east"],
                    "properties": {
                        "south": { "type": "number" },
                        "west": { "type": "number" },
                        "north": { "type": "number" },
                        "east": { "type": "number" },
                        "zoom": { "type": "integer", "minimum": 0, "maximum": 22 }
                    }
                },
                "VehiclePosition": {
                    "type": "object",
                    "required": ["id", "coordinate", "updatedAt"],
                    "properties": {
                        "id": { "type": "string" },
                        "coordinate": { "$ref": "#/components/schemas/Coordinate" },
                        "updatedAt": { "type": "string", "format": "date-time" },
                        "tripId": { "type": "string" },
                        "routeId": { "type": "string" },
                        "bearing": { "type": "number", "minimum": 0, "exclusiveMaximum": 360 },
                        "speedMps": { "type": "number", "minimum": 0 },
                        "status": { "type": "string", "enum": ["in_service", "out_of_service", "layover", "deadhead"] }
                    }
                },
                "ScopedTrainsFrame": {
                    "type": "object",
                    "required": ["scopeId", "bbox", "cityId", "at", "vehicles"],
                    "properties": {
                        "scopeId": { "type": "string" },
                        "bbox": { "$ref": "#/components/schemas/BBox" },
                        "cityId": { "type": "string" },
                        "at": { "type": "string", "format": "date-time" },
                        "checksum": { "type": "string" },
                        "vehicles": { "type": "array", "items": { "$ref": "#/components/schemas/VehiclePosition" } }
                    }
                },
                "ViewportRequest": {
                    "type": "object",
                    "required": ["cityId", "bbox"],
                    "properties": {
                        "cityId": { "type": "string", "minLength": 1 },
                        "bbox": { "$ref": "#/components/schemas/BBox" },
                        "externalScopeKey": { "type": "string", "minLength": 1, "maxLength": 256 }
                    }
                },
                "ScopeResponse": {
                    "type": "object",
                    "required": ["ok", "scopeId", "frame"],
                    "properties": {
                        "ok": { "type": "boolean" },
                        "scopeId": { "type": "string" },
                        "frame": { "$ref": "#/components/schemas/ScopedTrainsFrame" }
                    }
                },
                "FrameResponse": {
                    "type": "object",
                    "required": ["ok", "frame"],
                    "properties": {
                        "ok": { "type": "boolean" },
                        "frame": { "$ref": "#/components/schemas/ScopedTrainsFrame" }
                    }
                },
                "ScopeListResponse": {
                    "type": "object",
                    "required": ["ok", "count", "scopes"],
                    "properties": {
                        "ok": { "type": "boolean" },
                        "count": { "type": "integer" },
                        "scopes": { "type": "array", "items": { "type": "object" } }
                    }
                },
                "ErrorResponse": {
                    "type": "object",
                    "required": ["ok", "error"],
                    "properties": {
                        "ok": { "type": "boolean", "enum": [false] },
                        "error": { "type": "string" },
                        "details": {}
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_renders_and_names_every_endpoint() {
        let doc = document().unwrap();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/v1/trains/scopes"));
        assert!(paths.contains_key("/api/v1/trains"));
        assert!(paths.contains_key("/healthz"));
        assert!(paths.contains_key("/metrics"));
    }
}
