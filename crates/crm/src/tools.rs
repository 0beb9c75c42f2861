//! Agent-facing CRM tools. Every tool shares one session, reports failures
//! as `Error ...` strings, and shapes its payload before returning so a
//! single SOQL query cannot flood the model context.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use switchboard_agent::tool::{parse_arguments, Tool};

use crate::session::{ensure_query_limit, limit_query_records, truncate_response, CrmSession};

/// All CRM tools bound to one shared session, in registration order.
pub fn crm_toolset(session: Arc<CrmSession>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(RunSoqlQuery { session: Arc::clone(&session) }),
        Arc::new(RunSoslSearch { session: Arc::clone(&session) }),
        Arc::new(GetObjectFields { session: Arc::clone(&session) }),
        Arc::new(GetRecord { session: Arc::clone(&session) }),
        Arc::new(Restful { session: Arc::clone(&session) }),
        Arc::new(CreateRecord { session: Arc::clone(&session) }),
        Arc::new(UpdateRecord { session: Arc::clone(&session) }),
        Arc::new(DeleteRecord { session: Arc::clone(&session) }),
        Arc::new(ToolingExecute { session: Arc::clone(&session) }),
        Arc::new(ApexExecute { session }),
    ]
}

fn shape_json(value: &Value, max_bytes: usize) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(serialized) => truncate_response(&serialized, max_bytes),
        Err(error) => format!("Error: failed to serialize response: {error}"),
    }
}

pub struct RunSoqlQuery {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for RunSoqlQuery {
    fn name(&self) -> &'static str {
        "runSoqlQuery"
    }

    fn description(&self) -> &'static str {
        "Use this function to run a SOQL query against Salesforce"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The SOQL query to execute" },
                "maxRecords": { "type": "integer", "description": "Maximum number of records to return (defaults to the configured cap)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            query: String,
            #[serde(rename = "maxRecords")]
            max_records: Option<usize>,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        let max_records = params.max_records.unwrap_or_else(|| self.session.max_records());
        let query = ensure_query_limit(&params.query, max_records);
        match self.session.query(&query).await {
            Ok(response) => {
                let capped = limit_query_records(response, max_records);
                format!(
                    "SOQL Query Results (JSON):\n{}",
                    shape_json(&capped, self.session.max_response_bytes())
                )
            }
            Err(error) => format!("Error executing SOQL query: {error}"),
        }
    }
}

pub struct RunSoslSearch {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for RunSoslSearch {
    fn name(&self) -> &'static str {
        "runSoslSearch"
    }

    fn description(&self) -> &'static str {
        "Use this function to run a SOSL full-text search against Salesforce"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search": { "type": "string", "description": "The SOSL search to execute, e.g. 'FIND {Acme} IN ALL FIELDS'" },
                "maxRecords": { "type": "integer", "description": "Maximum number of records to return (defaults to the configured cap)" }
            },
            "required": ["search"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            search: String,
            #[serde(rename = "maxRecords")]
            max_records: Option<usize>,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        let max_records = params.max_records.unwrap_or_else(|| self.session.max_records());
        let search = ensure_query_limit(&params.search, max_records);
        match self.session.search(&search).await {
            Ok(response) => format!(
                "SOSL Search Results (JSON):\n{}",
                shape_json(&response, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error executing SOSL search: {error}"),
        }
    }
}

pub struct GetObjectFields {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for GetObjectFields {
    fn name(&self) -> &'static str {
        "getObjectFields"
    }

    fn description(&self) -> &'static str {
        "Use this function to list the fields of a Salesforce object"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "objectName": { "type": "string", "description": "The API name of the object, e.g. 'Account'" },
                "maxFields": { "type": "integer", "description": "Maximum number of fields to return (defaults to the configured cap)" }
            },
            "required": ["objectName"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "objectName")]
            object_name: String,
            #[serde(rename = "maxFields")]
            max_fields: Option<usize>,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        let max_fields = params.max_fields.unwrap_or_else(|| self.session.max_fields());
        match self.session.describe_fields(&params.object_name, max_fields).await {
            Ok(fields) => format!(
                "Object Fields (JSON):\n{}",
                shape_json(&fields, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error retrieving object fields: {error}"),
        }
    }
}

pub struct GetRecord {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for GetRecord {
    fn name(&self) -> &'static str {
        "getRecord"
    }

    fn description(&self) -> &'static str {
        "Use this function to retrieve a single Salesforce record by id"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "objectName": { "type": "string", "description": "The API name of the object" },
                "recordId": { "type": "string", "description": "The 15- or 18-character record id" }
            },
            "required": ["objectName", "recordId"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "objectName")]
            object_name: String,
            #[serde(rename = "recordId")]
            record_id: String,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        match self.session.retrieve(&params.object_name, &params.record_id).await {
            Ok(record) => format!(
                "Record Data (JSON):\n{}",
                shape_json(&record, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error retrieving record: {error}"),
        }
    }
}

pub struct Restful {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for Restful {
    fn name(&self) -> &'static str {
        "restful"
    }

    fn description(&self) -> &'static str {
        "Use this function to call an arbitrary Salesforce REST API path"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The REST path under the data API, e.g. '/limits'" },
                "method": { "type": "string", "description": "HTTP method: GET, POST, PATCH, PUT, or DELETE. Defaults to GET" },
                "params": { "type": "object", "description": "Optional query string parameters" },
                "body": { "type": "object", "description": "Optional JSON request body" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            method: Option<String>,
            params: Option<Map<String, Value>>,
            body: Option<Value>,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        let method = match params.method.as_deref().unwrap_or("GET").to_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PATCH" => Method::PATCH,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            other => return format!("Error executing REST API call: unsupported method {other}"),
        };
        let query: Vec<(String, String)> = params
            .params
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(inner) => inner,
                    other => other.to_string(),
                };
                (key, rendered)
            })
            .collect();

        match self
            .session
            .request(method, &params.path, &query, params.body.as_ref())
            .await
        {
            Ok(response) => format!(
                "REST API Response (JSON):\n{}",
                shape_json(&response, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error executing REST API call: {error}"),
        }
    }
}

pub struct CreateRecord {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for CreateRecord {
    fn name(&self) -> &'static str {
        "createRecord"
    }

    fn description(&self) -> &'static str {
        "Use this function to create a new Salesforce record"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "objectName": { "type": "string", "description": "The API name of the object" },
                "fields": { "type": "object", "description": "Field values for the new record" }
            },
            "required": ["objectName", "fields"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "objectName")]
            object_name: String,
            fields: Value,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        match self.session.create(&params.object_name, &params.fields).await {
            Ok(response) => format!(
                "Record Created (JSON):\n{}",
                shape_json(&response, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error creating record: {error}"),
        }
    }
}

pub struct UpdateRecord {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for UpdateRecord {
    fn name(&self) -> &'static str {
        "updateRecord"
    }

    fn description(&self) -> &'static str {
        "Use this function to update fields on an existing Salesforce record"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "objectName": { "type": "string", "description": "The API name of the object" },
                "recordId": { "type": "string", "description": "The id of the record to update" },
                "fields": { "type": "object", "description": "Field values to change" }
            },
            "required": ["objectName", "recordId", "fields"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "objectName")]
            object_name: String,
            #[serde(rename = "recordId")]
            record_id: String,
            fields: Value,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        match self
            .session
            .update(&params.object_name, &params.record_id, &params.fields)
            .await
        {
            Ok(()) => format!("Record {} updated successfully.", params.record_id),
            Err(error) => format!("Error updating record: {error}"),
        }
    }
}

pub struct DeleteRecord {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for DeleteRecord {
    fn name(&self) -> &'static str {
        "deleteRecord"
    }

    fn description(&self) -> &'static str {
        "Use this function to delete a Salesforce record"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "objectName": { "type": "string", "description": "The API name of the object" },
                "recordId": { "type": "string", "description": "The id of the record to delete" }
            },
            "required": ["objectName", "recordId"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "objectName")]
            object_name: String,
            #[serde(rename = "recordId")]
            record_id: String,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        match self.session.delete(&params.object_name, &params.record_id).await {
            Ok(()) => format!("Record {} deleted successfully.", params.record_id),
            Err(error) => format!("Error deleting record: {error}"),
        }
    }
}

fn parse_method(raw: Option<&str>) -> Result<Method, String> {
    match raw.unwrap_or("GET").to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(format!("unsupported method {other}")),
    }
}

pub struct ToolingExecute {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for ToolingExecute {
    fn name(&self) -> &'static str {
        "toolingExecute"
    }

    fn description(&self) -> &'static str {
        "Use this function to call the Salesforce Tooling API"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "description": "The Tooling API endpoint to call, e.g. 'sobjects/ApexClass'" },
                "method": { "type": "string", "description": "HTTP method: GET, POST, PATCH, or DELETE. Defaults to GET" },
                "data": { "type": "object", "description": "Optional JSON body for POST/PATCH requests" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            action: String,
            method: Option<String>,
            data: Option<Value>,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };
        let method = match parse_method(params.method.as_deref()) {
            Ok(method) => method,
            Err(error) => return format!("Error executing tooling request: {error}"),
        };

        match self.session.tooling(method, &params.action, params.data.as_ref()).await {
            Ok(response) => format!(
                "Tooling Execute Result (JSON):\n{}",
                shape_json(&response, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error executing tooling request: {error}"),
        }
    }
}

pub struct ApexExecute {
    session: Arc<CrmSession>,
}

#[async_trait]
impl Tool for ApexExecute {
    fn name(&self) -> &'static str {
        "apexExecute"
    }

    fn description(&self) -> &'static str {
        "Use this function to call a Salesforce Apex REST endpoint"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "description": "The Apex REST endpoint to call, e.g. '/MyApexClass'" },
                "method": { "type": "string", "description": "HTTP method: GET, POST, PATCH, or DELETE. Defaults to GET" },
                "data": { "type": "object", "description": "Optional JSON body for POST/PATCH requests" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        #[derive(Deserialize)]
        struct Params {
            action: String,
            method: Option<String>,
            data: Option<Value>,
        }
        let params = match parse_arguments::<Params>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };
        let method = match parse_method(params.method.as_deref()) {
            Ok(method) => method,
            Err(error) => return format!("Error executing apex request: {error}"),
        };

        match self.session.apexrest(method, &params.action, params.data.as_ref()).await {
            Ok(response) => format!(
                "Apex Execute Result (JSON):\n{}",
                shape_json(&response, self.session.max_response_bytes())
            ),
            Err(error) => format!("Error executing apex request: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use switchboard_agent::tool::Tool;
    use switchboard_core::config::CrmConfig;

    use crate::session::CrmSession;

    use super::{crm_toolset, GetObjectFields, RunSoqlQuery, ToolingExecute};

    fn disabled_session() -> Arc<CrmSession> {
        let config = CrmConfig {
            enabled: false,
            login_url: "https://login.salesforce.com".to_owned(),
            api_version: "59.0".to_owned(),
            username: None,
            password: None,
            security_token: None,
            access_token: None,
            instance_url: None,
            timeout_secs: 30,
            max_records: 100,
            max_response_bytes: 50_000,
            max_fields: 50,
        };
        Arc::new(CrmSession::new(config).expect("session builds"))
    }

    #[test]
    fn toolset_registers_every_crm_tool() {
        let names: Vec<&str> =
            crm_toolset(disabled_session()).iter().map(|tool| tool.name()).collect();
        assert_eq!(
            names,
            vec![
                "runSoqlQuery",
                "runSoslSearch",
                "getObjectFields",
                "getRecord",
                "restful",
                "createRecord",
                "updateRecord",
                "deleteRecord",
                "toolingExecute",
                "apexExecute",
            ]
        );
    }

    #[test]
    fn record_and_field_caps_are_per_call_parameters() {
        let query = RunSoqlQuery { session: disabled_session() };
        let schema = query.parameters();
        assert!(schema["properties"]["maxRecords"].is_object());
        assert_eq!(schema["required"], json!(["query"]));

        let fields = GetObjectFields { session: disabled_session() };
        let schema = fields.parameters();
        assert!(schema["properties"]["maxFields"].is_object());
        assert_eq!(schema["required"], json!(["objectName"]));
    }

    #[tokio::test]
    async fn query_against_disabled_session_is_an_error_string() {
        let tool = RunSoqlQuery { session: disabled_session() };
        let result = tool.execute(json!({ "query": "SELECT Id FROM Account" })).await;
        assert_eq!(
            result,
            "Error executing SOQL query: crm integration is disabled"
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_not_sent() {
        let tool = RunSoqlQuery { session: disabled_session() };
        let result = tool.execute(json!({ "q": "SELECT Id FROM Account" })).await;
        assert!(result.starts_with("Error: invalid arguments for runSoqlQuery"));
    }

    #[tokio::test]
    async fn tooling_execute_rejects_unsupported_methods_before_sending() {
        let tool = ToolingExecute { session: disabled_session() };
        let result = tool
            .execute(json!({ "action": "sobjects/ApexClass", "method": "PUT" }))
            .await;
        assert_eq!(result, "Error executing tooling request: unsupported method PUT");
    }

    #[tokio::test]
    async fn tooling_execute_against_disabled_session_is_an_error_string() {
        let tool = ToolingExecute { session: disabled_session() };
        let result = tool.execute(json!({ "action": "sobjects/ApexClass" })).await;
        assert_eq!(result, "Error executing tooling request: crm integration is disabled");
    }
}
