//! Row filtering against a [`Condition`].

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::condition::Condition;

use super::{required_array, required_str, Parameter, ParameterKind, Tool, ToolError, FILTER_DATA};

const DATA_HINT: &str = "Pass the data array from a previous tool result (e.g., from api_call result.data).";

pub struct FilterData;

struct FilterParams {
    data: Vec<Value>,
    condition: Condition,
}

impl FilterParams {
    fn parse(mut args: Map<String, Value>) -> Result<Self, ToolError> {
        let data = required_array(FILTER_DATA, &mut args, "data", DATA_HINT)?;
        let condition = required_str(
            FILTER_DATA,
            &args,
            "condition",
            "Describe which rows to keep, e.g. 'id > 5'.",
        )?;

        Ok(Self {
            data,
            condition: Condition::parse(condition),
        })
    }
}

#[async_trait]
impl Tool for FilterData {
    fn name(&self) -> &str {
        FILTER_DATA
    }

    fn description(&self) -> &str {
        "Filter an array of objects based on a condition. IMPORTANT: You must pass the 'data' array from a previous tool result (e.g., from api_call result.data). The data parameter is REQUIRED and must be an array of objects."
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::new(
                "data",
                ParameterKind::Array(Box::new(ParameterKind::Object)),
                "REQUIRED: Array of objects to filter. This should come from a previous tool call result (e.g., if api_call returned {success: true, data: [...]}, use that data array here).",
            )
            .required(),
            Parameter::new(
                "condition",
                ParameterKind::String,
                "Filter condition (e.g., 'id > 5', 'age >= 25', 'status === \"active\"', 'address.city == \"NYC\"'). The condition is evaluated against each object in the data array.",
            )
            .required(),
        ]
    }

    fn chained_parameter(&self) -> Option<&str> {
        Some("data")
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let FilterParams { data, condition } = FilterParams::parse(args)?;

        if !condition.is_structured() {
            tracing::warn!(
                condition = condition.as_str(),
                "Condition is not a comparison; only rows with a property of that exact name can match"
            );
        }

        let total = data.len();
        let filtered: Vec<Value> = data
            .into_iter()
            .filter(|item| condition.evaluate(item))
            .collect();

        tracing::debug!(total, kept = filtered.len(), "Filtered rows");

        Ok(json!({
            "success": true,
            "filteredCount": filtered.len(),
            "totalCount": total,
            "data": filtered,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn keeps_matching_rows() {
        let result = FilterData
            .execute(args(json!({
                "data": [{"id": 1}, {"id": 7}, {"id": 9}],
                "condition": "id > 5"
            })))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(result["filteredCount"], 2);
        assert_eq!(result["totalCount"], 3);
        assert_eq!(result["data"], json!([{"id": 7}, {"id": 9}]));
    }

    #[tokio::test]
    async fn unparseable_condition_filters_everything_out() {
        let result = FilterData
            .execute(args(json!({ "data": [{"id": 1}, {"id": 2}], "condition": "???" })))
            .await
            .unwrap();

        assert_eq!(result["filteredCount"], 0);
        assert_eq!(result["totalCount"], 2);
        assert_eq!(result["data"], json!([]));
    }

    #[tokio::test]
    async fn missing_data_raises() {
        let err = FilterData
            .execute(args(json!({ "condition": "id > 5" })))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::MissingParameter { ref parameter, .. } if parameter == "data"));
        assert!(err.to_string().starts_with("filter_data requires a 'data' parameter."));
    }

    #[tokio::test]
    async fn non_array_data_raises() {
        let err = FilterData
            .execute(args(json!({ "data": "[{\"id\": 1}]", "condition": "id > 5" })))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::NotAnArray { found: "string", .. }));
    }

    #[tokio::test]
    async fn missing_condition_raises() {
        let err = FilterData
            .execute(args(json!({ "data": [], "condition": "  " })))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::MissingParameter { ref parameter, .. } if parameter == "condition"));
    }
}
