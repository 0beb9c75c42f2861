use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::tool::{parse_arguments, Tool};

const CHART_BASE_URL: &str = "https://image-charts.com/chart";

/// Builds an image-charts.com URL from chart parameters. The tool performs no
/// network call; the returned URL renders the chart when fetched.
pub struct GenerateChart;

#[derive(Deserialize)]
struct ChartParams {
    /// Chart type code, e.g. `bvg` for bar or `p` for pie.
    cht: String,
    /// Chart data in the `t:` series format, e.g. `t:10,20,30`.
    chd: String,
    /// Optional pipe-separated data labels.
    chl: Option<String>,
    /// Optional size as `WIDTHxHEIGHT`.
    chs: Option<String>,
    /// Optional chart title.
    chtt: Option<String>,
}

#[async_trait]
impl Tool for GenerateChart {
    fn name(&self) -> &'static str {
        "generateChart"
    }

    fn description(&self) -> &'static str {
        "Use this function to generate a chart image URL from chart parameters"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "cht": { "type": "string", "description": "Chart type, e.g. 'bvg' for bar chart, 'p' for pie chart, 'lc' for line chart" },
                "chd": { "type": "string", "description": "Chart data, e.g. 't:10,20,30'" },
                "chl": { "type": "string", "description": "Pipe-separated labels, e.g. 'Jan|Feb|Mar'" },
                "chs": { "type": "string", "description": "Chart size as WIDTHxHEIGHT, e.g. '700x400'" },
                "chtt": { "type": "string", "description": "Chart title" }
            },
            "required": ["cht", "chd"]
        })
    }

    async fn execute(&self, arguments: Value) -> String {
        let params = match parse_arguments::<ChartParams>(self.name(), arguments) {
            Ok(params) => params,
            Err(error) => return error,
        };

        let mut chart_url = match Url::parse(CHART_BASE_URL) {
            Ok(url) => url,
            Err(error) => return format!("Error: invalid chart base URL: {error}"),
        };

        {
            let mut query = chart_url.query_pairs_mut();
            query.append_pair("cht", &params.cht);
            query.append_pair("chd", &params.chd);
            if let Some(chl) = &params.chl {
                query.append_pair("chl", chl);
            }
            if let Some(chs) = &params.chs {
                query.append_pair("chs", chs);
            }
            if let Some(chtt) = &params.chtt {
                query.append_pair("chtt", chtt);
            }
        }

        format!("Chart URL generated successfully. You can view the chart at: {chart_url}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::tool::Tool;

    use super::GenerateChart;

    #[tokio::test]
    async fn builds_url_with_required_parameters() {
        let result = GenerateChart
            .execute(json!({ "cht": "bvg", "chd": "t:10,20,30" }))
            .await;

        assert!(result.starts_with("Chart URL generated successfully. You can view the chart at: "));
        assert!(result.contains("https://image-charts.com/chart?"));
        assert!(result.contains("cht=bvg"));
        assert!(result.contains("chd=t%3A10%2C20%2C30"));
    }

    #[tokio::test]
    async fn optional_parameters_are_appended_when_present() {
        let result = GenerateChart
            .execute(json!({
                "cht": "p",
                "chd": "t:60,40",
                "chl": "Yes|No",
                "chs": "700x400",
                "chtt": "Survey results"
            }))
            .await;

        assert!(result.contains("chl=Yes%7CNo"));
        assert!(result.contains("chs=700x400"));
        assert!(result.contains("chtt=Survey+results"));
    }

    #[tokio::test]
    async fn missing_required_parameter_is_an_error_string() {
        let result = GenerateChart.execute(json!({ "cht": "bvg" })).await;
        assert!(result.starts_with("Error: invalid arguments for generateChart"));
    }
}
