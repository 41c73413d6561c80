//! Stats dashboard rendering: substitution of a fixed token set into an HTML
//! template. The chart data tokens are JSON arrays ready for a client-side
//! charting library.

use serde_json::json;

use super::stats::StatsSnapshot;

pub const DEFAULT_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><title>hydra-gateway stats</title></head>
<body>
<h1>Gateway statistics</h1>
<ul>
<li>Total requests: {{totalRequests}}</li>
<li>Successful: {{successfulRequests}}</li>
<li>Failed: {{failedRequests}}</li>
<li>Cache hits: {{cacheHits}}</li>
<li>Cache misses: {{cacheMisses}}</li>
<li>Cache hit rate: {{cacheHitRate}}</li>
<li>Cache size: {{cacheSize}}</li>
<li>Input tokens: {{totalInputTokens}}</li>
<li>Output tokens: {{totalOutputTokens}}</li>
<li>Errors: {{totalErrors}}</li>
</ul>
<h2>Recent errors</h2>
<pre id="recent-errors">{{recentErrors}}</pre>
<script>
const requests = { labels: {{requestsLabels}}, data: {{requestsData}} };
const tokens = {
  labels: {{tokensLabels}},
  input: {{inputTokensData}},
  output: {{outputTokensData}}
};
const errors = { labels: {{errorLabels}}, data: {{errorData}} };
</script>
</body>
</html>
"#;

pub fn render(template: &str, snapshot: &StatsSnapshot, cache_size: usize) -> String {
    let requests = &snapshot.requests;
    let tokens = &snapshot.tokens;
    let errors = &snapshot.errors;

    let observed = requests.cache_hits + requests.cache_misses;
    let hit_rate = if observed == 0 {
        "0.0%".to_string()
    } else {
        format!(
            "{:.1}%",
            requests.cache_hits as f64 * 100.0 / observed as f64
        )
    };

    let token_labels: Vec<&String> = tokens.input_by_provider.keys().collect();
    let output_data: Vec<u64> = token_labels
        .iter()
        .map(|provider| {
            tokens
                .output_by_provider
                .get(provider.as_str())
                .copied()
                .unwrap_or(0)
        })
        .collect();

    let replacements = [
        ("totalRequests", requests.total.to_string()),
        ("successfulRequests", requests.successful.to_string()),
        ("failedRequests", requests.failed.to_string()),
        ("cacheHits", requests.cache_hits.to_string()),
        ("cacheMisses", requests.cache_misses.to_string()),
        ("cacheHitRate", hit_rate),
        ("totalInputTokens", tokens.total_input.to_string()),
        ("totalOutputTokens", tokens.total_output.to_string()),
        ("totalErrors", errors.total.to_string()),
        ("recentErrors", json!(errors.recent_errors).to_string()),
        (
            "requestsLabels",
            json!(requests.by_provider.keys().collect::<Vec<_>>()).to_string(),
        ),
        (
            "requestsData",
            json!(requests.by_provider.values().collect::<Vec<_>>()).to_string(),
        ),
        ("tokensLabels", json!(token_labels).to_string()),
        (
            "inputTokensData",
            json!(tokens.input_by_provider.values().collect::<Vec<_>>()).to_string(),
        ),
        ("outputTokensData", json!(output_data).to_string()),
        (
            "errorLabels",
            json!(errors.by_type.keys().collect::<Vec<_>>()).to_string(),
        ),
        (
            "errorData",
            json!(errors.by_type.values().collect::<Vec<_>>()).to_string(),
        ),
        ("cacheSize", cache_size.to_string()),
    ];

    let mut out = template.to_string();
    for (token, value) in replacements {
        out = out.replace(&format!("{{{{{token}}}}}"), &value);
    }
    out
}
