//! Markdown rendering of stored artifact payloads, one layout per kind.
//!
//! Payloads are free-form JSON written by the research tools; every field is
//! optional. A payload without any of the fields a kind knows about falls back
//! to pretty-printed JSON.

use crate::domain::{Artifact, ArtifactKind};
use serde_json::Value;

const TABLE_PREVIEW_ROWS: usize = 20;

pub fn render_artifact(artifact: &Artifact, data: &Value) -> String {
    let body = match artifact.kind {
        ArtifactKind::TopicExploration => render_topic_exploration(data),
        ArtifactKind::HypothesisValidation => render_hypothesis_validation(data),
        ArtifactKind::Roadmap => render_roadmap(data),
        ArtifactKind::LiteratureAnalysis => render_literature_analysis(data),
        ArtifactKind::DesignCritique => render_design_critique(data),
        ArtifactKind::CleanedData | ArtifactKind::LabeledData => render_table(data),
    };
    let body = body.unwrap_or_else(|| render_json(data));
    format!(
        "## {}\n\n_{}, saved {}_\n\n{}",
        artifact.name,
        artifact.kind.title(),
        short_timestamp(&artifact.created_at),
        body
    )
}

fn render_topic_exploration(data: &Value) -> Option<String> {
    let result = &data["result"];
    let mut md = String::new();
    push_field(&mut md, "Topic", text(&data["topic"]));
    if let Some(count) = count_text(&data["paper_count"]) {
        md.push_str(&format!("_{count} papers analyzed_\n\n"));
    }
    push_list(&mut md, "Themes", strings(&result["themes"]));
    push_list(&mut md, "Gaps", strings(&result["gaps"]));

    let ideas = items(&result["ideas"]);
    if !ideas.is_empty() {
        md.push_str(&format!("**Ideas ({}):**\n", ideas.len()));
        for idea in ideas {
            md.push_str(&format!(
                "- **{}** [{}] {}\n",
                text(&idea["title"]).unwrap_or_default(),
                text(&idea["feasibility"]).unwrap_or("?"),
                text(&idea["description"]).unwrap_or_default()
            ));
        }
        md.push('\n');
    }
    non_empty(md)
}

fn render_hypothesis_validation(data: &Value) -> Option<String> {
    let result = &data["result"];
    let mut md = String::new();
    push_field(&mut md, "Hypothesis", text(&data["hypothesis"]));
    push_field(&mut md, "Verdict", text(&result["verdict"]));
    if let Some(summary) = text(&result["summary"]) {
        md.push_str(&format!("> {summary}\n\n"));
    }

    let scores: Vec<String> = [
        ("Support", "support_score"),
        ("Novelty", "novelty_score"),
        ("Feasibility", "feasibility_score"),
    ]
    .iter()
    .filter_map(|(label, key)| {
        result[*key]
            .as_f64()
            .map(|score| format!("| {label} | {}% |", (score * 100.0).round() as i64))
    })
    .collect();
    if !scores.is_empty() {
        md.push_str("| Score | Value |\n| :--- | :--- |\n");
        for row in scores {
            md.push_str(&row);
            md.push('\n');
        }
        md.push('\n');
    }
    non_empty(md)
}

fn render_roadmap(data: &Value) -> Option<String> {
    let result = &data["result"];
    let mut md = String::new();
    push_field(&mut md, "Topic", text(&data["topic"]));
    push_field(&mut md, "Constraints", text(&data["constraints"]));
    push_field(&mut md, "Complexity", text(&result["complexity"]));
    if let Some(summary) = text(&result["landscape_summary"]) {
        md.push_str(&format!("> {summary}\n\n"));
    }

    let mut steps = items(&result["methodology_steps"]);
    if !steps.is_empty() {
        steps.sort_by_key(|s| s["step"].as_i64().unwrap_or(0));
        md.push_str(&format!("**Methodology ({} steps):**\n", steps.len()));
        for step in steps {
            let number = step["step"]
                .as_i64()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".into());
            md.push_str(&format!(
                "{number}. **{}** ({}) {}\n",
                text(&step["title"]).unwrap_or_default(),
                text(&step["estimated_time"]).unwrap_or("n/a"),
                text(&step["description"]).unwrap_or_default()
            ));
        }
        md.push('\n');
    }

    let datasets = items(&result["suggested_datasets"]);
    if !datasets.is_empty() {
        md.push_str(&format!("**Datasets ({}):**\n", datasets.len()));
        for ds in datasets {
            md.push_str(&format!(
                "- **{}**: {}",
                text(&ds["name"]).unwrap_or_default(),
                text(&ds["description"]).unwrap_or_default()
            ));
            if let Some(url) = text(&ds["url"]) {
                md.push_str(&format!(" (<{url}>)"));
            }
            md.push('\n');
        }
        md.push('\n');
    }
    non_empty(md)
}

fn render_literature_analysis(data: &Value) -> Option<String> {
    let result = &data["result"];
    let mut md = String::new();
    push_field(&mut md, "Topic", text(&data["topic"]));
    if let Some(count) = count_text(&data["paper_count"]) {
        md.push_str(&format!("_{count} papers analyzed_\n\n"));
    }
    push_field(&mut md, "Debate intensity", text(&result["debate_intensity"]));
    if let Some(consensus) = text(&result["field_consensus"]) {
        md.push_str(&format!("> {consensus}\n\n"));
    }

    let contested = items(&result["contested_claims"]);
    if !contested.is_empty() {
        md.push_str(&format!("**Contested Claims ({}):**\n", contested.len()));
        for claim in contested {
            md.push_str(&format!(
                "- **{}**: {}\n",
                text(&claim["claim"]).unwrap_or_default(),
                text(&claim["why_it_matters"]).unwrap_or_default()
            ));
        }
        md.push('\n');
    }

    let questions = items(&result["open_questions"]);
    if !questions.is_empty() {
        md.push_str(&format!("**Open Questions ({}):**\n", questions.len()));
        for q in questions {
            md.push_str(&format!("- {}", text(&q["question"]).unwrap_or_default()));
            if let Some(opportunity) = text(&q["opportunity"]) {
                md.push_str(&format!(" _({opportunity})_"));
            }
            md.push('\n');
        }
        md.push('\n');
    }
    non_empty(md)
}

fn render_design_critique(data: &Value) -> Option<String> {
    let result = &data["result"];
    let mut md = String::new();
    if let Some(experiment) = text(&data["experiment"]) {
        let preview: String = experiment.chars().take(200).collect();
        let ellipsis = if experiment.chars().count() > 200 { "..." } else { "" };
        md.push_str(&format!("**Experiment:** {preview}{ellipsis}\n\n"));
    }
    if let Some(assessment) = text(&result["overall_assessment"]) {
        md.push_str(&format!("> {assessment}\n\n"));
    }

    let issues: Vec<&Value> = [
        "confounds",
        "missing_controls",
        "methodological_concerns",
        "literature_gaps",
    ]
    .iter()
    .flat_map(|key| items(&result[*key]))
    .collect();
    if !issues.is_empty() {
        let severity = |issue: &Value| text(&issue["severity"]).unwrap_or("Minor").to_string();
        let critical = issues.iter().filter(|i| severity(i) == "Critical").count();
        let major = issues.iter().filter(|i| severity(i) == "Major").count();
        md.push_str(&format!(
            "**Issues:** {} total ({critical} critical, {major} major)\n",
            issues.len()
        ));

        let mut sorted = issues;
        sorted.sort_by_key(|i| severity_rank(&severity(i)));
        for issue in sorted {
            md.push_str(&format!(
                "- [{}] {}\n",
                severity(issue),
                text(&issue["description"]).unwrap_or_default()
            ));
        }
        md.push('\n');
    }
    non_empty(md)
}

fn severity_rank(severity: &str) -> u8 {
    match severity {
        "Critical" => 0,
        "Major" => 1,
        _ => 2,
    }
}

/// Tabular payloads are an array of row objects, optionally under `"rows"`.
fn render_table(data: &Value) -> Option<String> {
    let rows = data
        .as_array()
        .or_else(|| data["rows"].as_array())?
        .iter()
        .filter_map(Value::as_object)
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return None;
    }

    let mut columns: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut md = String::new();
    md.push_str(&format!("| {} |\n", columns.join(" | ")));
    md.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));
    for row in rows.iter().take(TABLE_PREVIEW_ROWS) {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(*c).map(cell).unwrap_or_default())
            .collect();
        md.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    md.push_str(&format!(
        "\n_{} rows × {} columns_\n",
        rows.len(),
        columns.len()
    ));
    Some(md)
}

fn cell(value: &Value) -> String {
    let raw = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.replace('|', "\\|").replace('\n', " ")
}

fn render_json(data: &Value) -> String {
    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!("```json\n{pretty}\n```\n")
}

fn text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn count_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn strings(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(text).collect())
        .unwrap_or_default()
}

fn items(value: &Value) -> Vec<&Value> {
    value
        .as_array()
        .map(|items| items.iter().filter(|v| v.is_object()).collect())
        .unwrap_or_default()
}

fn push_field(md: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        md.push_str(&format!("**{label}:** {value}\n\n"));
    }
}

fn push_list(md: &mut String, label: &str, values: Vec<&str>) {
    if values.is_empty() {
        return;
    }
    md.push_str(&format!("**{label}:**\n"));
    for value in values {
        md.push_str(&format!("- {value}\n"));
    }
    md.push('\n');
}

fn non_empty(md: String) -> Option<String> {
    if md.trim().is_empty() { None } else { Some(md) }
}

fn short_timestamp(ts: &str) -> String {
    ts.chars().take(16).collect::<String>().replace('T', " ")
}
