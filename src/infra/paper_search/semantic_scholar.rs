use super::{PaperSearchProvider, SEMANTIC_SCHOLAR, http_client};
use crate::domain::Paper;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const FIELDS: &str = "paperId,title,authors,year,abstract,openAccessPdf";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Option<Vec<Author>>,
    year: Option<i32>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    open_access_pdf: Option<OpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

pub struct SemanticScholar {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SemanticScholar {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PaperSearchProvider for SemanticScholar {
    fn name(&self) -> &'static str {
        SEMANTIC_SCHOLAR
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>> {
        let limit = limit.to_string();
        let mut request = self.client.get(SEARCH_URL).query(&[
            ("query", query),
            ("limit", limit.as_str()),
            ("fields", FIELDS),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let body = request
            .send()
            .await
            .context("Semantic Scholar request failed")?
            .error_for_status()
            .context("Semantic Scholar returned an error status")?
            .text()
            .await
            .context("reading Semantic Scholar response")?;
        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<Vec<Paper>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("parsing Semantic Scholar response")?;
    Ok(response
        .data
        .into_iter()
        .enumerate()
        .map(|(index, hit)| Paper {
            id: hit.paper_id.unwrap_or_else(|| format!("s2-{index}")),
            title: hit
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            authors: hit
                .authors
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.name)
                .filter(|n| !n.is_empty())
                .collect(),
            year: hit.year,
            abstract_text: hit.abstract_text.unwrap_or_default(),
            pdf_url: hit.open_access_pdf.and_then(|pdf| pdf.url),
            source: SEMANTIC_SCHOLAR.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_maps_fields() {
        let body = r#"{
            "total": 2,
            "data": [
                {
                    "paperId": "abc123",
                    "title": "Blue light and sleep latency",
                    "authors": [{"authorId": "1", "name": "Ada Lovelace"}, {"name": "Alan Turing"}],
                    "year": 2019,
                    "abstract": "We measure...",
                    "openAccessPdf": {"url": "https://example.org/a.pdf", "status": "GREEN"}
                },
                {"paperId": "def456", "title": null, "authors": null, "year": null,
                 "abstract": null, "openAccessPdf": null}
            ]
        }"#;
        let papers = parse_response(body).unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].id, "abc123");
        assert_eq!(papers[0].authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(papers[0].pdf_url.as_deref(), Some("https://example.org/a.pdf"));
        assert_eq!(papers[0].source, "semantic_scholar");

        assert_eq!(papers[1].title, "Untitled");
        assert!(papers[1].authors.is_empty());
        assert_eq!(papers[1].year, None);
        assert_eq!(papers[1].abstract_text, "");
    }

    #[test]
    fn test_parse_response_without_data() {
        assert!(parse_response(r#"{"total": 0}"#).unwrap().is_empty());
        assert!(parse_response("<html>rate limited</html>").is_err());
    }
}
