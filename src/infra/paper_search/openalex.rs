use super::{OPENALEX, PaperSearchProvider, http_client};
use crate::domain::Paper;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const WORKS_URL: &str = "https://api.openalex.org/works";
const SELECT: &str = "id,title,authorships,publication_year,abstract_inverted_index,primary_location";
const MAX_AUTHORS: usize = 5;

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authorships: Option<Vec<Authorship>>,
    publication_year: Option<i32>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    primary_location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    pdf_url: Option<String>,
}

pub struct OpenAlex {
    client: reqwest::Client,
    mailto: Option<String>,
}

impl OpenAlex {
    pub fn new(mailto: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            mailto: mailto.filter(|m| !m.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PaperSearchProvider for OpenAlex {
    fn name(&self) -> &'static str {
        OPENALEX
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>> {
        let per_page = limit.to_string();
        let mut params = vec![
            ("search", query),
            ("per-page", per_page.as_str()),
            ("select", SELECT),
        ];
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.as_str()));
        }

        let body = self
            .client
            .get(WORKS_URL)
            .query(&params)
            .send()
            .await
            .context("OpenAlex request failed")?
            .error_for_status()
            .context("OpenAlex returned an error status")?
            .text()
            .await
            .context("reading OpenAlex response")?;
        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<Vec<Paper>> {
    let response: WorksResponse =
        serde_json::from_str(body).context("parsing OpenAlex response")?;
    Ok(response
        .results
        .into_iter()
        .enumerate()
        .map(|(index, work)| Paper {
            id: work.id.unwrap_or_else(|| format!("openalex-{index}")),
            title: work
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            authors: work
                .authorships
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.author.and_then(|author| author.display_name))
                .take(MAX_AUTHORS)
                .collect(),
            year: work.publication_year,
            abstract_text: work
                .abstract_inverted_index
                .as_ref()
                .map(reconstruct_abstract)
                .unwrap_or_default(),
            pdf_url: work.primary_location.and_then(|loc| loc.pdf_url),
            source: OPENALEX.to_string(),
        })
        .collect())
}

/// Rebuild abstract text from OpenAlex's `{word: [positions]}` index.
pub(crate) fn reconstruct_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut positions = BTreeMap::new();
    for (word, slots) in index {
        for &slot in slots {
            positions.insert(slot, word.as_str());
        }
    }
    positions.into_values().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_abstract_orders_by_position() {
        let index = HashMap::from([
            ("sleep".to_string(), vec![1, 4]),
            ("Poor".to_string(), vec![0]),
            ("harms".to_string(), vec![2]),
            ("deep".to_string(), vec![3]),
        ]);
        assert_eq!(reconstruct_abstract(&index), "Poor sleep harms deep sleep");
        assert_eq!(reconstruct_abstract(&HashMap::new()), "");
    }

    #[test]
    fn test_parse_response_caps_authors() {
        let authorships: Vec<String> = (1..=7)
            .map(|i| format!(r#"{{"author": {{"display_name": "Author {i}"}}}}"#))
            .collect();
        let body = format!(
            r#"{{"results": [{{
                "id": "https://openalex.org/W1",
                "title": "Caffeine timing",
                "authorships": [{}],
                "publication_year": 2021,
                "abstract_inverted_index": {{"Late": [0], "caffeine": [1]}},
                "primary_location": {{"pdf_url": null}}
            }}]}}"#,
            authorships.join(",")
        );

        let papers = parse_response(&body).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].authors.len(), MAX_AUTHORS);
        assert_eq!(papers[0].authors[4], "Author 5");
        assert_eq!(papers[0].abstract_text, "Late caffeine");
        assert_eq!(papers[0].year, Some(2021));
        assert!(papers[0].pdf_url.is_none());
        assert_eq!(papers[0].source, "openalex");
    }

    #[test]
    fn test_unnamed_authors_do_not_take_author_slots() {
        let mut authorships = vec![
            r#"{"author": null}"#.to_string(),
            r#"{"author": {"display_name": null}}"#.to_string(),
            r#"{}"#.to_string(),
        ];
        authorships.extend(
            (1..=6).map(|i| format!(r#"{{"author": {{"display_name": "Author {i}"}}}}"#)),
        );
        let body = format!(
            r#"{{"results": [{{"id": "W2", "title": "Naps", "authorships": [{}]}}]}}"#,
            authorships.join(",")
        );

        let papers = parse_response(&body).unwrap();
        assert_eq!(
            papers[0].authors,
            vec!["Author 1", "Author 2", "Author 3", "Author 4", "Author 5"]
        );
    }

    #[test]
    fn test_parse_response_tolerates_missing_fields() {
        let papers = parse_response(r#"{"results": [{"title": null}]}"#).unwrap();
        assert_eq!(papers[0].title, "Untitled");
        assert_eq!(papers[0].id, "openalex-0");
        assert!(papers[0].authors.is_empty());
    }
}
