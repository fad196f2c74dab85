//! Last.fm web-service client.
//!
//! Implements [`SimilarityProvider`] with the blocking `reqwest` client against the
//! JSON flavour of the Last.fm 2.0 API (`artist.getInfo`, `artist.getSimilar`,
//! `artist.getTopTags`). Requests carry a 10 second timeout.

use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::artist::SimilarArtist;
use crate::similarity::SimilarityProvider;

pub const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct LastFm {
    client: Client,
    api_key: String,
    api_root: String,
}

impl LastFm {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_root(api_key, API_ROOT)
    }

    /// Client talking to an alternative API root.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_root(api_key: &str, api_root: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_root: api_root.to_string(),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T> {
        trace!("Last.fm {method} {params:?}");
        let response = self
            .client
            .get(&self.api_root)
            .query(&[("method", method), ("api_key", self.api_key.as_str()), ("format", "json")])
            .query(params)
            .send()
            .with_context(|| format!("Last.fm {method} request failed"))?;

        let value: serde_json::Value = response
            .json()
            .with_context(|| format!("Last.fm {method} returned invalid JSON"))?;
        check_error(method, &value)?;
        serde_json::from_value(value).with_context(|| format!("Unexpected Last.fm {method} response"))
    }
}

/// Fail on an API-level error document (`{"error": 6, "message": "..."}`).
fn check_error(method: &str, value: &serde_json::Value) -> Result<()> {
    if let Some(code) = value.get("error") {
        let message = value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("no message");
        bail!("Last.fm {method} error {code}: {message}");
    }
    Ok(())
}

/// Last.fm collapses single-element lists to a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    artist: InfoArtist,
}

#[derive(Debug, Deserialize)]
struct InfoArtist {
    name: String,
    #[serde(default)]
    bio: Option<Bio>,
}

#[derive(Debug, Deserialize)]
struct Bio {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SimilarResponse {
    similarartists: SimilarList,
}

#[derive(Debug, Deserialize)]
struct SimilarList {
    #[serde(default)]
    artist: OneOrMany<SimilarEntry>,
}

#[derive(Debug, Deserialize)]
struct SimilarEntry {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopTagsResponse {
    toptags: TagList,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tag: OneOrMany<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl SimilarityProvider for LastFm {
    fn name_for_mbid(&self, mbid: &str) -> Result<String> {
        let info: InfoResponse = self.call("artist.getInfo", &[("mbid", mbid)])?;
        if info.artist.name.is_empty() {
            return Err(anyhow!("Last.fm has no name for {mbid}"));
        }
        Ok(info.artist.name)
    }

    fn similar_artists(&self, name: &str) -> Result<Vec<SimilarArtist>> {
        let similar: SimilarResponse = self.call("artist.getSimilar", &[("artist", name)])?;
        Ok(similar_from(similar))
    }

    fn top_tags(&self, name: &str) -> Result<Vec<String>> {
        let tags: TopTagsResponse = self.call("artist.getTopTags", &[("artist", name)])?;
        Ok(tags.toptags.tag.into_vec().into_iter().map(|t| t.name).collect())
    }

    fn biography(&self, name: &str) -> Result<String> {
        let info: InfoResponse = self.call("artist.getInfo", &[("artist", name)])?;
        Ok(info.artist.bio.map(|b| b.content).unwrap_or_default())
    }
}

fn similar_from(response: SimilarResponse) -> Vec<SimilarArtist> {
    response
        .similarartists
        .artist
        .into_vec()
        .into_iter()
        .map(|e| SimilarArtist::new(e.mbid.as_deref(), &e.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_document_is_rejected() {
        let doc = json!({"error": 6, "message": "The artist you supplied could not be found"});
        let err = check_error("artist.getSimilar", &doc).unwrap_err();
        assert!(err.to_string().contains("could not be found"));
        assert!(check_error("artist.getSimilar", &json!({"similarartists": {}})).is_ok());
    }

    #[test]
    fn test_similar_response_parsing() {
        let doc = json!({
            "similarartists": {
                "artist": [
                    {"name": "Múm", "mbid": "0c1b0f6b-f7e1-4c1d-9b1e-4b2c1d0f6b1e", "match": "1"},
                    {"name": "Ghost Artist", "mbid": "", "match": "0.5"}
                ],
                "@attr": {"artist": "Björk"}
            }
        });
        let similar = similar_from(serde_json::from_value(doc).unwrap());
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].name, "Múm");
        assert!(similar[0].mbid.is_some());
        assert_eq!(similar[1].mbid, None);
    }

    #[test]
    fn test_single_tag_object_is_accepted() {
        let doc = json!({"toptags": {"tag": {"name": "ambient", "count": 100}}});
        let tags: TopTagsResponse = serde_json::from_value(doc).unwrap();
        let names: Vec<_> = tags.toptags.tag.into_vec().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["ambient".to_string()]);
    }

    #[test]
    fn test_info_without_bio() {
        let doc = json!({"artist": {"name": "Low"}});
        let info: InfoResponse = serde_json::from_value(doc).unwrap();
        assert_eq!(info.artist.name, "Low");
        assert!(info.artist.bio.is_none());
    }
}
