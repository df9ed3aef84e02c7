//! JSON shapes returned by the MangaDex API.
//!
//! Only the fields the pipeline reads are modelled. The API sends `null` for
//! missing strings, so every optional string is an `Option` and normalized by
//! the caller. Lists, maps and counts may also arrive as `null`; those read as
//! their empty value through `null_as_default`.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Reads an explicit `null` as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) data: Vec<WorkRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkRecord {
    pub(crate) id: String,
    pub(crate) attributes: WorkAttributes,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkAttributes {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Relationship {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RelationshipAttributes {
    #[serde(rename = "fileName", default)]
    pub(crate) file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EpisodeListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) data: Vec<EpisodeRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EpisodeRecord {
    pub(crate) id: String,
    pub(crate) attributes: EpisodeAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EpisodeAttributes {
    #[serde(default)]
    pub(crate) volume: Option<String>,
    #[serde(default)]
    pub(crate) chapter: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) pages: u32,
    #[serde(rename = "externalUrl", default)]
    pub(crate) external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailResponse {
    #[serde(default)]
    pub(crate) result: String,
    #[serde(rename = "baseUrl", default)]
    pub(crate) base_url: Option<String>,
    #[serde(default)]
    pub(crate) chapter: Option<DetailManifest>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DetailManifest {
    #[serde(default)]
    pub(crate) hash: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) data: Vec<String>,
    #[serde(rename = "dataSaver", default, deserialize_with = "null_as_default")]
    pub(crate) data_saver: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_record_tolerates_nulls() {
        let raw = r#"{"id":"c1","attributes":{"volume":null,"chapter":"4","title":null,"pages":12,"externalUrl":null}}"#;
        let record: EpisodeRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, "c1");
        assert!(record.attributes.volume.is_none());
        assert_eq!(record.attributes.chapter.as_deref(), Some("4"));
        assert_eq!(record.attributes.pages, 12);
    }

    #[test]
    fn test_detail_response_parses_both_manifests() {
        let raw = r#"{
            "result": "ok",
            "baseUrl": "https://node.example",
            "chapter": {"hash": "abc", "data": ["1.png", "2.png"], "dataSaver": ["1.jpg"]}
        }"#;
        let detail: DetailResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.result, "ok");
        assert_eq!(detail.base_url.as_deref(), Some("https://node.example"));
        let manifest = detail.chapter.unwrap();
        assert_eq!(manifest.hash.as_deref(), Some("abc"));
        assert_eq!(manifest.data.len(), 2);
        assert_eq!(manifest.data_saver, ["1.jpg"]);
    }

    #[test]
    fn test_null_manifests_read_as_empty() {
        let raw = r#"{"result":"ok","baseUrl":"https://n","chapter":{"hash":"h","data":null,"dataSaver":null}}"#;
        let detail: DetailResponse = serde_json::from_str(raw).unwrap();
        let manifest = detail.chapter.unwrap();
        assert_eq!(manifest.hash.as_deref(), Some("h"));
        assert!(manifest.data.is_empty());
        assert!(manifest.data_saver.is_empty());
    }

    #[test]
    fn test_null_page_count_reads_as_zero() {
        let raw = r#"{"id":"c2","attributes":{"chapter":"5","pages":null}}"#;
        let record: EpisodeRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.attributes.pages, 0);
    }

    #[test]
    fn test_null_lists_in_listing_and_search_read_as_empty() {
        let listing: EpisodeListResponse = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(listing.data.is_empty());

        let raw = r#"{"data":[{"id":"w1","attributes":{"title":null},"relationships":null}]}"#;
        let search: SearchResponse = serde_json::from_str(raw).unwrap();
        assert!(search.data[0].attributes.title.is_empty());
        assert!(search.data[0].relationships.is_empty());
    }

    #[test]
    fn test_detail_response_without_chapter_object() {
        let detail: DetailResponse = serde_json::from_str(r#"{"result":"error"}"#).unwrap();
        assert_eq!(detail.result, "error");
        assert!(detail.chapter.is_none());
    }
}
