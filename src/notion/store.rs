use crate::error::StoreError;
use crate::esmp::config::PropertyNames;
use crate::esmp::records::{
    RecordDraft, RecordPage, RecordPatch, RecordQuery, RecordStore, RemoteRecord,
};
use crate::notion::client::NotionClient;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

const PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone)]
pub struct NotionStore {
    client: NotionClient,
    database_id: String,
    properties: PropertyNames,
}

fn plain_text(rich_text: Option<&Value>) -> String {
    rich_text
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.get("plain_text")
                        .and_then(Value::as_str)
                        .or_else(|| part.pointer("/text/content").and_then(Value::as_str))
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn as_whole_number(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
}

impl NotionStore {
    pub fn new(client: NotionClient, database_id: &str, properties: PropertyNames) -> Self {
        Self {
            client,
            database_id: database_id.trim().to_string(),
            properties,
        }
    }

    pub fn query_body(&self, query: &RecordQuery, cursor: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert("page_size".to_string(), json!(PAGE_SIZE));
        if let Some(cursor) = cursor {
            body.insert("start_cursor".to_string(), json!(cursor));
        }
        if let RecordQuery::TitleEquals(title) = query {
            body.insert(
                "filter".to_string(),
                json!({
                    "property": self.properties.title,
                    "title": { "equals": title },
                }),
            );
        }
        Value::Object(body)
    }

    pub fn create_body(&self, draft: &RecordDraft) -> Value {
        let mut properties = Map::new();
        properties.insert(
            self.properties.title.clone(),
            json!({ "title": [{ "text": { "content": draft.title } }] }),
        );
        if let Some(id) = draft.id {
            properties.insert(self.properties.id.clone(), json!({ "number": id }));
        }
        properties.insert(
            self.properties.tags.clone(),
            json!({ "multi_select": tag_options(&draft.status_tags) }),
        );
        if let Some(url) = &draft.asset_url {
            properties.insert(self.properties.link.clone(), json!({ "url": url }));
        }

        json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        })
    }

    pub fn patch_body(&self, patch: &RecordPatch) -> Value {
        let mut properties = Map::new();
        if let Some(id) = patch.id {
            properties.insert(self.properties.id.clone(), json!({ "number": id }));
        }
        if let Some(tags) = &patch.status_tags {
            properties.insert(
                self.properties.tags.clone(),
                json!({ "multi_select": tag_options(tags) }),
            );
        }
        json!({ "properties": properties })
    }

    pub fn parse_page(&self, page: &Value) -> Result<RemoteRecord, StoreError> {
        let record_id = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("page without id".to_string()))?
            .to_string();
        let props = page.get("properties");
        let prop = |name: &str| props.and_then(|p| p.get(name));

        let title = plain_text(prop(&self.properties.title).and_then(|p| p.get("title")));
        let id = as_whole_number(prop(&self.properties.id).and_then(|p| p.get("number")));
        let status_tags = prop(&self.properties.tags)
            .and_then(|p| p.get("multi_select"))
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|o| o.get("name").and_then(Value::as_str))
                    .map(ToOwned::to_owned)
                    .collect::<BTreeSet<_>>()
            })
            .unwrap_or_default();
        let asset_url = prop(&self.properties.link)
            .and_then(|p| p.get("url"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let archived = page
            .get("archived")
            .and_then(Value::as_bool)
            .unwrap_or(false)
            || page
                .get("in_trash")
                .and_then(Value::as_bool)
                .unwrap_or(false);

        Ok(RemoteRecord {
            record_id,
            title,
            id,
            status_tags,
            asset_url,
            archived,
        })
    }
}

fn tag_options(tags: &BTreeSet<String>) -> Vec<Value> {
    tags.iter().map(|t| json!({ "name": t })).collect()
}

#[async_trait]
impl RecordStore for NotionStore {
    async fn query(
        &self,
        query: &RecordQuery,
        cursor: Option<&str>,
    ) -> Result<RecordPage, StoreError> {
        let path = format!("databases/{}/query", self.database_id);
        let response = self
            .client
            .post(&path, &self.query_body(query, cursor))
            .await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::Decode("query response without results".to_string()))?
            .iter()
            .map(|page| self.parse_page(page))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            results,
            has_more: response
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            next_cursor: response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    }

    async fn create(&self, draft: &RecordDraft) -> Result<RemoteRecord, StoreError> {
        let response = self.client.post("pages", &self.create_body(draft)).await?;
        self.parse_page(&response)
    }

    async fn update(&self, record_id: &str, patch: &RecordPatch) -> Result<(), StoreError> {
        self.client
            .patch(&format!("pages/{record_id}"), &self.patch_body(patch))
            .await?;
        Ok(())
    }

    async fn archive(&self, record_id: &str) -> Result<(), StoreError> {
        self.client
            .patch(&format!("pages/{record_id}"), &json!({ "archived": true }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esmp::records::fetch_all;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(uri: &str) -> NotionStore {
        let client = NotionClient::new(uri, "secret", "2022-06-28").expect("client");
        NotionStore::new(client, "db", PropertyNames::default())
    }

    fn page(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "archived": false,
            "properties": {
                "Song": { "title": [{ "plain_text": title, "text": { "content": title } }] },
                "ID": { "number": 12 },
                "Properties": { "multi_select": [{ "name": "Draft" }, { "name": "Final" }] },
                "Link": { "url": "https://assets.test/a.mp3" }
            }
        })
    }

    #[test]
    fn create_body_omits_absent_id_and_link() {
        let store = store_for("http://localhost");
        let draft = RecordDraft {
            title: "Rough Idea".to_string(),
            id: None,
            status_tags: ["Unknown".to_string()].into_iter().collect(),
            asset_url: None,
        };
        let body = store.create_body(&draft);
        assert_eq!(body["parent"]["database_id"], "db");
        assert_eq!(
            body["properties"]["Song"]["title"][0]["text"]["content"],
            "Rough Idea"
        );
        assert!(body["properties"].get("ID").is_none());
        assert!(body["properties"].get("Link").is_none());
        assert_eq!(
            body["properties"]["Properties"]["multi_select"],
            json!([{ "name": "Unknown" }])
        );
    }

    #[test]
    fn pages_parse_into_records() {
        let store = store_for("http://localhost");
        let record = store.parse_page(&page("p1", "My Song")).expect("parse");
        assert_eq!(record.record_id, "p1");
        assert_eq!(record.title, "My Song");
        assert_eq!(record.id, Some(12));
        assert_eq!(record.status_tags.len(), 2);
        assert_eq!(record.asset_url.as_deref(), Some("https://assets.test/a.mp3"));
        assert!(!record.archived);
    }

    #[test]
    fn title_query_filters_on_title_property() {
        let store = store_for("http://localhost");
        let body = store.query_body(&RecordQuery::TitleEquals("My Song".into()), Some("c1"));
        assert_eq!(body["filter"]["property"], "Song");
        assert_eq!(body["filter"]["title"]["equals"], "My Song");
        assert_eq!(body["start_cursor"], "c1");
    }

    #[tokio::test]
    async fn full_scan_follows_cursors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .and(body_json(json!({ "page_size": 100, "start_cursor": "next-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [page("p2", "Beta")],
                "has_more": false,
                "next_cursor": null
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .and(body_json(json!({ "page_size": 100 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [page("p1", "Alpha")],
                "has_more": true,
                "next_cursor": "next-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server.uri());
        let records = fetch_all(&store).await.expect("scan");
        let titles = records.iter().map(|r| r.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn archive_patches_archived_flag() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/pages/p1"))
            .and(body_partial_json(json!({ "archived": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("p1", "Alpha")))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server.uri());
        store.archive("p1").await.expect("archive");
    }
}
