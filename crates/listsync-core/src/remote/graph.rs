//! Microsoft Graph implementation of [`RemoteStore`] for SharePoint lists.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{
    api_error, AccessToken, ClientCredentialsAuth, Collection, Page, RemoteError, RemoteField,
    RemoteResult, RemoteStore, TokenProvider,
};
use crate::config::GraphConfig;
use crate::models::{Record, Value};
use crate::schema::DeclaredType;

const ACCEPTED_STATUS: [u16; 3] = [200, 201, 204];

#[derive(Debug, Default)]
struct TokenState {
    token: Option<AccessToken>,
    /// Mutating calls issued with the current token.
    writes: u64,
}

/// SharePoint list client over the Graph REST API.
///
/// The bearer token is cached and replaced when it expires or after
/// `token_refresh_rows` mutating calls, whichever comes first.
#[derive(Debug)]
pub struct GraphListClient<A: TokenProvider = ClientCredentialsAuth> {
    client: Client,
    site_url: String,
    auth: A,
    token_refresh_rows: u64,
    state: Mutex<TokenState>,
}

impl GraphListClient<ClientCredentialsAuth> {
    pub fn from_config(config: &GraphConfig) -> RemoteResult<Self> {
        Self::new(config, ClientCredentialsAuth::new(config)?)
    }
}

impl<A: TokenProvider> GraphListClient<A> {
    pub fn new(config: &GraphConfig, auth: A) -> RemoteResult<Self> {
        Ok(Self {
            client: Client::builder().timeout(config.http_timeout).build()?,
            site_url: config.site_url(),
            auth,
            token_refresh_rows: config.token_refresh_rows.max(1),
            state: Mutex::new(TokenState::default()),
        })
    }

    async fn bearer(&self, mutating: bool) -> RemoteResult<String> {
        let mut state = self.state.lock().await;
        let rotate = mutating && state.writes >= self.token_refresh_rows;
        let stale = state.token.as_ref().map_or(true, AccessToken::is_expired);

        if rotate || stale {
            if rotate {
                tracing::info!(
                    "Refreshing access token after {} writes",
                    state.writes
                );
            } else {
                tracing::debug!("Fetching access token");
            }
            state.token = Some(self.auth.fetch_token().await?);
            state.writes = 0;
        }
        if mutating {
            state.writes += 1;
        }

        state
            .token
            .as_ref()
            .map(|token| token.token.clone())
            .ok_or_else(|| RemoteError::Auth("no access token available".to_string()))
    }

    fn list_url(&self, collection_id: &str) -> String {
        format!(
            "{}/lists/{}",
            self.site_url,
            urlencoding::encode(collection_id)
        )
    }

    fn item_url(&self, collection_id: &str, remote_id: &str) -> String {
        format!(
            "{}/items/{}",
            self.list_url(collection_id),
            urlencoding::encode(remote_id)
        )
    }

    async fn send(&self, request: RequestBuilder, mutating: bool) -> RemoteResult<Response> {
        let token = self.bearer(mutating).await?;
        let response = request
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if ACCEPTED_STATUS.contains(&status.as_u16()) {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(api_error(status, &body).to_string()));
        }
        Err(api_error(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> RemoteResult<T> {
        let response = self.send(self.client.get(url), false).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }

    /// Follow `@odata.nextLink` until every entry of a collection endpoint is read.
    async fn get_all<T: DeserializeOwned>(&self, url: String) -> RemoteResult<Vec<T>> {
        let mut entries = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: ODataPage<T> = self.get_json(&url).await?;
            entries.extend(page.value);
            next = page.next_link;
        }
        Ok(entries)
    }
}

impl<A: TokenProvider> RemoteStore for GraphListClient<A> {
    async fn fetch_collections(&self) -> RemoteResult<Vec<Collection>> {
        let lists: Vec<GraphList> = self
            .get_all(format!("{}/lists?$select=id,displayName", self.site_url))
            .await?;
        Ok(lists
            .into_iter()
            .map(|list| Collection {
                id: list.id,
                name: list.display_name.unwrap_or_default(),
            })
            .collect())
    }

    async fn fetch_fields(&self, collection_id: &str) -> RemoteResult<Vec<RemoteField>> {
        let columns: Vec<GraphColumn> = self
            .get_all(format!("{}/columns", self.list_url(collection_id)))
            .await?;
        Ok(columns.into_iter().map(GraphColumn::into_field).collect())
    }

    async fn fetch_page(
        &self,
        collection_id: &str,
        fields: &[String],
        cursor: Option<&str>,
    ) -> RemoteResult<Page> {
        let url = cursor.map_or_else(
            || items_url(&self.list_url(collection_id), fields),
            str::to_string,
        );
        let page: ODataPage<GraphItem> = self.get_json(&url).await?;

        let records = page
            .value
            .into_iter()
            .map(|item| {
                let mut record = Record::from_json_object(&item.fields);
                record.remote_id = Some(item.id);
                record
            })
            .collect();
        Ok(Page {
            records,
            next_cursor: page.next_link,
        })
    }

    async fn create(&self, collection_id: &str, record: &Record) -> RemoteResult<String> {
        let body = serde_json::json!({ "fields": field_payload(record, true) });
        let request = self
            .client
            .post(format!("{}/items", self.list_url(collection_id)))
            .json(&body);
        let response = self.send(request, true).await?;
        let created = response
            .json::<GraphCreated>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(created.id)
    }

    async fn update(&self, collection_id: &str, remote_id: &str, record: &Record) -> RemoteResult<()> {
        let request = self
            .client
            .patch(format!("{}/fields", self.item_url(collection_id, remote_id)))
            .json(&field_payload(record, false));
        self.send(request, true).await?;
        Ok(())
    }

    async fn delete(&self, collection_id: &str, remote_id: &str) -> RemoteResult<()> {
        let request = self.client.delete(self.item_url(collection_id, remote_id));
        self.send(request, true).await?;
        Ok(())
    }
}

fn items_url(list_url: &str, fields: &[String]) -> String {
    let select: Vec<String> = fields
        .iter()
        .map(|field| urlencoding::encode(field).into_owned())
        .collect();
    format!("{list_url}/items?expand=fields(select={})", select.join(","))
}

/// JSON object of a record's fields. Creates leave empty fields out.
fn field_payload(record: &Record, skip_null: bool) -> serde_json::Map<String, serde_json::Value> {
    record
        .fields
        .iter()
        .filter(|(_, value)| !(skip_null && matches!(value, Value::Null)))
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct ODataPage<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphList {
    id: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphItem {
    id: String,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphColumn {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    read_only: bool,
    number: Option<NumberFacet>,
    date_time: Option<DateTimeFacet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NumberFacet {
    decimal_places: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateTimeFacet {
    format: Option<String>,
}

impl GraphColumn {
    fn declared_type(&self) -> DeclaredType {
        if let Some(number) = &self.number {
            return match number.decimal_places.as_deref() {
                Some("none") => DeclaredType::Integer,
                Some("one") => DeclaredType::Decimal(1),
                _ => DeclaredType::Decimal(2),
            };
        }
        if let Some(date_time) = &self.date_time {
            return if date_time.format.as_deref() == Some("dateOnly") {
                DeclaredType::Date
            } else {
                DeclaredType::DateTime
            };
        }
        DeclaredType::String
    }

    fn into_field(self) -> RemoteField {
        let declared_type = self.declared_type();
        RemoteField {
            name: self.display_name.unwrap_or_else(|| self.name.clone()),
            name_id: self.name,
            read_only: self.read_only,
            declared_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::unix_timestamp_now;

    #[derive(Debug, Default)]
    struct CountingAuth {
        fetches: AtomicUsize,
    }

    impl TokenProvider for CountingAuth {
        async fn fetch_token(&self) -> RemoteResult<AccessToken> {
            let count = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                token: format!("token-{count}"),
                expires_at: unix_timestamp_now() + 3_600,
            })
        }
    }

    fn config(refresh_rows: &str) -> GraphConfig {
        let refresh_rows = refresh_rows.to_string();
        GraphConfig::from_lookup(move |name| match name {
            "CLIENT_ID" => Some("client".to_string()),
            "CLIENT_SECRET" => Some("secret".to_string()),
            "TENANT_ID" => Some("tenant".to_string()),
            "SITE_ID" => Some("contoso.sharepoint.com,abc,def".to_string()),
            "LISTSYNC_TOKEN_REFRESH_ROWS" => Some(refresh_rows.clone()),
            _ => None,
        })
        .unwrap()
    }

    fn columns(json: &str) -> Vec<RemoteField> {
        let page: ODataPage<GraphColumn> = serde_json::from_str(json).unwrap();
        page.value.into_iter().map(GraphColumn::into_field).collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn token_is_reused_for_reads() {
        let client = GraphListClient::new(&config("2"), CountingAuth::default()).unwrap();
        for _ in 0..5 {
            assert_eq!(client.bearer(false).await.unwrap(), "token-1");
        }
        assert_eq!(client.auth.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn token_rotates_after_configured_writes() {
        let client = GraphListClient::new(&config("2"), CountingAuth::default()).unwrap();
        let mut tokens = Vec::new();
        for _ in 0..5 {
            tokens.push(client.bearer(true).await.unwrap());
        }
        assert_eq!(
            tokens,
            ["token-1", "token-1", "token-2", "token-2", "token-3"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn expired_token_is_replaced() {
        let client = GraphListClient::new(&config("100"), CountingAuth::default()).unwrap();
        client.state.lock().await.token = Some(AccessToken {
            token: "old".to_string(),
            expires_at: unix_timestamp_now() - 1,
        });
        assert_eq!(client.bearer(false).await.unwrap(), "token-1");
    }

    #[test]
    fn urls_encode_site_list_and_item_ids() {
        let client = GraphListClient::new(&config("10"), CountingAuth::default()).unwrap();
        assert_eq!(
            client.item_url("list 1", "42"),
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com%2Cabc%2Cdef/lists/list%201/items/42"
        );
        assert_eq!(
            items_url("https://host/lists/l", &["field_1".to_string(), "Edad".to_string()]),
            "https://host/lists/l/items?expand=fields(select=field_1,Edad)"
        );
    }

    #[test]
    fn column_facets_map_to_declared_types() {
        let fields = columns(
            r#"{"value":[
                {"name":"field_1","displayName":"edad","number":{"decimalPlaces":"none"}},
                {"name":"field_2","displayName":"nota","number":{"decimalPlaces":"one"}},
                {"name":"field_3","displayName":"saldo","number":{"decimalPlaces":"automatic"}},
                {"name":"field_4","displayName":"alta","dateTime":{"format":"dateOnly"}},
                {"name":"field_5","displayName":"visto","dateTime":{"format":"dateTime"}},
                {"name":"field_6","displayName":"ciudad","text":{}},
                {"name":"field_7","displayName":"estado","choice":{"choices":["a","b"]}},
                {"name":"Modified","displayName":"Modificado","readOnly":true,"dateTime":{}}
            ]}"#,
        );

        let types: Vec<(String, DeclaredType)> = fields
            .iter()
            .map(|field| (field.name.clone(), field.declared_type))
            .collect();
        assert_eq!(
            types,
            [
                ("edad".to_string(), DeclaredType::Integer),
                ("nota".to_string(), DeclaredType::Decimal(1)),
                ("saldo".to_string(), DeclaredType::Decimal(2)),
                ("alta".to_string(), DeclaredType::Date),
                ("visto".to_string(), DeclaredType::DateTime),
                ("ciudad".to_string(), DeclaredType::String),
                ("estado".to_string(), DeclaredType::String),
                ("Modificado".to_string(), DeclaredType::DateTime),
            ]
        );
        assert!(fields[7].read_only);
        assert_eq!(fields[0].name_id, "field_1");
    }

    #[test]
    fn item_pages_expose_next_link() {
        let page: ODataPage<GraphItem> = serde_json::from_str(
            r#"{"value":[{"id":"7","fields":{"field_1":"Juan","field_2":30}}],
                "@odata.nextLink":"https://host/next"}"#,
        )
        .unwrap();
        assert_eq!(page.next_link.as_deref(), Some("https://host/next"));
        assert_eq!(page.value[0].id, "7");
        assert_eq!(
            Record::from_json_object(&page.value[0].fields).get("field_2"),
            Some(&Value::Integer(30))
        );
    }

    #[test]
    fn create_payload_omits_empty_fields() {
        let record = Record::new()
            .with("field_1", "Juan")
            .with("field_2", Value::Null);
        let create = field_payload(&record, true);
        let update = field_payload(&record, false);

        assert_eq!(create.len(), 1);
        assert_eq!(update.get("field_2"), Some(&serde_json::Value::Null));
    }
}
