use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Group, GroupService, Id, Member, TagGroupSummary};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
struct GroupsResponse {
    groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
struct TagGroupsResponse {
    #[serde(default)]
    tag_groups: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct CreateTagGroupRequest<'a> {
    chat_id: &'a Id,
    name: &'a str,
    members: &'a [Id],
}

#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    chat_id: &'a Id,
    tag_name: &'a str,
}

/// HTTP client for the tag-group service
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chat_path(prefix: &str, chat_id: &Id) -> String {
        format!("{}/{}", prefix, urlencoding::encode(&chat_id.to_string()))
    }

    /// Read the body of a successful response, mapping non-2xx to `ApiError::Status`
    async fn body(path: &str, response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::debug!(path, "GET");
        let response = self.http.get(self.url(path)).send().await?;
        let body = Self::body(path, response).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, payload: &B) -> Result<(), ApiError> {
        tracing::debug!(path, "POST");
        let response = self.http.post(self.url(path)).json(payload).send().await?;
        // Only success/failure matters, the body is implementation-defined
        Self::body(path, response).await.map(|_| ())
    }

    /// Legacy flat listing: opaque display strings, shown verbatim
    pub async fn legacy_member_names(&self) -> Result<Vec<String>, ApiError> {
        self.get_json("/api/members").await
    }
}

#[async_trait]
impl GroupService for ApiClient {
    async fn list_groups(&self) -> Result<Vec<Group>, ApiError> {
        let response: GroupsResponse = self.get_json("/api/groups").await?;
        Ok(response.groups)
    }

    async fn list_members(&self, chat_id: &Id) -> Result<Vec<Member>, ApiError> {
        self.get_json(&Self::chat_path("/api/members", chat_id)).await
    }

    async fn list_tag_groups(&self, chat_id: &Id) -> Result<Vec<TagGroupSummary>, ApiError> {
        let response: TagGroupsResponse = self
            .get_json(&Self::chat_path("/api/taggroups", chat_id))
            .await?;
        Ok(response
            .tag_groups
            .into_iter()
            .map(|(name, members)| TagGroupSummary {
                member_count: members.as_array().map(Vec::len),
                name,
            })
            .collect())
    }

    async fn create_tag_group(&self, chat_id: &Id, name: &str, members: &[Id]) -> Result<(), ApiError> {
        let request = CreateTagGroupRequest { chat_id, name, members };
        self.post_json("/api/taggroups", &request).await
    }

    async fn trigger(&self, chat_id: &Id, tag_name: &str) -> Result<(), ApiError> {
        self.post_json("/api/trigger", &TriggerRequest { chat_id, tag_name }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{self, MockState, SharedState};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    async fn client_for(state: &SharedState) -> ApiClient {
        let base = mock::spawn(state.clone()).await;
        ApiClient::new(&format!("{}/", base), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_list_groups() {
        let state = Arc::new(Mutex::new(MockState {
            groups: vec![json!({ "chat_id": 1, "title": "Team" }), json!({ "chat_id": -42 })],
            ..Default::default()
        }));
        let client = client_for(&state).await;

        let groups = client.list_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chat_id, Id::Int(1));
        assert_eq!(groups[0].title.as_deref(), Some("Team"));
        assert_eq!(groups[1].display_title(), "Group -42");
    }

    #[tokio::test]
    async fn test_missing_members_is_status_error() {
        let state = Arc::new(Mutex::new(MockState::default()));
        let client = client_for(&state).await;

        let err = client.list_members(&Id::Int(7)).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 404, .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_malformed_members_is_decode_error() {
        let mut members = std::collections::HashMap::new();
        members.insert("3".to_string(), json!({ "not": "a list" }));
        let state = Arc::new(Mutex::new(MockState { members, ..Default::default() }));
        let client = client_for(&state).await;

        let err = client.list_members(&Id::Int(3)).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_created_tag_group_shows_up_on_refetch() {
        let state = Arc::new(Mutex::new(MockState::default()));
        let client = client_for(&state).await;
        let chat = Id::Int(1);

        assert!(client.list_tag_groups(&chat).await.unwrap().is_empty());

        client
            .create_tag_group(&chat, "devs", &[Id::Int(10), Id::Int(11)])
            .await
            .unwrap();

        let tags = client.list_tag_groups(&chat).await.unwrap();
        assert_eq!(
            tags,
            vec![TagGroupSummary {
                name: "devs".to_string(),
                member_count: Some(2),
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_create_is_status_error() {
        let state = Arc::new(Mutex::new(MockState {
            fail_create: true,
            ..Default::default()
        }));
        let client = client_for(&state).await;

        let err = client
            .create_tag_group(&Id::Int(1), "devs", &[Id::Int(10)])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_trigger_sends_chat_and_tag() {
        let state = Arc::new(Mutex::new(MockState::default()));
        let client = client_for(&state).await;

        client.trigger(&Id::Int(-100), "oncall").await.unwrap();

        let triggers = state.lock().unwrap().triggers.clone();
        assert_eq!(triggers, vec![json!({ "chat_id": -100, "tag_name": "oncall" })]);
    }

    #[tokio::test]
    async fn test_legacy_member_names() {
        let state = Arc::new(Mutex::new(MockState {
            legacy_members: vec!["Alice (@alice)".to_string(), "Bob".to_string()],
            ..Default::default()
        }));
        let client = client_for(&state).await;

        let names = client.legacy_member_names().await.unwrap();
        assert_eq!(names, vec!["Alice (@alice)", "Bob"]);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = client.list_groups().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
