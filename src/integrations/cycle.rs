//! Cycle GraphQL operations
//!
//! The three calls the autotagger needs, each a fixed GraphQL document sent
//! through [`with_retry`]. Responses are decoded into structs whose every
//! field is optional: a missing `data`, a null node or an absent nested field
//! all mean "not found", never a panic.

use super::retry::{with_retry, RetryConfig, Sleeper, TokioSleeper};
use super::transport::GraphQLTransport;
use crate::{AutotagError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const WORKSPACE_BY_SLUG_QUERY: &str = r#"
    query workspaceBySlug($slug: DefaultString!) {
        getProductBySlug(slug: $slug) {
            id
        }
    }
"#;

const FETCH_DOC_QUERY: &str = r#"
    query fetchDoc($docId: ID!) {
        node(id: $docId) {
            ... on Doc {
                id
                title
                doctype {
                    id
                    name
                }
                assignee {
                    id
                    email
                    firstName
                    lastName
                }
            }
        }
    }
"#;

const UPDATE_DOC_SELECT_ATTRIBUTE_MUTATION: &str = r#"
    mutation UpdateDocSelectAttribute(
        $docId: ID!,
        $attributeDefinitionId: ID!,
        $value: DocAttributeValueInput!
    ) {
        changeDocAttributeValue(
            docId: $docId,
            attributeDefinitionId: $attributeDefinitionId,
            value: $value
        ) {
            __typename
            ... on DocAttributeSingleSelect {
                id
                value {
                    __typename
                    id
                    value
                }
            }
        }
    }
"#;

/// GraphQL response wrapper
#[derive(Debug, Clone, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphQLError {
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkspaceBySlugData {
    #[serde(rename = "getProductBySlug")]
    product: Option<ProductNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductNode {
    id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FetchDocData {
    node: Option<DocumentDetail>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChangeAttributeData {
    #[serde(rename = "changeDocAttributeValue")]
    change: Option<MutationResult>,
}

/// Doc node with its doctype and assignee
///
/// A node that is not a `Doc` decodes with every field `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub id: Option<String>,
    pub title: Option<String>,
    pub doctype: Option<Doctype>,
    pub assignee: Option<Assignee>,
}

impl DocumentDetail {
    /// Doctype name, if the doc has one
    pub fn doctype_name(&self) -> Option<&str> {
        self.doctype.as_ref().and_then(|d| d.name.as_deref())
    }

    /// True when the node carried no Doc fields at all
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.title.is_none()
            && self.doctype.is_none()
            && self.assignee.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctype {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// The customer attached to a feedback doc
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
}

/// Attribute record returned by `changeDocAttributeValue`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    #[serde(rename = "__typename", default, skip_serializing_if = "Option::is_none")]
    pub typename: Option<String>,

    /// Attribute id on the doc
    #[serde(rename = "id")]
    pub attribute_id: Option<String>,

    /// Option now selected
    #[serde(rename = "value")]
    pub new_value: Option<SelectValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectValue {
    pub id: Option<String>,
    pub value: Option<String>,
}

/// Client for the Cycle GraphQL API
pub struct CycleClient<T: GraphQLTransport> {
    transport: T,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<T: GraphQLTransport> CycleClient<T> {
    /// Create a client with the default retry policy (3 attempts, 1s apart)
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
            sleeper: Arc::new(TokioSleeper::new()),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Execute a GraphQL document with retry and decode its `data`
    ///
    /// Returns `Ok(None)` when the body is null, not an object, or has no `data`.
    async fn graphql<D: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<Option<D>> {
        crate::metrics::record_graphql_request(operation);

        let body = with_retry(&self.retry, self.sleeper.as_ref(), self.transport.endpoint(), || {
            self.transport.execute(query, variables.clone())
        })
        .await?;

        // A null or non-object body carries no data
        if !body.is_object() {
            debug!(operation = operation, "GraphQL response body is not an object");
            return Ok(None);
        }

        let response: GraphQLResponse<D> =
            serde_json::from_value(body).map_err(|e| AutotagError::MalformedResponse {
                operation,
                message: e.to_string(),
            })?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let error_msg = errors
                .iter()
                .map(|e| e.message.as_deref().unwrap_or("unknown error"))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(operation = operation, errors = %error_msg, "GraphQL response carried errors");
        }

        Ok(response.data)
    }

    /// Look up a workspace id by its slug
    pub async fn resolve_workspace_id(&self, slug: &str) -> Result<Option<String>> {
        debug!(slug = %slug, "Resolving workspace id");

        let data: Option<WorkspaceBySlugData> = self
            .graphql(
                "workspace_by_slug",
                WORKSPACE_BY_SLUG_QUERY,
                serde_json::json!({ "slug": slug }),
            )
            .await?;

        Ok(data.and_then(|d| d.product).and_then(|p| p.id))
    }

    /// Fetch a doc with its doctype and assignee
    pub async fn fetch_document(&self, doc_id: &str) -> Result<Option<DocumentDetail>> {
        debug!(doc_id = %doc_id, "Fetching document");

        let data: Option<FetchDocData> = self
            .graphql(
                "fetch_doc",
                FETCH_DOC_QUERY,
                serde_json::json!({ "docId": doc_id }),
            )
            .await?;

        Ok(data.and_then(|d| d.node).filter(|doc| !doc.is_empty()))
    }

    /// Set a select attribute on a doc to the given option
    pub async fn mutate_select_attribute(
        &self,
        doc_id: &str,
        attribute_definition_id: &str,
        select_value_id: &str,
    ) -> Result<Option<MutationResult>> {
        info!(
            doc_id = %doc_id,
            attribute_definition_id = %attribute_definition_id,
            select_value_id = %select_value_id,
            "Updating doc select attribute"
        );

        let data: Option<ChangeAttributeData> = self
            .graphql(
                "change_doc_attribute",
                UPDATE_DOC_SELECT_ATTRIBUTE_MUTATION,
                serde_json::json!({
                    "docId": doc_id,
                    "attributeDefinitionId": attribute_definition_id,
                    "value": { "select": select_value_id },
                }),
            )
            .await?;

        Ok(data.and_then(|d| d.change))
    }
}
