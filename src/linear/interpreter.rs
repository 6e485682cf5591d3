//! Linear effect interpreter.
//!
//! Each `TargetEffect` maps onto one GraphQL operation. Creates are sent once
//! (`RetryPolicy::NoRetry`); everything else retries transient failures.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::effects::{
    IssueUpdate, LabelFilter, LabelMatch, MutationResult, NewAttachment, NewComment, NewCycle,
    NewIssue, NewProject, TargetEffect, TargetInterpreter, TargetIssue, TargetLabel,
    TargetResponse, TeamRef,
};
use crate::transport::{Remote, RemoteApiError, RetryConfig, RetryPolicy, retry_with_backoff};

use super::client::LinearClient;

const ISSUE_CREATE: &str = r#"
mutation($input: IssueCreateInput!) {
    issueCreate(input: $input) { success issue { id } }
}"#;

const ISSUE_QUERY: &str = r#"
query($id: String!) {
    issue(id: $id) {
        id
        number
        url
        team { id key }
        assignee { id }
        labels { nodes { id } }
    }
}"#;

const ISSUE_UPDATE: &str = r#"
mutation($id: String!, $input: IssueUpdateInput!) {
    issueUpdate(id: $id, input: $input) { success issue { id } }
}"#;

const ATTACHMENT_CREATE: &str = r#"
mutation($input: AttachmentCreateInput!) {
    attachmentCreate(input: $input) { success attachment { id } }
}"#;

const COMMENT_CREATE: &str = r#"
mutation($input: CommentCreateInput!) {
    commentCreate(input: $input) { success comment { id } }
}"#;

const COMMENT_UPDATE: &str = r#"
mutation($id: String!, $input: CommentUpdateInput!) {
    commentUpdate(id: $id, input: $input) { success comment { id } }
}"#;

const CYCLE_CREATE: &str = r#"
mutation($input: CycleCreateInput!) {
    cycleCreate(input: $input) { success cycle { id } }
}"#;

const PROJECT_CREATE: &str = r#"
mutation($input: ProjectCreateInput!) {
    projectCreate(input: $input) { success project { id } }
}"#;

const LABELS_QUERY: &str = r#"
query($filter: IssueLabelFilter, $includeArchived: Boolean) {
    issueLabels(filter: $filter, includeArchived: $includeArchived, first: 250) {
        nodes { id name }
    }
}"#;

const GITHUB_ICON_URL: &str =
    "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";

/// A GraphQL operation ready to send, plus how to read its answer.
struct Operation {
    query: &'static str,
    variables: Value,
    kind: OperationKind,
    policy: RetryPolicy,
}

enum OperationKind {
    /// `{ <field>: { success, <entity>: { id } } }`
    Mutation {
        field: &'static str,
        entity: &'static str,
    },
    Issue,
    Labels,
}

impl Operation {
    fn mutation(
        query: &'static str,
        variables: Value,
        field: &'static str,
        entity: &'static str,
        policy: RetryPolicy,
    ) -> Self {
        Operation {
            query,
            variables,
            kind: OperationKind::Mutation { field, entity },
            policy,
        }
    }
}

impl TargetInterpreter for LinearClient {
    async fn interpret(&self, effect: TargetEffect) -> Result<TargetResponse, RemoteApiError> {
        interpret_target_effect(self, effect, RetryConfig::DEFAULT).await
    }
}

/// Interprets a Linear effect with transport-level retry.
pub async fn interpret_target_effect(
    client: &LinearClient,
    effect: TargetEffect,
    retry_config: RetryConfig,
) -> Result<TargetResponse, RemoteApiError> {
    debug!(?effect, "Executing Linear effect");

    // An empty `or` filter would match every label.
    if matches!(
        &effect,
        TargetEffect::FindLabels(LabelFilter { name: LabelMatch::AnyOf(names), .. }) if names.is_empty()
    ) {
        return Ok(TargetResponse::Labels(Vec::new()));
    }

    let operation = build_operation(effect);
    let data = retry_with_backoff(retry_config, operation.policy, || {
        client.graphql(operation.query, operation.variables.clone())
    })
    .await?;

    match operation.kind {
        OperationKind::Mutation { field, entity } => {
            Ok(TargetResponse::Mutation(read_mutation(&data, field, entity)))
        }
        OperationKind::Issue => read_issue(data).map(TargetResponse::Issue),
        OperationKind::Labels => read_labels(data).map(TargetResponse::Labels),
    }
}

fn build_operation(effect: TargetEffect) -> Operation {
    match effect {
        TargetEffect::CreateIssue(issue) => Operation::mutation(
            ISSUE_CREATE,
            json!({ "input": issue_create_input(&issue) }),
            "issueCreate",
            "issue",
            RetryPolicy::NoRetry,
        ),
        TargetEffect::GetIssue { issue_id } => Operation {
            query: ISSUE_QUERY,
            variables: json!({ "id": issue_id }),
            kind: OperationKind::Issue,
            policy: RetryPolicy::RetryTransient,
        },
        TargetEffect::UpdateIssue { issue_id, update } => Operation::mutation(
            ISSUE_UPDATE,
            json!({ "id": issue_id, "input": issue_update_input(&update) }),
            "issueUpdate",
            "issue",
            RetryPolicy::RetryTransient,
        ),
        TargetEffect::CreateAttachment(attachment) => Operation::mutation(
            ATTACHMENT_CREATE,
            json!({ "input": attachment_input(&attachment) }),
            "attachmentCreate",
            "attachment",
            RetryPolicy::NoRetry,
        ),
        TargetEffect::CreateComment(comment) => Operation::mutation(
            COMMENT_CREATE,
            json!({ "input": comment_input(&comment) }),
            "commentCreate",
            "comment",
            RetryPolicy::NoRetry,
        ),
        TargetEffect::UpdateComment { comment_id, body } => Operation::mutation(
            COMMENT_UPDATE,
            json!({ "id": comment_id, "input": { "body": body } }),
            "commentUpdate",
            "comment",
            RetryPolicy::RetryTransient,
        ),
        TargetEffect::CreateCycle(cycle) => Operation::mutation(
            CYCLE_CREATE,
            json!({ "input": cycle_input(&cycle) }),
            "cycleCreate",
            "cycle",
            RetryPolicy::NoRetry,
        ),
        TargetEffect::CreateProject(project) => Operation::mutation(
            PROJECT_CREATE,
            json!({ "input": project_input(&project) }),
            "projectCreate",
            "project",
            RetryPolicy::NoRetry,
        ),
        TargetEffect::FindLabels(filter) => Operation {
            query: LABELS_QUERY,
            variables: json!({
                "filter": label_filter(&filter),
                "includeArchived": filter.include_archived,
            }),
            kind: OperationKind::Labels,
            policy: RetryPolicy::RetryTransient,
        },
    }
}

// ─── Inputs ───────────────────────────────────────────────────────────────────

fn issue_create_input(issue: &NewIssue) -> Value {
    let mut input = json!({
        "teamId": issue.team_id,
        "title": issue.title,
        "description": issue.description,
        "labelIds": issue.label_ids,
    });
    if let Some(assignee) = &issue.assignee_id {
        input["assigneeId"] = json!(assignee);
    }
    input
}

/// Only set fields are sent. `Some(None)` is sent as an explicit `null`.
fn issue_update_input(update: &IssueUpdate) -> Value {
    let mut input = Map::new();
    if let Some(title) = &update.title {
        input.insert("title".into(), json!(title));
    }
    if let Some(description) = &update.description {
        input.insert("description".into(), json!(description));
    }
    if let Some(state) = &update.state_id {
        input.insert("stateId".into(), json!(state));
    }
    if let Some(assignee) = &update.assignee_id {
        input.insert("assigneeId".into(), json!(assignee));
    }
    if let Some(priority) = &update.priority {
        input.insert("priority".into(), json!(priority));
    }
    if let Some(labels) = &update.label_ids {
        input.insert("labelIds".into(), json!(labels));
    }
    if let Some(cycle) = &update.cycle_id {
        input.insert("cycleId".into(), json!(cycle));
    }
    if let Some(project) = &update.project_id {
        input.insert("projectId".into(), json!(project));
    }
    Value::Object(input)
}

fn attachment_input(attachment: &NewAttachment) -> Value {
    json!({
        "issueId": attachment.issue_id,
        "title": attachment.title,
        "subtitle": attachment.subtitle,
        "url": attachment.url,
        "iconUrl": GITHUB_ICON_URL,
    })
}

fn comment_input(comment: &NewComment) -> Value {
    let mut input = json!({
        "issueId": comment.issue_id,
        "body": comment.body,
    });
    if let Some(name) = &comment.display_name {
        input["createAsUser"] = json!(name);
    }
    if let Some(icon) = &comment.display_icon_url {
        input["displayIconUrl"] = json!(icon);
    }
    input
}

fn cycle_input(cycle: &NewCycle) -> Value {
    json!({
        "teamId": cycle.team_id,
        "name": cycle.name,
        "description": cycle.description,
        "startsAt": cycle.starts_at.to_rfc3339(),
        "endsAt": cycle.ends_at.map(|d| d.to_rfc3339()),
    })
}

fn project_input(project: &NewProject) -> Value {
    // Project dates are timeless (`YYYY-MM-DD`).
    json!({
        "teamIds": project.team_ids,
        "name": project.name,
        "description": project.description,
        "startDate": project.start_date.format("%Y-%m-%d").to_string(),
        "targetDate": project.target_date.map(|d| d.format("%Y-%m-%d").to_string()),
    })
}

fn label_filter(filter: &LabelFilter) -> Value {
    let mut value = match &filter.name {
        LabelMatch::AnyOf(names) => json!({
            "or": names
                .iter()
                .map(|n| json!({ "name": { "eqIgnoreCase": n.trim() } }))
                .collect::<Vec<_>>(),
        }),
        LabelMatch::Contains(fragment) => json!({
            "name": { "containsIgnoreCase": fragment },
        }),
    };
    if let Some(team) = &filter.team_id {
        value["team"] = json!({ "id": { "eq": team } });
    }
    value
}

// ─── Responses ────────────────────────────────────────────────────────────────

fn read_mutation(data: &Value, field: &str, entity: &str) -> MutationResult {
    let payload = &data[field];
    MutationResult {
        success: payload["success"].as_bool().unwrap_or(false),
        id: payload[entity]["id"].as_str().map(str::to_string),
    }
}

#[derive(Debug, Deserialize)]
struct RawIssueData {
    issue: Option<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: String,
    number: u64,
    url: String,
    team: Option<RawTeam>,
    assignee: Option<RawId>,
    labels: Option<RawConnection<RawId>>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct RawId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawConnection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLabelsData {
    issue_labels: RawConnection<TargetLabel>,
}

fn read_issue(data: Value) -> Result<Option<TargetIssue>, RemoteApiError> {
    let raw: RawIssueData = serde_json::from_value(data).map_err(|e| {
        RemoteApiError::permanent(Remote::Linear, format!("unexpected issue shape: {e}"))
    })?;
    Ok(raw.issue.map(|issue| TargetIssue {
        id: issue.id,
        number: issue.number,
        url: issue.url,
        team: issue.team.map(|t| TeamRef { id: t.id, key: t.key }),
        assignee_id: issue.assignee.map(|a| a.id),
        label_ids: issue
            .labels
            .map(|l| l.nodes.into_iter().map(|n| n.id).collect())
            .unwrap_or_default(),
    }))
}

fn read_labels(data: Value) -> Result<Vec<TargetLabel>, RemoteApiError> {
    let raw: RawLabelsData = serde_json::from_value(data).map_err(|e| {
        RemoteApiError::permanent(Remote::Linear, format!("unexpected labels shape: {e}"))
    })?;
    Ok(raw.issue_labels.nodes)
}
