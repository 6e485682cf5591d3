//! Shared fixtures and recording interpreters for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::connector::TrackerConnector;
use crate::effects::{
    LabelMatch, MutationResult, SourceComment, SourceEffect, SourceInterpreter, SourceIssue,
    SourceResponse, TargetEffect, TargetInterpreter, TargetIssue, TargetLabel, TargetResponse,
    TeamRef,
};
use crate::rewrite::Rewriter;
use crate::transport::{Remote, RemoteApiError};
use crate::types::RepoName;

pub mod fixtures {
    use crate::store::Tables;
    use crate::types::{
        EncryptedSecret, GithubUserId, IssueId, IssueNumber, RepoId, RepoName, SourceRepo, Sync,
        SyncLink, SyncedIssue, TargetTeam,
    };

    pub const REPO: RepoId = RepoId(100);
    pub const USER: GithubUserId = GithubUserId(7);
    pub const SECRET: &str = "s3cret";
    pub const TEAM_ID: &str = "team-1";
    pub const LINEAR_USER: &str = "lin-user-7";

    /// Source issue IDs are derived from the number so fixtures stay consistent.
    pub fn issue_id(number: u64) -> IssueId {
        IssueId(9000 + number)
    }

    pub fn repo() -> SourceRepo {
        SourceRepo {
            repo_id: REPO,
            repo_name: RepoName::new("acme", "widgets"),
            webhook_secret: Some(SECRET.to_string()),
        }
    }

    pub fn team() -> TargetTeam {
        TargetTeam {
            team_id: TEAM_ID.to_string(),
            team_name: "Team".to_string(),
            public_label_id: Some("label-public".to_string()),
            to_do_state_id: "state-todo".to_string(),
            done_state_id: "state-done".to_string(),
            canceled_state_id: "state-canceled".to_string(),
        }
    }

    pub fn sync() -> Sync {
        Sync {
            id: 0,
            github_repo_id: REPO,
            github_user_id: Some(USER),
            linear_user_id: Some(LINEAR_USER.to_string()),
            linear_team_id: TEAM_ID.to_string(),
            github_api_key: EncryptedSecret {
                ciphertext: "00".to_string(),
                iv: "00".to_string(),
            },
            linear_api_key: EncryptedSecret {
                ciphertext: "00".to_string(),
                iv: "00".to_string(),
            },
        }
    }

    pub fn link() -> SyncLink {
        SyncLink {
            sync: sync(),
            repo: repo(),
            team: team(),
        }
    }

    /// Tables holding one personal link for `USER` on `REPO`.
    pub fn tables_with_link() -> Tables {
        let mut tables = Tables::new();
        tables.upsert_repo(repo());
        tables.upsert_team(team());
        tables.create_sync(sync()).expect("fresh tables");
        tables
    }

    /// A mirror of source issue `number` as `TEAM-<linear_number>`.
    pub fn synced_issue(number: u64, linear_number: u64) -> SyncedIssue {
        SyncedIssue {
            github_repo_id: REPO,
            github_issue_number: IssueNumber(number),
            github_issue_id: issue_id(number),
            linear_issue_id: format!("lin-issue-{linear_number}"),
            linear_issue_number: linear_number,
            linear_team_id: TEAM_ID.to_string(),
        }
    }
}

/// Records every GitHub effect and answers from canned data.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    inner: Arc<Mutex<MockSourceState>>,
}

#[derive(Debug, Default)]
struct MockSourceState {
    calls: Vec<SourceEffect>,
    issue: Option<SourceIssue>,
    comments: Vec<SourceComment>,
    body_html: Option<String>,
    fail_updates: bool,
}

impl MockSource {
    pub fn with_issue(self, issue: SourceIssue) -> Self {
        self.inner.lock().unwrap().issue = Some(issue);
        self
    }

    pub fn with_comments(self, comments: Vec<SourceComment>) -> Self {
        self.inner.lock().unwrap().comments = comments;
        self
    }

    pub fn with_body_html(self, html: &str) -> Self {
        self.inner.lock().unwrap().body_html = Some(html.to_string());
        self
    }

    /// Makes issue patches and label changes fail with a server error.
    pub fn failing_updates(self) -> Self {
        self.inner.lock().unwrap().fail_updates = true;
        self
    }

    pub fn calls(&self) -> Vec<SourceEffect> {
        self.inner.lock().unwrap().calls.clone()
    }
}

impl SourceInterpreter for MockSource {
    async fn interpret(&self, effect: SourceEffect) -> Result<SourceResponse, RemoteApiError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(effect.clone());

        let mutating = matches!(
            effect,
            SourceEffect::UpdateIssue { .. }
                | SourceEffect::AddLabels { .. }
                | SourceEffect::RemoveLabel { .. }
        );
        if mutating && state.fail_updates {
            return Err(RemoteApiError::permanent(Remote::GitHub, "mock failure").with_status(500));
        }

        match effect {
            SourceEffect::GetIssue { number } => state
                .issue
                .clone()
                .filter(|issue| issue.number == number)
                .map(SourceResponse::Issue)
                .ok_or_else(|| {
                    RemoteApiError::permanent(Remote::GitHub, "Not Found").with_status(404)
                }),
            SourceEffect::UpdateIssue { .. } => Ok(SourceResponse::IssueUpdated),
            SourceEffect::ListComments { .. } => Ok(SourceResponse::Comments(state.comments.clone())),
            SourceEffect::GetBodyHtml { .. } => Ok(SourceResponse::BodyHtml(state.body_html.clone())),
            SourceEffect::AddLabels { .. } => Ok(SourceResponse::LabelsAdded),
            SourceEffect::RemoveLabel { .. } => Ok(SourceResponse::LabelRemoved),
        }
    }
}

/// Records every Linear effect and keeps a tiny in-memory Linear.
///
/// Created issues are numbered from `next_number` (7 by default) in team
/// `TEAM`; updates to assignee and labels are applied to stored issues.
#[derive(Debug, Clone)]
pub struct MockTarget {
    inner: Arc<Mutex<MockTargetState>>,
}

#[derive(Debug)]
struct MockTargetState {
    calls: Vec<TargetEffect>,
    issues: HashMap<String, TargetIssue>,
    labels: Vec<TargetLabel>,
    next_number: u64,
    next_id: u64,
    fail_mutations: bool,
}

impl Default for MockTarget {
    fn default() -> Self {
        MockTarget {
            inner: Arc::new(Mutex::new(MockTargetState {
                calls: Vec::new(),
                issues: HashMap::new(),
                labels: Vec::new(),
                next_number: 7,
                next_id: 1,
                fail_mutations: false,
            })),
        }
    }
}

impl MockTarget {
    pub fn with_labels(self, labels: &[(&str, &str)]) -> Self {
        self.inner.lock().unwrap().labels = labels
            .iter()
            .map(|(id, name)| TargetLabel {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect();
        self
    }

    /// Seeds an existing issue `lin-issue-<number>` as `TEAM-<number>`.
    pub fn with_issue(self, number: u64, assignee_id: Option<&str>, label_ids: &[&str]) -> Self {
        let issue = TargetIssue {
            id: format!("lin-issue-{number}"),
            number,
            url: format!("https://linear.app/acme/issue/TEAM-{number}"),
            team: Some(TeamRef {
                id: fixtures::TEAM_ID.to_string(),
                key: "TEAM".to_string(),
            }),
            assignee_id: assignee_id.map(str::to_string),
            label_ids: label_ids.iter().map(|s| s.to_string()).collect(),
        };
        self.inner
            .lock()
            .unwrap()
            .issues
            .insert(issue.id.clone(), issue);
        self
    }

    /// Every mutation answers `success: false`.
    pub fn failing_mutations(self) -> Self {
        self.inner.lock().unwrap().fail_mutations = true;
        self
    }

    pub fn calls(&self) -> Vec<TargetEffect> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn issue(&self, id: &str) -> Option<TargetIssue> {
        self.inner.lock().unwrap().issues.get(id).cloned()
    }
}

impl MockTargetState {
    fn mutation(&mut self, prefix: &str) -> TargetResponse {
        if self.fail_mutations {
            return TargetResponse::Mutation(MutationResult {
                success: false,
                id: None,
            });
        }
        let id = format!("{prefix}-{}", self.next_id);
        self.next_id += 1;
        TargetResponse::Mutation(MutationResult {
            success: true,
            id: Some(id),
        })
    }
}

impl TargetInterpreter for MockTarget {
    async fn interpret(&self, effect: TargetEffect) -> Result<TargetResponse, RemoteApiError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(effect.clone());

        let response = match effect {
            TargetEffect::CreateIssue(new) => {
                if state.fail_mutations {
                    return Ok(state.mutation("issue"));
                }
                let number = state.next_number;
                state.next_number += 1;
                let issue = TargetIssue {
                    id: format!("lin-issue-{number}"),
                    number,
                    url: format!("https://linear.app/acme/issue/TEAM-{number}"),
                    team: Some(TeamRef {
                        id: new.team_id,
                        key: "TEAM".to_string(),
                    }),
                    assignee_id: new.assignee_id,
                    label_ids: new.label_ids,
                };
                let id = issue.id.clone();
                state.issues.insert(id.clone(), issue);
                TargetResponse::Mutation(MutationResult {
                    success: true,
                    id: Some(id),
                })
            }
            TargetEffect::GetIssue { issue_id } => {
                TargetResponse::Issue(state.issues.get(&issue_id).cloned())
            }
            TargetEffect::UpdateIssue { issue_id, update } => {
                if !state.fail_mutations {
                    if let Some(issue) = state.issues.get_mut(&issue_id) {
                        if let Some(assignee) = update.assignee_id {
                            issue.assignee_id = assignee;
                        }
                        if let Some(labels) = update.label_ids {
                            issue.label_ids = labels;
                        }
                    }
                }
                let mut response = state.mutation("update");
                if let TargetResponse::Mutation(result) = &mut response {
                    if result.success {
                        result.id = Some(issue_id);
                    }
                }
                response
            }
            TargetEffect::CreateAttachment(_) => state.mutation("attachment"),
            TargetEffect::CreateComment(_) => state.mutation("comment"),
            TargetEffect::UpdateComment { .. } => state.mutation("comment"),
            TargetEffect::CreateCycle(_) => state.mutation("cycle"),
            TargetEffect::CreateProject(_) => state.mutation("project"),
            TargetEffect::FindLabels(filter) => {
                let labels = state
                    .labels
                    .iter()
                    .filter(|label| match &filter.name {
                        LabelMatch::AnyOf(names) => {
                            names.iter().any(|n| n.eq_ignore_ascii_case(&label.name))
                        }
                        LabelMatch::Contains(part) => label
                            .name
                            .to_lowercase()
                            .contains(&part.to_lowercase()),
                    })
                    .cloned()
                    .collect();
                TargetResponse::Labels(labels)
            }
        };
        Ok(response)
    }
}

/// Hands out clones of one `MockSource` / `MockTarget` pair and records the
/// tokens it was asked to connect with.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub source: MockSource,
    pub target: MockTarget,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(source: MockSource, target: MockTarget) -> Self {
        MockConnector {
            source,
            target,
            tokens: Arc::default(),
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

impl TrackerConnector for MockConnector {
    type Source = MockSource;
    type Target = MockTarget;

    fn source(&self, _repo: &RepoName, token: &str) -> Result<MockSource, RemoteApiError> {
        self.tokens.lock().unwrap().push(token.to_string());
        Ok(self.source.clone())
    }

    fn target(&self, token: &str) -> Result<MockTarget, RemoteApiError> {
        self.tokens.lock().unwrap().push(token.to_string());
        Ok(self.target.clone())
    }
}

/// Rewrites every input to the same text, or to nothing.
#[derive(Debug, Clone)]
pub struct FixedRewriter(pub Option<String>);

impl Rewriter for FixedRewriter {
    async fn reword(&self, _text: &str) -> Option<String> {
        self.0.clone()
    }
}
