//! Up/down votes

use serde::{Deserialize, Serialize};

use super::{ValidationError, ValidationErrors, VoteType};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub vote_type: String,
}

impl VoteRequest {
    pub fn validate(&self) -> Result<VoteType, ValidationErrors> {
        if self.vote_type.trim().is_empty() {
            return Err(ValidationError::Empty { field: "voteType" }.into());
        }
        Ok(VoteType::parse(&self.vote_type)?)
    }
}

/// Who is voting. A vote is keyed on whichever of the two is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Voter {
    pub ip: Option<String>,
    pub session: Option<String>,
}

impl Voter {
    pub fn new(ip: Option<String>, session: Option<String>) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            ip: non_blank(ip),
            session: non_blank(session),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.ip.is_none() && self.session.is_none()
    }
}

/// `voting` member of blog detail and vote responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStats {
    pub enabled: bool,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Option<String>,
}
