use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    error::{BoosterError, BoosterResult},
    model::{Trainee, TraineeId},
    store::TraineeStore,
};

/// Who a bulk operation applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSpec {
    /// One trainee by id.
    Trainee {
        /// Trainee identifier.
        id: TraineeId,
    },
    /// A group, optionally narrowed to selected members.
    Group {
        /// Group name.
        name: String,
        /// Sub-selection; empty means the whole group.
        #[serde(default)]
        members: Vec<TraineeId>,
    },
}

impl TargetSpec {
    /// Single trainee target.
    pub fn trainee(id: impl Into<TraineeId>) -> Self {
        Self::Trainee { id: id.into() }
    }

    /// Whole-group target.
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Group target narrowed to `members`.
    pub fn group_members<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TraineeId>,
    {
        Self::Group {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Rejects blank identifiers before any store access.
    pub fn validate(&self) -> BoosterResult<()> {
        match self {
            Self::Trainee { id } if id.trim().is_empty() => {
                Err(BoosterError::validation("trainee id must not be empty"))
            }
            Self::Group { name, .. } if name.trim().is_empty() => {
                Err(BoosterError::validation("group name must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Expands a [`TargetSpec`] against the current directory.
///
/// Nothing is cached; every call reads the store.
#[derive(Clone, Copy)]
pub struct TargetResolver<'a> {
    trainees: &'a dyn TraineeStore,
}

impl<'a> TargetResolver<'a> {
    /// Resolver reading from `trainees`.
    #[must_use]
    pub fn new(trainees: &'a dyn TraineeStore) -> Self {
        Self { trainees }
    }

    /// Concrete, de-duplicated trainee list in directory order.
    ///
    /// A group that leaves nobody selected is a validation error.
    pub async fn resolve(&self, target: &TargetSpec) -> BoosterResult<Vec<Trainee>> {
        target.validate()?;
        match target {
            TargetSpec::Trainee { id } => Ok(vec![self.trainees.get(id.trim()).await?]),
            TargetSpec::Group { name, members } => {
                let wanted: IndexSet<&str> = members
                    .iter()
                    .map(|member| member.trim())
                    .filter(|member| !member.is_empty())
                    .collect();
                let mut seen = IndexSet::new();
                let resolved: Vec<Trainee> = self
                    .trainees
                    .list_by_group(name.trim())
                    .await?
                    .into_iter()
                    .filter(|trainee| wanted.is_empty() || wanted.contains(trainee.id.as_str()))
                    .filter(|trainee| seen.insert(trainee.id.clone()))
                    .collect();
                if resolved.is_empty() {
                    return Err(BoosterError::validation(format!(
                        "target group {} resolved to no trainees",
                        name.trim()
                    )));
                }
                Ok(resolved)
            }
        }
    }
}
