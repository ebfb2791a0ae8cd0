//! Review reactions.
//!
//! A reader can mark a review with at most one of four reactions. Each
//! reaction type is an ACF ID-list field on the comment holding the ids of
//! the users who picked it.

use crate::acf::IdList;
use crate::wordpress::{CommentFields, CommentFieldsPatch};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Useful,
    Helpful,
    Insightful,
    Inappropriate,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 4] = [
        ReactionKind::Useful,
        ReactionKind::Helpful,
        ReactionKind::Insightful,
        ReactionKind::Inappropriate,
    ];

    /// Name used in API payloads.
    pub fn name(self) -> &'static str {
        match self {
            ReactionKind::Useful => "useful",
            ReactionKind::Helpful => "helpful",
            ReactionKind::Insightful => "insightful",
            ReactionKind::Inappropriate => "inappropriate",
        }
    }

    /// ACF field the reaction is stored in.
    pub fn acf_field(self) -> &'static str {
        match self {
            ReactionKind::Useful => "useful",
            ReactionKind::Helpful => "loved",
            ReactionKind::Insightful => "thankful",
            ReactionKind::Inappropriate => "oh-no",
        }
    }
}

impl FromStr for ReactionKind {
    type Err = ();

    /// Accepts the API name or the ACF field name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ReactionKind::ALL
            .into_iter()
            .find(|kind| {
                kind.name().eq_ignore_ascii_case(s) || kind.acf_field().eq_ignore_ascii_case(s)
            })
            .ok_or(())
    }
}

/// Per-type reaction counts as returned to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReactionCounts {
    pub useful: usize,
    pub helpful: usize,
    pub insightful: usize,
    pub inappropriate: usize,
}

/// The four reaction lists of one comment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReactionState {
    useful: IdList,
    helpful: IdList,
    insightful: IdList,
    inappropriate: IdList,
}

impl ReactionState {
    pub fn from_fields(fields: &CommentFields) -> Self {
        Self {
            useful: fields.useful.clone(),
            helpful: fields.loved.clone(),
            insightful: fields.thankful.clone(),
            inappropriate: fields.oh_no.clone(),
        }
    }

    /// All four fields, ready to be written back in a single update.
    pub fn to_patch(&self) -> CommentFieldsPatch {
        CommentFieldsPatch {
            useful: Some(self.useful.clone()),
            loved: Some(self.helpful.clone()),
            thankful: Some(self.insightful.clone()),
            oh_no: Some(self.inappropriate.clone()),
            ..Default::default()
        }
    }

    fn list(&self, kind: ReactionKind) -> &IdList {
        match kind {
            ReactionKind::Useful => &self.useful,
            ReactionKind::Helpful => &self.helpful,
            ReactionKind::Insightful => &self.insightful,
            ReactionKind::Inappropriate => &self.inappropriate,
        }
    }

    fn list_mut(&mut self, kind: ReactionKind) -> &mut IdList {
        match kind {
            ReactionKind::Useful => &mut self.useful,
            ReactionKind::Helpful => &mut self.helpful,
            ReactionKind::Insightful => &mut self.insightful,
            ReactionKind::Inappropriate => &mut self.inappropriate,
        }
    }

    /// The reaction `user` currently holds, if any.
    pub fn reaction_of(&self, user: &str) -> Option<ReactionKind> {
        ReactionKind::ALL
            .into_iter()
            .find(|kind| self.list(*kind).contains(user))
    }

    /// Toggle `kind` for `user` and return the user's resulting reaction.
    ///
    /// The user is removed from every list first, then added to `kind`
    /// unless they already held it. Picking a different reaction therefore
    /// switches in one step.
    pub fn toggle(&mut self, user: &str, kind: ReactionKind) -> Option<ReactionKind> {
        let had_it = self.list(kind).contains(user);
        for each in ReactionKind::ALL {
            self.list_mut(each).remove(user);
        }
        if had_it {
            None
        } else {
            self.list_mut(kind).insert(user);
            Some(kind)
        }
    }

    pub fn counts(&self) -> ReactionCounts {
        ReactionCounts {
            useful: self.useful.len(),
            helpful: self.helpful.len(),
            insightful: self.insightful.len(),
            inappropriate: self.inappropriate.len(),
        }
    }
}
