//! Communities gathered from the final labels.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::Label;
use crate::{Time, VertexId};

/// One vertex instance: a vertex at one layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The vertex.
    pub vertex: VertexId,
    /// The vertex's `name` property, or its identifier.
    pub name: String,
    /// The layer timestamp.
    pub time: Time,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.time)
    }
}

/// Vertex instances sharing a label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// The shared label.
    pub label: Label,
    /// Members, ordered by vertex then time.
    pub members: Vec<Member>,
}

impl Community {
    /// The number of members.
    pub fn len(&self) -> usize { self.members.len() }
    /// True if there are no members.
    pub fn is_empty(&self) -> bool { self.members.is_empty() }
    /// True if any instance of `vertex` is a member.
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.members.iter().any(|member| member.vertex == vertex)
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: [{}]", self.label, self.members.iter().join(", "))
    }
}

/// Communities, largest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Communities {
    communities: Vec<Community>,
}

impl Communities {
    /// Groups `(label, member)` pairs by label.
    ///
    /// Communities are ordered by decreasing size, then by label. With `top > 0` only the first
    /// `top` are kept.
    pub fn from_records(mut records: Vec<(Label, Member)>, top: usize) -> Self {
        records.sort_by(|(l1, m1), (l2, m2)| (l1, m1.vertex, m1.time).cmp(&(l2, m2.vertex, m2.time)));

        let grouped = records.into_iter().chunk_by(|(label, _)| *label);
        let mut communities = grouped
            .into_iter()
            .map(|(label, members)| Community { label, members: members.map(|(_, member)| member).collect() })
            .collect::<Vec<_>>();

        communities.sort_by(|c1, c2| c2.len().cmp(&c1.len()).then(c1.label.cmp(&c2.label)));
        if top > 0 {
            communities.truncate(top);
        }
        Communities { communities }
    }

    /// The number of communities.
    pub fn len(&self) -> usize { self.communities.len() }
    /// True if there are no communities.
    pub fn is_empty(&self) -> bool { self.communities.is_empty() }
    /// Iterates over communities, largest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Community> { self.communities.iter() }
    /// The community labelled `label`.
    pub fn get(&self, label: Label) -> Option<&Community> {
        self.communities.iter().find(|community| community.label == label)
    }
}

impl<'a> IntoIterator for &'a Communities {
    type Item = &'a Community;
    type IntoIter = std::slice::Iter<'a, Community>;
    fn into_iter(self) -> Self::IntoIter { self.communities.iter() }
}

impl fmt::Display for Communities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for community in self.communities.iter() {
            writeln!(f, "{}", community)?;
        }
        Ok(())
    }
}
