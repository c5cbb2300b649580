// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Topics and Response Catalogs
//!
//! A [`Topic`] is a destination agents listen to and may respond in. Each
//! eligible topic carries a non-empty [`ResponseCatalog`]; a topic without
//! responses is never published to the cache.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transport-level topic identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicId(pub i64);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub display_name: Option<String>,
    pub active: bool,
}

/// Candidate responses for one topic. Guaranteed non-empty, including when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct ResponseCatalog(Vec<String>);

impl ResponseCatalog {
    /// Returns `None` when there is nothing to say.
    pub fn new(responses: Vec<String>) -> Option<Self> {
        let responses: Vec<String> = responses
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .collect();
        if responses.is_empty() {
            None
        } else {
            Some(Self(responses))
        }
    }

    /// Uniform random choice among the entries.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // non-empty by construction
        self.0.choose(rng).map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Response catalog has no non-blank entries")]
pub struct EmptyCatalog;

impl TryFrom<Vec<String>> for ResponseCatalog {
    type Error = EmptyCatalog;

    fn try_from(responses: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(responses).ok_or(EmptyCatalog)
    }
}
