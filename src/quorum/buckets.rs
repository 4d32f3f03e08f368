//! Bucket placement for lock resources
//!
//! Every resource path hashes to exactly one bucket; the peers of that
//! bucket are the voters for locks on that path. The mapping must be pure
//! and stable across managers, so two processes contending for the same
//! path always meet on the same peers.

use crate::common::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Fixed peer-name-per-bucket layout, validated at construction
#[derive(Debug, Clone)]
pub struct BucketMap {
    buckets: Vec<Vec<String>>,
}

impl BucketMap {
    /// Build from an explicit layout, or a single bucket of all peers when
    /// none is configured. Every referenced name must exist in `peer_names`;
    /// empty buckets and unknown peers are configuration errors.
    pub fn new(buckets: Option<Vec<Vec<String>>>, peer_names: &[String]) -> Result<Self> {
        if peer_names.is_empty() {
            return Err(Error::InvalidConfig("no lock peers configured".into()));
        }

        let buckets = match buckets {
            Some(buckets) => buckets,
            None => {
                let mut all = peer_names.to_vec();
                all.sort();
                vec![all]
            }
        };

        if buckets.is_empty() {
            return Err(Error::InvalidConfig("bucket list is empty".into()));
        }

        let known: HashSet<&String> = peer_names.iter().collect();
        for (idx, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                return Err(Error::InvalidConfig(format!("bucket {} is empty", idx)));
            }
            for name in bucket {
                if !known.contains(name) {
                    return Err(Error::InvalidConfig(format!(
                        "bucket {} references unknown peer '{}'",
                        idx, name
                    )));
                }
            }
            if bucket.len() % 2 == 0 {
                tracing::warn!(
                    "bucket {} has an even number of peers ({}); majority needs {} of them",
                    idx,
                    bucket.len(),
                    bucket.len() / 2 + 1
                );
            }
        }

        Ok(Self { buckets })
    }

    /// Deterministic bucket for a resource path.
    pub fn bucket_for(&self, path: &str) -> usize {
        let hash = blake3::hash(path.as_bytes());
        let hash_u64 = u64::from_le_bytes(hash.as_bytes()[0..8].try_into().unwrap());
        (hash_u64 % self.buckets.len() as u64) as usize
    }

    pub fn peers(&self, bucket: usize) -> &[String] {
        &self.buckets[bucket]
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Group paths by the bucket they hash to.
    pub fn group_by_bucket(&self, paths: &[String]) -> HashMap<usize, Vec<String>> {
        let mut grouped: HashMap<usize, Vec<String>> = HashMap::new();
        for path in paths {
            grouped
                .entry(self.bucket_for(path))
                .or_default()
                .push(path.clone());
        }
        grouped
    }
}
