//! Random assignment of poll ids to anonymity buckets.
//!
//! A relay that sees the client poll bucket B must not learn which chat the
//! poll is for. Every id gets one independent, uniform draw; buckets are
//! never rebalanced, since sizes shaped by content would correlate with the
//! number of chats over time. Uneven and empty buckets are expected.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use serde::Serialize;
use tracing::debug;

use murmur_shared::constants::SUBSCRIPTION_LABEL_SIZE;
use murmur_shared::PollId;

/// One anonymity bucket.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Subscription {
    /// Random, hex-encoded bucket name.
    pub label: String,
    pub members: Vec<PollId>,
    /// Bumped whenever the membership is republished.
    pub version: u64,
}

impl Subscription {
    pub fn contains(&self, id: &PollId) -> bool {
        self.members.contains(id)
    }

    pub fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

/// Spread `ids` over `bucket_count` buckets using the OS RNG.
pub fn partition(ids: &[PollId], bucket_count: u16) -> Vec<Subscription> {
    partition_with(&mut OsRng, ids, bucket_count)
}

/// [`partition`] with an explicit generator. Only cryptographically secure
/// generators are accepted.
pub fn partition_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    ids: &[PollId],
    bucket_count: u16,
) -> Vec<Subscription> {
    if bucket_count == 0 {
        return Vec::new();
    }

    let mut buckets: Vec<Subscription> = (0..bucket_count)
        .map(|_| Subscription {
            label: random_label(rng),
            members: Vec::new(),
            version: 0,
        })
        .collect();

    for id in ids {
        let slot = rng.gen_range(0..bucket_count) as usize;
        buckets[slot].members.push(id.clone());
    }

    debug!(ids = ids.len(), buckets = bucket_count, "partitioned poll ids");
    buckets
}

fn random_label<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let mut bytes = [0u8; SUBSCRIPTION_LABEL_SIZE];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
