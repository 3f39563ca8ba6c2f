use tracing::info;

use murmur_shared::{IdStamp, PollId};
use murmur_store::{ChatRepository, Result};

use crate::subscription::{partition, Subscription};

/// Joins poll-due selection with bucket partitioning.
#[derive(Debug, Clone, Copy)]
pub struct PollPlanner {
    bucket_count: u16,
}

impl PollPlanner {
    pub fn new(bucket_count: u16) -> Self {
        Self { bucket_count }
    }

    pub fn bucket_count(&self) -> u16 {
        self.bucket_count
    }

    /// Buckets for every chat currently stamped `stamp`.
    pub fn plan(&self, chats: &ChatRepository, stamp: &IdStamp) -> Result<Vec<Subscription>> {
        let ids: Vec<PollId> = chats
            .chats_to_poll(stamp)?
            .into_iter()
            .map(|chat| PollId(chat.id))
            .collect();

        let subscriptions = partition(&ids, self.bucket_count);
        info!(
            stamp = %stamp,
            chats = ids.len(),
            buckets = subscriptions.len(),
            "planned poll"
        );
        Ok(subscriptions)
    }

    /// Plan the oldest stamp any chat is waiting on, `None` without chats.
    pub fn plan_oldest(
        &self,
        chats: &ChatRepository,
    ) -> Result<Option<(IdStamp, Vec<Subscription>)>> {
        let Some(stamp) = chats.oldest_id_stamp_to_poll()? else {
            return Ok(None);
        };
        let subscriptions = self.plan(chats, &stamp)?;
        Ok(Some((stamp, subscriptions)))
    }
}
