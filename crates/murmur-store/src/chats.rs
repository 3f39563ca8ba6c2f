//! CRUD and poll-selection operations for [`Chat`] records.

use std::sync::Arc;

use tracing::debug;

use murmur_shared::IdStamp;

use crate::config::{check_name, Grammars};
use crate::error::{Result, StoreError};
use crate::ids::IdentifierGenerator;
use crate::models::{Chat, Message, MessageDraft, NewChat};
use crate::repository::Repository;
use crate::vault::{check_key, EntityStore};

/// Cached access to the chat namespace.
pub struct ChatRepository {
    inner: Repository<Chat>,
    grammars: Grammars,
}

impl ChatRepository {
    pub fn new(store: Arc<dyn EntityStore>, ids: IdentifierGenerator, grammars: Grammars) -> Self {
        Self {
            inner: Repository::new(store, ids),
            grammars,
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get(&self, data_id: &str) -> Result<Chat> {
        self.inner.get(data_id)
    }

    /// All stored chats, ordered by data id.
    pub fn all(&self) -> Result<Vec<Chat>> {
        self.inner.all()
    }

    /// Chats whose current poll stamp is exactly `id_stamp`.
    pub fn chats_to_poll(&self, id_stamp: &IdStamp) -> Result<Vec<Chat>> {
        let due: Vec<Chat> = self
            .all()?
            .into_iter()
            .filter(|chat| &chat.id_stamp == id_stamp)
            .collect();
        debug!(stamp = %id_stamp, due = due.len(), "selected chats to poll");
        Ok(due)
    }

    /// The numerically smallest poll stamp over all chats, `None` if there
    /// are no chats. Stamps are compared as unsigned integers.
    pub fn oldest_id_stamp_to_poll(&self) -> Result<Option<IdStamp>> {
        let mut oldest: Option<(u64, IdStamp)> = None;

        for chat in self.all()? {
            let value = chat.id_stamp.value().ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "chat {} has non-numeric id stamp {:?}",
                    chat.data_id,
                    chat.id_stamp.as_str()
                ))
            })?;
            if oldest.as_ref().map_or(true, |(min, _)| value < *min) {
                oldest = Some((value, chat.id_stamp));
            }
        }

        Ok(oldest.map(|(_, stamp)| stamp))
    }

    /// Chats that reference the profile `profile_data_id`.
    pub fn chats_for_profile(&self, profile_data_id: &str) -> Result<Vec<Chat>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|chat| chat.associated_profile_id.as_deref() == Some(profile_data_id))
            .collect())
    }

    // ------------------------------------------------------------------
    // Create / Update
    // ------------------------------------------------------------------

    /// Validate a fully-formed prototype, allocate its data id and persist it.
    pub fn create(&self, prototype: Chat) -> Result<Chat> {
        if prototype.data_id.is_assigned() {
            return Err(StoreError::Validation(format!(
                "chat prototype already has data id {}",
                prototype.data_id
            )));
        }
        self.validate(&prototype)?;

        let chat = self.inner.create(prototype)?;
        debug!(data_id = %chat.data_id, chat_type = ?chat.chat_type, "chat created");
        Ok(chat)
    }

    /// Build a chat with an empty history from discrete fields and create it.
    pub fn create_from_fields(&self, fields: NewChat) -> Result<Chat> {
        self.create(Chat::from(fields))
    }

    /// Persist `chat`, then refresh the cache.
    pub fn update(&self, chat: &Chat) -> Result<()> {
        self.validate(chat)?;
        self.inner.update(chat)
    }

    /// Append a message, taking the next sequence number from the chat.
    ///
    /// The counter wraps at `u16::MAX`.
    pub fn append_message(&self, data_id: &str, draft: MessageDraft) -> Result<Message> {
        let (_, message) = self.inner.modify(data_id, |chat| {
            chat.last_message_id = chat.last_message_id.wrapping_add(1);
            let message = draft.into_message(chat.last_message_id);
            chat.messages.push(message.clone());
            Ok(message)
        })?;
        debug!(data_id, message_id = message.id, "appended message");
        Ok(message)
    }

    /// Move a chat to the poll bucket `next`.
    pub fn rotate_id_stamp(&self, data_id: &str, next: IdStamp) -> Result<Chat> {
        check_id_stamp(&next)?;
        let (chat, previous) = self.inner.modify(data_id, |chat| {
            Ok(std::mem::replace(&mut chat.id_stamp, next))
        })?;
        debug!(data_id, from = %previous, to = %chat.id_stamp, "rotated id stamp");
        Ok(chat)
    }

    /// Rotate a chat to a fresh stamp from the identifier service.
    pub fn rotate_to_new_stamp(&self, data_id: &str) -> Result<Chat> {
        let next = self.inner.ids().source().generate_timestamp()?;
        self.rotate_id_stamp(data_id, next)
    }

    fn validate(&self, chat: &Chat) -> Result<()> {
        check_name(&chat.name)?;
        self.grammars.check_chat_id(&chat.id)?;
        self.grammars.check_id_salt(&chat.id_salt)?;
        check_id_stamp(&chat.id_stamp)?;
        if let Some(profile) = &chat.associated_profile_id {
            check_key(profile)?;
        }
        Ok(())
    }
}

/// Poll stamps are ordered as unsigned integers, so only those are stored.
fn check_id_stamp(stamp: &IdStamp) -> Result<()> {
    if stamp.value().is_none() {
        return Err(StoreError::Validation(format!(
            "id stamp {:?} is not an unsigned integer",
            stamp.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;

    use murmur_shared::constants::NAMESPACE_CHATS;
    use murmur_shared::service::RandomIdSource;
    use murmur_shared::DataId;

    use super::*;
    use crate::models::{ContentType, Sender};
    use crate::testutil::{grammars, new_chat, TestStore};

    fn repo(store: &Arc<TestStore>) -> ChatRepository {
        ChatRepository::new(
            store.clone(),
            IdentifierGenerator::new(Arc::new(RandomIdSource)),
            grammars(),
        )
    }

    fn key(chat: &Chat) -> String {
        chat.data_id.as_str().unwrap().to_string()
    }

    #[test]
    fn create_from_fields_starts_empty() {
        let store = TestStore::new();
        let chats = repo(&store);

        let chat = chats.create_from_fields(new_chat("100")).unwrap();
        assert!(chat.data_id.is_assigned());
        assert_eq!(chat.last_message_id, 0);
        assert!(chat.messages.is_empty());
        assert_eq!(chat.own_kyber, "kyber-pair");
        assert_eq!(repo(&store).get(&key(&chat)).unwrap(), chat);
    }

    #[test]
    fn create_from_prototype_round_trips_all_fields() {
        let store = TestStore::new();
        let chats = repo(&store);

        let mut prototype = Chat::from(new_chat("42"));
        prototype.last_message_id = 2;
        prototype.associated_profile_id = Some("p1".into());
        prototype.messages = vec![
            MessageDraft {
                sent_at: Some(chrono::Utc::now()),
                ..MessageDraft::text(Sender::Local, "hello")
            }
            .into_message(1),
            MessageDraft {
                sender: Sender::Profile("p1".into()),
                sent_at: Some(chrono::Utc::now()),
                received_at: Some(chrono::Utc::now()),
                content_type: ContentType::Image,
                text: String::new(),
                payload: Some(vec![0, 1, 2, 255]),
            }
            .into_message(2),
        ];

        let created = chats.create(prototype).unwrap();
        assert_eq!(repo(&store).get(&key(&created)).unwrap(), created);
    }

    #[test]
    fn invalid_chats_write_nothing() {
        let store = TestStore::new();
        let chats = repo(&store);

        let mut empty_name = new_chat("1");
        empty_name.name = String::new();
        let mut newline_name = new_chat("1");
        newline_name.name = "a\nb".into();
        let mut bad_id = new_chat("1");
        bad_id.id = "too short".into();
        let mut bad_salt = new_chat("1");
        bad_salt.id_salt = "#".into();
        let mut empty_profile = new_chat("1");
        empty_profile.associated_profile_id = Some(String::new());

        for fields in [empty_name, newline_name, bad_id, bad_salt, empty_profile] {
            assert!(matches!(
                chats.create_from_fields(fields),
                Err(StoreError::Validation(_))
            ));
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert!(store.vault().list(NAMESPACE_CHATS).unwrap().is_empty());
    }

    #[test]
    fn preassigned_prototype_is_rejected() {
        let store = TestStore::new();
        let mut prototype = Chat::from(new_chat("1"));
        prototype.data_id = DataId::from("mine");

        assert!(matches!(
            repo(&store).create(prototype),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sequential_creates_get_distinct_ids() {
        let store = TestStore::new();
        let chats = repo(&store);

        let ids: HashSet<_> = (0..15)
            .map(|_| chats.create_from_fields(new_chat("7")).unwrap().data_id)
            .collect();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn poll_selection_matches_exact_stamp() {
        let store = TestStore::new();
        let chats = repo(&store);
        let a = chats.create_from_fields(new_chat("100")).unwrap();
        let b = chats.create_from_fields(new_chat("100")).unwrap();
        chats.create_from_fields(new_chat("200")).unwrap();

        // a cold repository has to load everything first
        let cold = repo(&store);
        let due: HashSet<_> = cold
            .chats_to_poll(&IdStamp::new("100"))
            .unwrap()
            .into_iter()
            .map(|c| c.data_id)
            .collect();
        assert_eq!(due, HashSet::from([a.data_id, b.data_id]));

        assert_eq!(
            cold.oldest_id_stamp_to_poll().unwrap(),
            Some(IdStamp::new("100"))
        );
        assert!(cold.chats_to_poll(&IdStamp::new("300")).unwrap().is_empty());
    }

    #[test]
    fn oldest_stamp_compares_numerically() {
        let store = TestStore::new();
        let chats = repo(&store);
        chats.create_from_fields(new_chat("10")).unwrap();
        chats.create_from_fields(new_chat("9")).unwrap();

        assert_eq!(chats.oldest_id_stamp_to_poll().unwrap(), Some(IdStamp::new("9")));
    }

    #[test]
    fn oldest_stamp_of_nothing_is_none() {
        let store = TestStore::new();
        assert_eq!(repo(&store).oldest_id_stamp_to_poll().unwrap(), None);
    }

    #[test]
    fn non_numeric_stamps_are_rejected_before_writing() {
        let store = TestStore::new();
        let chats = repo(&store);
        let chat = chats.create_from_fields(new_chat("12")).unwrap();
        let writes = store.writes.load(Ordering::SeqCst);

        assert!(matches!(
            chats.create_from_fields(new_chat("soon")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            chats.create(Chat::from(new_chat("-1"))),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            chats.rotate_id_stamp(&key(&chat), IdStamp::new("next")),
            Err(StoreError::Validation(_))
        ));

        assert_eq!(store.writes.load(Ordering::SeqCst), writes);
        assert_eq!(chats.get(&key(&chat)).unwrap().id_stamp, IdStamp::new("12"));
        assert_eq!(chats.oldest_id_stamp_to_poll().unwrap(), Some(IdStamp::new("12")));
    }

    #[test]
    fn non_numeric_stamp_on_disk_is_corrupt() {
        let store = TestStore::new();
        repo(&store).create_from_fields(new_chat("12")).unwrap();
        let odd = repo(&store).create_from_fields(new_chat("13")).unwrap();

        let mut tampered = odd.clone();
        tampered.id_stamp = IdStamp::new("soon");
        let bytes = bincode::serialize(&tampered).unwrap();
        store.vault().write(&key(&odd), NAMESPACE_CHATS, &bytes, true).unwrap();

        let err = repo(&store).oldest_id_stamp_to_poll().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(ref m) if m.contains(&key(&odd))));
    }

    #[test]
    fn append_message_advances_counter() {
        let store = TestStore::new();
        let chats = repo(&store);
        let chat = chats.create_from_fields(new_chat("1")).unwrap();

        let first = chats
            .append_message(&key(&chat), MessageDraft::text(Sender::Local, "hi"))
            .unwrap();
        let second = chats
            .append_message(&key(&chat), MessageDraft::text(Sender::Profile("p1".into()), "hey"))
            .unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let stored = repo(&store).get(&key(&chat)).unwrap();
        assert_eq!(stored.last_message_id, 2);
        assert_eq!(stored.messages, vec![first, second]);
    }

    #[test]
    fn message_counter_wraps() {
        let store = TestStore::new();
        let chats = repo(&store);
        let mut prototype = Chat::from(new_chat("1"));
        prototype.last_message_id = u16::MAX;
        let chat = chats.create(prototype).unwrap();

        let msg = chats
            .append_message(&key(&chat), MessageDraft::text(Sender::Local, "wrap"))
            .unwrap();
        assert_eq!(msg.id, 0);
    }

    #[test]
    fn failed_append_leaves_chat_untouched() {
        let store = TestStore::new();
        let chats = repo(&store);
        let chat = chats.create_from_fields(new_chat("1")).unwrap();

        store.fail_writes(true);
        assert!(chats
            .append_message(&key(&chat), MessageDraft::text(Sender::Local, "lost"))
            .is_err());
        store.fail_writes(false);

        assert_eq!(chats.get(&key(&chat)).unwrap(), chat);
    }

    #[test]
    fn failed_update_keeps_previous_value() {
        let store = TestStore::new();
        let chats = repo(&store);
        let chat = chats.create_from_fields(new_chat("1")).unwrap();

        let mut renamed = chat.clone();
        renamed.name = "Renamed".into();
        store.fail_writes(true);
        assert!(chats.update(&renamed).is_err());
        store.fail_writes(false);

        assert_eq!(chats.get(&key(&chat)).unwrap(), chat);
        chats.update(&renamed).unwrap();
        assert_eq!(repo(&store).get(&key(&chat)).unwrap().name, "Renamed");
    }

    #[test]
    fn rotating_stamp_moves_chat_between_buckets() {
        let store = TestStore::new();
        let chats = repo(&store);
        let chat = chats.create_from_fields(new_chat("100")).unwrap();

        chats.rotate_id_stamp(&key(&chat), IdStamp::new("160")).unwrap();

        assert!(chats.chats_to_poll(&IdStamp::new("100")).unwrap().is_empty());
        assert_eq!(chats.chats_to_poll(&IdStamp::new("160")).unwrap().len(), 1);
        assert_eq!(
            repo(&store).get(&key(&chat)).unwrap().id_stamp,
            IdStamp::new("160")
        );
    }

    #[test]
    fn rotate_to_new_stamp_uses_id_source() {
        let store = TestStore::new();
        let chats = repo(&store);
        let chat = chats.create_from_fields(new_chat("0")).unwrap();

        let rotated = chats.rotate_to_new_stamp(&key(&chat)).unwrap();
        assert!(rotated.id_stamp.value().unwrap() > 0);
    }

    #[test]
    fn chats_for_profile_follows_weak_reference() {
        let store = TestStore::new();
        let chats = repo(&store);
        let mut linked = new_chat("1");
        linked.associated_profile_id = Some("p1".into());
        let linked = chats.create_from_fields(linked).unwrap();
        chats.create_from_fields(new_chat("1")).unwrap();

        assert_eq!(chats.chats_for_profile("p1").unwrap(), vec![linked]);
        assert!(chats.chats_for_profile("p2").unwrap().is_empty());
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let chat = Chat::from(new_chat("1"));
        let out = format!("{chat:?}");
        for secret in [
            "kyber-pair",
            "curve-pair",
            "own-pfs",
            "remote-pfs",
            "pfs-salt",
            "mdc-seed",
        ] {
            assert!(!out.contains(secret), "{secret} leaked into {out}");
        }
    }
}
