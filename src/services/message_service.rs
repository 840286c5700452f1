//! Messaging service - store-and-forward direct messages.
//!
//! Persists messages, resolves participant identities for responses,
//! and fans the new-message event out to both parties' rooms.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ConversationSummary, LastMessage, Message, MessageResponse, UserSummary};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;
use crate::realtime::{Event, Notifier};

/// Messaging service trait for dependency injection.
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Persist and deliver a message
    async fn send(&self, sender: Uuid, recipient: Uuid, content: String)
        -> AppResult<MessageResponse>;

    /// All messages involving the user, newest first
    async fn list_for_user(&self, user: Uuid) -> AppResult<Vec<MessageResponse>>;

    /// The thread with one counterpart, oldest first; marks their
    /// unread messages to the caller as read
    async fn conversation(&self, user: Uuid, counterpart: Uuid)
        -> AppResult<Vec<MessageResponse>>;

    /// Conversation overview: one entry per counterpart with the
    /// latest message and the unread count, newest first
    async fn conversations(&self, user: Uuid) -> AppResult<Vec<ConversationSummary>>;

    /// Flip read=true on unread messages from the counterpart
    async fn mark_read(&self, user: Uuid, counterpart: Uuid) -> AppResult<u64>;
}

/// Concrete implementation of MessageService using Unit of Work.
pub struct Messenger<U: UnitOfWork> {
    uow: Arc<U>,
    notifier: Arc<dyn Notifier>,
}

impl<U: UnitOfWork> Messenger<U> {
    pub fn new(uow: Arc<U>, notifier: Arc<dyn Notifier>) -> Self {
        Self { uow, notifier }
    }

    async fn summaries(&self, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, UserSummary>> {
        let mut unique = ids;
        unique.sort();
        unique.dedup();

        let users = self.uow.users().find_many(unique).await?;
        Ok(users
            .into_iter()
            .map(|user| (user.id, UserSummary::from(user)))
            .collect())
    }

    async fn hydrate_many(&self, messages: Vec<Message>) -> AppResult<Vec<MessageResponse>> {
        let ids = messages
            .iter()
            .flat_map(|m| [m.sender, m.recipient])
            .collect();
        let map = self.summaries(ids).await?;

        Ok(messages
            .into_iter()
            .map(|message| {
                let sender = summary_or_unknown(&map, message.sender);
                let recipient = summary_or_unknown(&map, message.recipient);
                MessageResponse::new(message, sender, recipient)
            })
            .collect())
    }
}

fn summary_or_unknown(map: &HashMap<Uuid, UserSummary>, id: Uuid) -> UserSummary {
    map.get(&id).cloned().unwrap_or_else(|| {
        tracing::warn!(user = %id, "Message participant could not be resolved");
        UserSummary {
            id,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        }
    })
}

#[async_trait]
impl<U: UnitOfWork> MessageService for Messenger<U> {
    async fn send(
        &self,
        sender: Uuid,
        recipient: Uuid,
        content: String,
    ) -> AppResult<MessageResponse> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::validation("Message content is required"));
        }
        if recipient == sender {
            return Err(AppError::validation("Cannot send message to yourself"));
        }

        let users = self.uow.users();
        let recipient_user = users.find_by_id(recipient).await?.ok_or_not_found()?;
        let sender_user = users.find_by_id(sender).await?.ok_or_not_found()?;

        let message = self
            .uow
            .messages()
            .create(sender, recipient, content)
            .await?;

        let response = MessageResponse::new(
            message,
            UserSummary::from(&sender_user),
            UserSummary::from(&recipient_user),
        );

        // Both rooms get the event so every open session updates
        self.notifier.notify(
            sender,
            Event::NewMessage {
                message: response.clone(),
            },
        );
        self.notifier.notify(
            recipient,
            Event::NewMessage {
                message: response.clone(),
            },
        );

        Ok(response)
    }

    async fn list_for_user(&self, user: Uuid) -> AppResult<Vec<MessageResponse>> {
        let messages = self.uow.messages().list_involving(user).await?;
        self.hydrate_many(messages).await
    }

    async fn conversation(
        &self,
        user: Uuid,
        counterpart: Uuid,
    ) -> AppResult<Vec<MessageResponse>> {
        self.uow
            .users()
            .find_by_id(counterpart)
            .await?
            .ok_or_not_found()?;

        let messages = self.uow.messages().between(user, counterpart).await?;

        // Opening the thread counts as reading it
        self.uow.messages().mark_read(user, counterpart).await?;

        self.hydrate_many(messages).await
    }

    async fn conversations(&self, user: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let messages = self.uow.messages().list_involving(user).await?;

        // Messages arrive newest first, so the first message seen per
        // counterpart is the latest of that thread.
        let mut order: Vec<Uuid> = Vec::new();
        let mut latest: HashMap<Uuid, Message> = HashMap::new();
        let mut unread: HashMap<Uuid, u64> = HashMap::new();

        for message in messages {
            let other = if message.sender == user {
                message.recipient
            } else {
                message.sender
            };

            if message.recipient == user && !message.read {
                *unread.entry(other).or_insert(0) += 1;
            }

            if !latest.contains_key(&other) {
                order.push(other);
                latest.insert(other, message);
            }
        }

        let map = self.summaries(order.clone()).await?;

        Ok(order
            .into_iter()
            .filter_map(|other| {
                let last = latest.get(&other)?;
                Some(ConversationSummary {
                    user: summary_or_unknown(&map, other),
                    last_message: LastMessage::from(last),
                    unread_count: unread.get(&other).copied().unwrap_or(0),
                })
            })
            .collect())
    }

    async fn mark_read(&self, user: Uuid, counterpart: Uuid) -> AppResult<u64> {
        self.uow.messages().mark_read(user, counterpart).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::domain::User;
    use crate::errors::AppError;
    use crate::infra::{
        MessageRepository, MockMessageRepository, MockServiceRepository, MockUserRepository,
        ServiceRepository, TransactionContext, UserRepository,
    };
    use crate::realtime::NoopNotifier;

    struct TestUnitOfWork {
        users: Arc<MockUserRepository>,
        messages: Arc<MockMessageRepository>,
    }

    impl TestUnitOfWork {
        fn new(users: MockUserRepository, messages: MockMessageRepository) -> Self {
            Self {
                users: Arc::new(users),
                messages: Arc::new(messages),
            }
        }
    }

    #[async_trait]
    impl UnitOfWork for TestUnitOfWork {
        fn users(&self) -> Arc<dyn UserRepository> {
            self.users.clone()
        }

        fn services(&self) -> Arc<dyn ServiceRepository> {
            Arc::new(MockServiceRepository::new())
        }

        fn messages(&self) -> Arc<dyn MessageRepository> {
            self.messages.clone()
        }

        async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
        where
            F: for<'a> FnOnce(
                    TransactionContext<'a>,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
                > + Send,
            T: Send,
        {
            Err(AppError::internal("Transactions not supported in test mock"))
        }
    }

    fn test_user(id: Uuid) -> User {
        let now = Utc::now();
        User {
            id,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{}@example.com", id.simple()),
            password_hash: "hashed".to_string(),
            bio: None,
            avatar_url: None,
            github_profile: None,
            linkedin_profile: None,
            skills: vec![],
            portfolio: vec![],
            credits: 0,
            rating: 0.0,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_message(sender: Uuid, recipient: Uuid, content: &str, age_minutes: i64, read: bool) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender,
            recipient,
            content: content.to_string(),
            read,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn messenger(
        users: MockUserRepository,
        messages: MockMessageRepository,
    ) -> Messenger<TestUnitOfWork> {
        Messenger::new(
            Arc::new(TestUnitOfWork::new(users, messages)),
            Arc::new(NoopNotifier),
        )
    }

    #[tokio::test]
    async fn send_trims_and_persists_the_content() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_user(id))));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_create()
            .withf(|_, _, content| content == "hello there")
            .returning(|sender, recipient, content| {
                Ok(test_message(sender, recipient, &content, 0, false))
            });

        let result = messenger(users, messages)
            .send(sender, recipient, "  hello there  ".to_string())
            .await
            .unwrap();

        assert_eq!(result.content, "hello there");
        assert_eq!(result.sender.id, sender);
        assert_eq!(result.recipient.id, recipient);
        assert!(!result.read);
    }

    #[tokio::test]
    async fn send_rejects_blank_content() {
        let result = messenger(MockUserRepository::new(), MockMessageRepository::new())
            .send(Uuid::new_v4(), Uuid::new_v4(), "   ".to_string())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn send_rejects_self_addressed_messages() {
        let user = Uuid::new_v4();

        let result = messenger(MockUserRepository::new(), MockMessageRepository::new())
            .send(user, user, "hi".to_string())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn send_to_unknown_recipient_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));

        let result = messenger(users, MockMessageRepository::new())
            .send(Uuid::new_v4(), Uuid::new_v4(), "hi".to_string())
            .await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn conversations_group_by_counterpart_with_unread_counts() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        // Newest first, as the repository returns them
        let history = vec![
            test_message(alice, me, "latest from alice", 1, false),
            test_message(me, bob, "to bob", 2, true),
            test_message(alice, me, "older from alice", 3, false),
            test_message(bob, me, "from bob", 4, true),
        ];

        let mut users = MockUserRepository::new();
        users
            .expect_find_many()
            .returning(|ids| Ok(ids.into_iter().map(test_user).collect()));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_list_involving()
            .returning(move |_| Ok(history.clone()));

        let result = messenger(users, messages).conversations(me).await.unwrap();

        assert_eq!(result.len(), 2);

        // Ordered by recency of the latest message
        assert_eq!(result[0].user.id, alice);
        assert_eq!(result[0].last_message.content, "latest from alice");
        assert_eq!(result[0].unread_count, 2);

        assert_eq!(result[1].user.id, bob);
        assert_eq!(result[1].last_message.content, "to bob");
        assert_eq!(result[1].unread_count, 0);
    }

    #[tokio::test]
    async fn conversation_fetches_thread_and_marks_it_read() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let thread = vec![
            test_message(other, me, "hi", 10, false),
            test_message(me, other, "hello", 5, true),
        ];

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_user(id))));
        users
            .expect_find_many()
            .returning(|ids| Ok(ids.into_iter().map(test_user).collect()));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_between()
            .returning(move |_, _| Ok(thread.clone()));
        messages
            .expect_mark_read()
            .times(1)
            .returning(|_, _| Ok(1));

        let result = messenger(users, messages)
            .conversation(me, other)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].content, "hi");
    }

    #[tokio::test]
    async fn conversation_with_unknown_user_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));

        let result = messenger(users, MockMessageRepository::new())
            .conversation(Uuid::new_v4(), Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
