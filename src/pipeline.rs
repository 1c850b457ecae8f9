use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::config::{Config, RepliesConfig};
use crate::extract::extract;
use crate::filter;
use crate::payload::{build_payload, PayloadSettings};
use crate::platform::{Acknowledger, InboundMessage};
use crate::weeek::WeeekClient;

/// What happened to a single inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Created,
    Failed,
}

/// Turns eligible chat messages into Weeek tasks and replies with the result.
pub struct Pipeline<A> {
    self_id: Option<u64>,
    allowed_chat_ids: HashSet<i64>,
    settings: PayloadSettings,
    replies: RepliesConfig,
    weeek: WeeekClient,
    acknowledger: A,
    clock: Arc<dyn Clock>,
}

impl<A: Acknowledger> Pipeline<A> {
    pub fn new(
        config: &Config,
        self_id: Option<u64>,
        acknowledger: A,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let settings =
            PayloadSettings::new(&config.weeek, config.timezone()?, config.tasks.title_max_len);
        let weeek = WeeekClient::new(&config.weeek, &config.http, clock.clone())?;

        Ok(Self {
            self_id,
            allowed_chat_ids: config.telegram.allowed_chat_ids.clone(),
            settings,
            replies: config.replies.clone(),
            weeek,
            acknowledger,
            clock,
        })
    }

    pub async fn on_message(&self, msg: &InboundMessage) -> Outcome {
        if !filter::should_process(msg, self.self_id, &self.allowed_chat_ids) {
            return Outcome::Skipped;
        }

        let content = extract(msg);
        info!(
            "Processing message {} in chat {}: {}",
            msg.message_id,
            msg.chat_id,
            content.title_source.chars().take(50).collect::<String>()
        );

        let payload = build_payload(
            &content.title_source,
            &content.description,
            &self.settings,
            self.clock.now(),
        );
        let created = self.weeek.submit(&payload).await;

        let reply = if created {
            &self.replies.success
        } else {
            &self.replies.failure
        };

        // Best effort: a lost reply must not affect the outcome
        match self
            .acknowledger
            .reply(msg.chat_id, msg.message_id, reply)
            .await
        {
            Ok(()) => debug!("Sent reply to chat {}", msg.chat_id),
            Err(e) => error!("Failed to send reply to chat {}: {:#}", msg.chat_id, e),
        }

        if created {
            Outcome::Created
        } else {
            Outcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::platform::{ChatKind, MediaKind, MessageContent, Sender};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BOT_ID: u64 = 777;
    const CHAT_ID: i64 = -100500;

    #[derive(Default)]
    struct RecordingAcknowledger {
        replies: Mutex<Vec<(i64, i32, String)>>,
        fail: bool,
    }

    impl RecordingAcknowledger {
        fn replies(&self) -> Vec<(i64, i32, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Acknowledger for Arc<RecordingAcknowledger> {
        async fn reply(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((chat_id, message_id, text.to_string()));
            if self.fail {
                anyhow::bail!("telegram is down");
            }
            Ok(())
        }
    }

    fn make_config(base_url: &str) -> Config {
        let config = Config::parse(&format!(
            r#"
            [telegram]
            bot_token = "tg"
            allowed_chat_ids = [{CHAT_ID}]

            [weeek]
            api_key = "wk"
            base_url = "{base_url}"
            user_id = "assignee-1"
            project_id = 2
            board_column_id = 4

            [tasks]
            timezone = "Europe/Moscow"

            [replies]
            success = "created"
            failure = "not created"
            "#
        ))
        .unwrap();
        config.validate().unwrap();
        config
    }

    fn make_msg(content: MessageContent) -> InboundMessage {
        InboundMessage {
            chat_id: CHAT_ID,
            message_id: 31,
            chat_kind: ChatKind::Supergroup,
            chat_title: Some("Household".to_string()),
            sender: Some(Sender {
                id: 42,
                username: Some("bob".to_string()),
                full_name: "Bob".to_string(),
            }),
            date: Utc.with_ymd_and_hms(2025, 1, 1, 20, 0, 0).unwrap(),
            content: Some(content),
        }
    }

    fn make_pipeline(
        server: &MockServer,
        ack: Arc<RecordingAcknowledger>,
    ) -> Pipeline<Arc<RecordingAcknowledger>> {
        // 22:30 in Moscow on Jan 1st
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 19, 30, 0).unwrap(),
        ));
        Pipeline::new(&make_config(&server.uri()), Some(BOT_ID), ack, clock).unwrap()
    }

    #[tokio::test]
    async fn test_text_message_creates_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tm/tasks"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let ack = Arc::new(RecordingAcknowledger::default());
        let pipeline = make_pipeline(&server, ack.clone());

        let outcome = pipeline
            .on_message(&make_msg(MessageContent::Text("Buy milk".to_string())))
            .await;
        assert_eq!(outcome, Outcome::Created);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "title": "Buy milk",
                "description": "Buy milk",
                "day": "02.01.2025",
                "parentId": null,
                "userId": "assignee-1",
                "locations": [{"projectId": 2, "boardColumnId": 4}],
                "type": "action",
                "priority": 0
            })
        );

        assert_eq!(ack.replies(), vec![(CHAT_ID, 31, "created".to_string())]);
    }

    #[tokio::test]
    async fn test_sticker_message_gets_synthesized_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let ack = Arc::new(RecordingAcknowledger::default());
        let pipeline = make_pipeline(&server, ack.clone());

        let msg = make_msg(MessageContent::Media {
            kind: MediaKind::Sticker,
            caption: None,
        });
        assert_eq!(pipeline.on_message(&msg).await, Outcome::Created);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["title"]
            .as_str()
            .unwrap()
            .starts_with("Message from bob: Sticker"));
        let description = body["description"].as_str().unwrap();
        assert!(description.contains("Type: Sticker"));
        assert!(description.contains("Chat: Household"));
        assert_eq!(description.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_failed_submission_sends_failure_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let ack = Arc::new(RecordingAcknowledger::default());
        let pipeline = make_pipeline(&server, ack.clone());

        let outcome = pipeline
            .on_message(&make_msg(MessageContent::Text("Call plumber".to_string())))
            .await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(ack.replies(), vec![(CHAT_ID, 31, "not created".to_string())]);
    }

    #[tokio::test]
    async fn test_filtered_message_is_silent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ack = Arc::new(RecordingAcknowledger::default());
        let pipeline = make_pipeline(&server, ack.clone());

        let mut msg = make_msg(MessageContent::Text("hello".to_string()));
        msg.chat_kind = ChatKind::Private;
        assert_eq!(pipeline.on_message(&msg).await, Outcome::Skipped);

        let mut msg = make_msg(MessageContent::Text("✅ created".to_string()));
        msg.sender.as_mut().unwrap().id = BOT_ID;
        assert_eq!(pipeline.on_message(&msg).await, Outcome::Skipped);

        let mut msg = make_msg(MessageContent::Text("elsewhere".to_string()));
        msg.chat_id = -1;
        assert_eq!(pipeline.on_message(&msg).await, Outcome::Skipped);

        let msg = make_msg(MessageContent::Text(" \n  ".to_string()));
        assert_eq!(pipeline.on_message(&msg).await, Outcome::Skipped);

        assert!(ack.replies().is_empty());
    }

    #[tokio::test]
    async fn test_reply_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let ack = Arc::new(RecordingAcknowledger {
            fail: true,
            ..Default::default()
        });
        let pipeline = make_pipeline(&server, ack.clone());

        let outcome = pipeline
            .on_message(&make_msg(MessageContent::Text("Buy bread".to_string())))
            .await;
        assert_eq!(outcome, Outcome::Created);
        assert_eq!(ack.replies().len(), 1);
    }
}
