mod http;
mod redis;

pub use http::{message_notify, receive_event, WebhookQuery};
pub use redis::{EventStatus, RedisEventEnvelope, RedisEventReply, RedisEventSubscriber};
