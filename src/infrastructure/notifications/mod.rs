pub mod webhook;

pub use webhook::{NullNotifier, WebhookNotifier};
