//! Online-status events.
//!
//! Each status line is `uid-device_flag-status[-socket_id-online_count-total_online_count]`.

use std::str::FromStr;
use std::sync::Arc;

use crate::listener::ListenerRegistry;
use crate::webhook::OnlineStatusUpdate;

const SEPARATOR: char = '-';

/// Parse one status line. Lines with fewer than three fields yield `None`.
///
/// Unparseable numbers become zero. The trailing counters are only read when
/// all three are present.
pub fn parse_status_line(line: &str) -> Option<OnlineStatusUpdate> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() < 3 {
        return None;
    }

    let mut update = OnlineStatusUpdate {
        uid: fields[0].to_string(),
        device_flag: parse_or_zero(fields[1]),
        online: parse_or_zero::<u64>(fields[2]) == 1,
        ..Default::default()
    };

    if fields.len() >= 6 {
        update.socket_id = parse_or_zero(fields[3]);
        update.online_count = parse_or_zero(fields[4]);
        update.total_online_count = parse_or_zero(fields[5]);
    }

    Some(update)
}

/// Parse a batch, dropping malformed lines and keeping input order.
pub fn parse_status_lines(lines: &[String]) -> Vec<OnlineStatusUpdate> {
    lines.iter().filter_map(|l| parse_status_line(l)).collect()
}

fn parse_or_zero<T: FromStr + Default>(field: &str) -> T {
    field.parse().unwrap_or_default()
}

/// Parses online-status batches and broadcasts them to registered listeners.
pub struct OnlineStatusHandler {
    listeners: Arc<ListenerRegistry>,
}

impl OnlineStatusHandler {
    pub fn new(listeners: Arc<ListenerRegistry>) -> Self {
        Self { listeners }
    }

    /// Returns the updates that were broadcast.
    ///
    /// Any non-empty batch reaches listeners, even when every line was
    /// malformed.
    pub async fn handle(&self, lines: &[String]) -> Vec<OnlineStatusUpdate> {
        if lines.is_empty() {
            return Vec::new();
        }

        let updates = parse_status_lines(lines);
        let dropped = lines.len() - updates.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped malformed online status lines");
        }

        self.listeners.notify_online_status(&updates).await;
        updates
    }
}
