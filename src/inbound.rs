/// 入站消息分类
///
/// 服务器消息以 `message` 字段区分类型。无法解析或无法识别的内容
/// 一律降级为原始预览，分类永远不会导致监听循环失败。
use crate::error::{FarmError, Result};
use crate::events::Tone;
use serde::Deserialize;

/// 原始预览的最大字符数
pub const RAW_PREVIEW_LIMIT: usize = 100;
/// 截断标记
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Deserialize)]
#[serde(tag = "message")]
enum ServerMessage {
    #[serde(rename = "Connected successfully")]
    Connected {
        #[serde(rename = "pointsToday")]
        points_today: f64,
        #[serde(rename = "pointsTotal")]
        points_total: f64,
    },
    #[serde(rename = "Pulse from server")]
    Pulse {
        #[serde(rename = "pointsToday")]
        points_today: f64,
        #[serde(rename = "pointsTotal")]
        points_total: f64,
        heartbeats: f64,
    },
}

/// 分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// 握手确认
    Connected { points_today: f64, points_total: f64 },
    /// 周期性确认
    Pulse {
        points_today: f64,
        points_total: f64,
        heartbeats: f64,
    },
    /// 无法识别的内容（截断后的预览）
    Raw(String),
}

impl Inbound {
    /// 对一段文本负载分类
    pub fn classify(payload: &str) -> Self {
        match decode(payload) {
            Ok(ServerMessage::Connected {
                points_today,
                points_total,
            }) => Inbound::Connected {
                points_today,
                points_total,
            },
            Ok(ServerMessage::Pulse {
                points_today,
                points_total,
                heartbeats,
            }) => Inbound::Pulse {
                points_today,
                points_total,
                heartbeats,
            },
            Err(_) => Inbound::Raw(preview(payload)),
        }
    }

    /// 响应日志中显示的文本
    pub fn describe(&self) -> String {
        match self {
            Inbound::Connected {
                points_today,
                points_total,
            } => format!("[Connected] Today: {} Total: {}", points_today, points_total),
            Inbound::Pulse {
                points_today,
                points_total,
                heartbeats,
            } => format!(
                "[Pulse] Today: {} Total: {} HB: {}",
                points_today, points_total, heartbeats
            ),
            Inbound::Raw(preview) => format!("RAW: {}", preview),
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Inbound::Connected { .. } => Tone::Green,
            Inbound::Pulse { .. } => Tone::Cyan,
            Inbound::Raw(_) => Tone::Muted,
        }
    }
}

fn decode(payload: &str) -> Result<ServerMessage> {
    serde_json::from_str(payload).map_err(|e| FarmError::protocol(e.to_string()))
}

/// 截断到 `RAW_PREVIEW_LIMIT` 个字符，超出时追加截断标记
pub fn preview(payload: &str) -> String {
    match payload.char_indices().nth(RAW_PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}{}", &payload[..cut], TRUNCATION_MARKER),
        None => payload.to_string(),
    }
}
