// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message formatting entities.
//!
//! Offsets and lengths are in UTF-16 code units exactly as delivered by
//! the transport. They are carried through verbatim and never re-indexed
//! against the UTF-8 text.

use serde::{Deserialize, Serialize};

/// Entity kind, tagged the way the rules and snapshot documents spell it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    Hashtag,
    BotCommand,
    Url,
    Email,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    TextUrl {
        url: String,
    },
    MentionName {
        user_id: i64,
    },
    CustomEmoji {
        document_id: i64,
    },
    Blockquote,
}

/// One formatting span over the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(flatten)]
    pub kind: EntityKind,
    /// Start offset in UTF-16 code units.
    pub offset: i32,
    /// Length in UTF-16 code units.
    pub length: i32,
}

impl MessageEntity {
    pub fn new(kind: EntityKind, offset: i32, length: i32) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }

    /// Custom-emoji entities cannot be carried into a copy payload (no
    /// reliable document-id mapping at this layer).
    pub fn is_custom_emoji(&self) -> bool {
        matches!(self.kind, EntityKind::CustomEmoji { .. })
    }
}
