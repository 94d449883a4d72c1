use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::convert::TryFrom;
use std::fmt;

use crate::lists::data::NamedRef;
use crate::users::data::UserID;

pub type TaskID = i64;

/// Self-assessed proficiency on a task, 0 (new) through 4 (mastered).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(try_from = "i64", into = "i64")]
pub struct MasteryLevel(u8);

impl MasteryLevel {
    pub const MAX: u8 = 4;

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "New",
            1 => "Familiar",
            2 => "Practicing",
            3 => "Good",
            _ => "Mastered",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct InvalidMasteryLevel(pub i64);

impl fmt::Display for InvalidMasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Mastery level must be between 0 and {}, got {}",
            MasteryLevel::MAX,
            self.0
        )
    }
}

impl TryFrom<i64> for MasteryLevel {
    type Error = InvalidMasteryLevel;

    fn try_from(value: i64) -> Result<MasteryLevel, InvalidMasteryLevel> {
        if (0..=MasteryLevel::MAX as i64).contains(&value) {
            Ok(MasteryLevel(value as u8))
        } else {
            Err(InvalidMasteryLevel(value))
        }
    }
}

impl From<MasteryLevel> for i64 {
    fn from(level: MasteryLevel) -> i64 {
        level.0 as i64
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextBox {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A text box as sent by a client. Missing timestamps are filled in on save.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TextBoxInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Which ordered string list of a task a `task_notes` row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    TaskNote,
    HighlightNote,
    GrammarFeedback,
}

impl NoteKind {
    pub const ALL: [NoteKind; 3] = [
        NoteKind::TaskNote,
        NoteKind::HighlightNote,
        NoteKind::GrammarFeedback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NoteKind::TaskNote => "task",
            NoteKind::HighlightNote => "highlight",
            NoteKind::GrammarFeedback => "grammar",
        }
    }

    pub fn from_key(key: &str) -> Option<NoteKind> {
        match key {
            "task" => Some(NoteKind::TaskNote),
            "highlight" => Some(NoteKind::HighlightNote),
            "grammar" => Some(NoteKind::GrammarFeedback),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: TaskID,
    pub user_id: UserID,
    pub title: String,
    pub task_type: NamedRef,
    pub category: Option<NamedRef>,

    pub text_boxes: Vec<TextBox>,
    pub max_text_boxes: u32,
    pub grammar_feedback: Vec<String>,
    pub highlight_notes: Vec<String>,

    pub image_paths: Vec<String>,
    pub show_navigation: bool,

    pub audio_paths: Vec<String>,
    pub max_audio_recordings: u32,
    pub recording_time_limit: u32,
    pub replacement_allowed: bool,

    pub mastery_level: MasteryLevel,
    pub task_notes: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskItem {
    pub fn notes_mut(&mut self, kind: NoteKind) -> &mut Vec<String> {
        match kind {
            NoteKind::TaskNote => &mut self.task_notes,
            NoteKind::HighlightNote => &mut self.highlight_notes,
            NoteKind::GrammarFeedback => &mut self.grammar_feedback,
        }
    }

    pub fn notes(&self, kind: NoteKind) -> &Vec<String> {
        match kind {
            NoteKind::TaskNote => &self.task_notes,
            NoteKind::HighlightNote => &self.highlight_notes,
            NoteKind::GrammarFeedback => &self.grammar_feedback,
        }
    }
}

/// Per-task defaults applied on creation.
#[derive(Debug, Clone, Copy)]
pub struct TaskDefaults {
    pub max_text_boxes: u32,
    pub max_audio_recordings: u32,
    pub recording_time_limit: u32,
    pub replacement_allowed: bool,
}

impl Default for TaskDefaults {
    fn default() -> TaskDefaults {
        TaskDefaults {
            max_text_boxes: 1,
            max_audio_recordings: 3,
            recording_time_limit: 120,
            replacement_allowed: true,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRequest {
    pub title: Option<String>,
    pub task_type: Option<Value>,
    pub category: Option<Value>,
}

/// A partial update. Absent fields are left untouched; present lists replace
/// the stored ones wholesale.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub mastery_level: Option<i64>,
    pub show_navigation: Option<bool>,
    pub text_boxes: Option<Vec<TextBoxInput>>,
    pub task_notes: Option<Vec<String>>,
    pub highlight_notes: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImagePathsResponse {
    pub image_paths: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AudioPathsResponse {
    pub message: String,
    pub audio_paths: Vec<String>,
}
