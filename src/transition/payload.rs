use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Visual role of an alert or dialog button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionRole {
    #[default]
    Default,
    Cancel,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertAction {
    pub label: String,
    #[serde(default)]
    pub role: ActionRole,
}

impl AlertAction {
    pub fn new(label: impl Into<String>, role: ActionRole) -> Self {
        Self {
            label: label.into(),
            role,
        }
    }

    pub fn cancel(label: impl Into<String>) -> Self {
        Self::new(label, ActionRole::Cancel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub title: String,
    pub message: Option<String>,
    pub actions: Vec<AlertAction>,
}

impl AlertPayload {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: None,
            actions: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_action(mut self, action: AlertAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Alert describing an error, with a single dismiss button.
    pub fn from_error(error: &dyn std::fmt::Display) -> Self {
        Self::new("Error")
            .with_message(error.to_string())
            .with_action(AlertAction::cancel("OK"))
    }
}

/// Confirmation dialog (action sheet) content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogPayload {
    pub title: String,
    pub message: Option<String>,
    pub title_visible: bool,
    pub actions: Vec<AlertAction>,
}

impl DialogPayload {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: None,
            title_visible: true,
            actions: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_action(mut self, action: AlertAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn hide_title(mut self) -> Self {
        self.title_visible = false;
        self
    }
}

/// Where a popover should anchor and which route fills it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopoverPayload {
    pub anchor: Option<String>,
    pub content_path: String,
}

impl PopoverPayload {
    pub fn new(content_path: impl Into<String>) -> Self {
        Self {
            anchor: None,
            content_path: content_path.into(),
        }
    }

    pub fn anchored_to(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }
}

/// Request to open a separate window, optionally carrying a value for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPayload {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl WindowPayload {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}
