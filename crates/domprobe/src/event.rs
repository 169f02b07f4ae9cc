//! Input and synthetic event types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::driver::ElementHandle;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::js_string;

/// Modifier keys held during a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyModifiers {
    /// Control key
    #[serde(default)]
    pub ctrl: bool,
    /// Shift key
    #[serde(default)]
    pub shift: bool,
    /// Alt / Option key
    #[serde(default)]
    pub alt: bool,
    /// Meta / Command key
    #[serde(default)]
    pub meta: bool,
}

impl KeyModifiers {
    /// No modifiers
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    /// CDP `Input.dispatchKeyEvent` modifier bit field
    #[must_use]
    pub const fn cdp_bits(self) -> i64 {
        let mut bits = 0;
        if self.alt {
            bits |= 1;
        }
        if self.ctrl {
            bits |= 2;
        }
        if self.meta {
            bits |= 4;
        }
        if self.shift {
            bits |= 8;
        }
        bits
    }

    /// Whether any modifier is held
    #[must_use]
    pub const fn any(self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }
}

/// A key plus the modifiers held with it, e.g. `Control+Shift+ArrowRight`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyChord {
    /// DOM `KeyboardEvent.key` value
    pub key: String,
    /// Held modifiers
    pub modifiers: KeyModifiers,
}

impl KeyChord {
    /// A key without modifiers
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: KeyModifiers::NONE,
        }
    }

    /// Set modifiers
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Parse `Mod+Mod+Key`. A lone `+` is the plus key.
    pub fn parse(input: &str) -> ProbeResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ProbeError::config("empty key chord"));
        }
        if input == "+" {
            return Ok(Self::new("+"));
        }
        let (prefix, key) = match input.strip_suffix("++") {
            Some(prefix) => (prefix, "+"),
            None => match input.rsplit_once('+') {
                Some((prefix, key)) => (prefix, key),
                None => ("", input),
            },
        };
        if key.is_empty() {
            return Err(ProbeError::config(format!("key chord '{input}' has no key")));
        }

        let mut modifiers = KeyModifiers::NONE;
        for part in prefix.split('+').filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "control" | "ctrl" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" => modifiers.alt = true,
                "meta" | "cmd" | "command" => modifiers.meta = true,
                other => {
                    return Err(ProbeError::config(format!(
                        "unknown modifier '{other}' in key chord '{input}'"
                    )))
                }
            }
        }
        Ok(Self {
            key: key.to_string(),
            modifiers,
        })
    }

    /// Windows virtual key code used by CDP for non-printable keys
    #[must_use]
    pub fn virtual_key_code(&self) -> Option<i64> {
        let code = match self.key.as_str() {
            "Backspace" => 8,
            "Tab" => 9,
            "Enter" => 13,
            "Escape" => 27,
            " " | "Space" => 32,
            "PageUp" => 33,
            "PageDown" => 34,
            "End" => 35,
            "Home" => 36,
            "ArrowLeft" => 37,
            "ArrowUp" => 38,
            "ArrowRight" => 39,
            "ArrowDown" => 40,
            "Delete" => 46,
            k if k.chars().count() == 1 => {
                let c = k.chars().next()?.to_ascii_uppercase();
                if c.is_ascii_alphanumeric() {
                    i64::from(c as u8)
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        Some(code)
    }

    /// Text produced by the key, if printable and unmodified by Ctrl/Meta
    #[must_use]
    pub fn text(&self) -> Option<String> {
        if self.modifiers.ctrl || self.modifiers.meta {
            return None;
        }
        match self.key.as_str() {
            "Enter" => Some("\r".to_string()),
            "Space" => Some(" ".to_string()),
            k if k.chars().count() == 1 => Some(k.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [
            (m.ctrl, "Control"),
            (m.alt, "Alt"),
            (m.shift, "Shift"),
            (m.meta, "Meta"),
        ] {
            if held {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for KeyChord {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyChord {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyChord> for String {
    fn from(value: KeyChord) -> Self {
        value.to_string()
    }
}

/// Event constructed inside the page and dispatched to a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticEvent {
    /// `new CustomEvent(name, { detail })`
    Custom {
        /// Event type
        name: String,
        /// `event.detail`
        #[serde(default)]
        detail: Value,
    },
    /// `new KeyboardEvent(name, { key })`
    Keyboard {
        /// Event type (usually "keydown")
        #[serde(default = "default_keyboard_event")]
        name: String,
        /// `event.key`
        key: String,
    },
    /// `new PointerEvent(name)`
    Pointer {
        /// Event type ("pointerdown", "click", ...)
        name: String,
    },
}

fn default_keyboard_event() -> String {
    "keydown".to_string()
}

impl SyntheticEvent {
    /// Custom event without detail
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom {
            name: name.into(),
            detail: Value::Null,
        }
    }

    /// Custom event with detail payload
    #[must_use]
    pub fn custom_with_detail(name: impl Into<String>, detail: Value) -> Self {
        Self::Custom {
            name: name.into(),
            detail,
        }
    }

    /// `keydown` for a key
    #[must_use]
    pub fn keydown(key: impl Into<String>) -> Self {
        Self::Keyboard {
            name: default_keyboard_event(),
            key: key.into(),
        }
    }

    /// Pointer event
    #[must_use]
    pub fn pointer(name: impl Into<String>) -> Self {
        Self::Pointer { name: name.into() }
    }

    /// Event type name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Custom { name, .. } | Self::Keyboard { name, .. } | Self::Pointer { name } => {
                name
            }
        }
    }

    /// JavaScript expression constructing the event
    #[must_use]
    pub fn to_js(&self) -> String {
        match self {
            Self::Custom { name, detail } => format!(
                "new CustomEvent({}, {{ detail: {}, bubbles: true, cancelable: true }})",
                js_string(name),
                detail
            ),
            Self::Keyboard { name, key } => format!(
                "new KeyboardEvent({}, {{ key: {}, bubbles: true, cancelable: true }})",
                js_string(name),
                js_string(key)
            ),
            Self::Pointer { name } => format!(
                "new PointerEvent({}, {{ bubbles: true, cancelable: true }})",
                js_string(name)
            ),
        }
    }
}

impl fmt::Display for SyntheticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom { name, .. } => write!(f, "CustomEvent({name})"),
            Self::Keyboard { name, key } => write!(f, "KeyboardEvent({name}, {key})"),
            Self::Pointer { name } => write!(f, "PointerEvent({name})"),
        }
    }
}

/// Where a synthetic event is dispatched, after resolution
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchTarget {
    /// `document`
    Document,
    /// `window`
    Window,
    /// A resolved element
    Element(ElementHandle),
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Window => write!(f, "window"),
            Self::Element(el) => write!(f, "{}", el.selector),
        }
    }
}
