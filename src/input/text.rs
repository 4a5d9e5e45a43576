use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, json};
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{Result, SimError};
use crate::input::focus::find_best_verification_target;
use crate::input::{Timing, pause};
use crate::tree::element::Element;

// ============================================================================
// Text preparation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    Type,
    Ascii,
    /// Submitted the same way as `Type`; recorded for the caller.
    Paste,
    PasteAscii,
}

impl InputMode {
    pub fn from_flags(ascii: bool, paste: bool) -> Self {
        match (ascii, paste) {
            (true, true) => InputMode::PasteAscii,
            (false, true) => InputMode::Paste,
            (true, false) => InputMode::Ascii,
            (false, false) => InputMode::Type,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Type => "type",
            InputMode::Ascii => "ascii",
            InputMode::Paste => "paste",
            InputMode::PasteAscii => "paste-ascii",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedText {
    pub text: String,
    pub mode: InputMode,
}

/// Keep printable ASCII (0x20..=0x7E) only.
pub fn ascii_only(s: &str) -> String {
    s.chars().filter(|c| (' '..='~').contains(c)).collect()
}

pub fn prepare_typed_text(text: &str, ascii: bool, paste: bool) -> Result<PreparedText> {
    let mut out = text.trim().to_string();
    if ascii {
        out = ascii_only(&out);
        if out.trim().is_empty() {
            return Err(SimError::AsciiEmpty);
        }
    }
    Ok(PreparedText {
        text: out,
        mode: InputMode::from_flags(ascii, paste),
    })
}

/// Split into pieces of at most `chunk` characters. A zero chunk size, or
/// text that already fits, yields the text unchanged.
pub fn split_into_input_chunks(text: &str, chunk: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chunk == 0 || chars.len() <= chunk {
        return vec![text.to_string()];
    }
    chars.chunks(chunk).map(|c| c.iter().collect()).collect()
}

// ============================================================================
// Whitespace-insensitive comparison
// ============================================================================

/// Intended text plus its comparison form: whitespace removed, with each kept
/// character's position in the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedTextState {
    pub intended: String,
    intended_chars: Vec<char>,
    comparable: Vec<char>,
    index_map: Vec<usize>,
    pub chunk_size: usize,
    /// Last value read back from the field.
    pub observed: String,
}

fn comparable_with_map(chars: &[char]) -> (Vec<char>, Vec<usize>) {
    chars
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(i, c)| (*c, i))
        .unzip()
}

impl TypedTextState {
    pub fn new(intended: &str, chunk_size: usize) -> Self {
        let intended_chars: Vec<char> = intended.chars().collect();
        let (comparable, index_map) = comparable_with_map(&intended_chars);
        TypedTextState {
            intended: intended.to_string(),
            intended_chars,
            comparable,
            index_map,
            chunk_size,
            observed: String::new(),
        }
    }

    /// `Some("")` when `observed` is complete, `Some(suffix)` when it is a
    /// prefix, `None` when it diverges.
    pub fn missing_suffix(&self, observed: &str) -> Option<String> {
        let observed_chars: Vec<char> = observed.chars().collect();
        let (observed_cmp, _) = comparable_with_map(&observed_chars);
        if observed_cmp.len() > self.comparable.len() {
            return None;
        }
        if observed_cmp[..] != self.comparable[..observed_cmp.len()] {
            return None;
        }
        if observed_cmp.len() == self.comparable.len() {
            return Some(String::new());
        }
        let start = self.index_map[observed_cmp.len()];
        Some(self.intended_chars[start..].iter().collect())
    }

    pub fn record(&mut self, observed: &str) {
        self.observed = observed.to_string();
    }

    pub fn chunks(&self, text: &str) -> Vec<String> {
        split_into_input_chunks(text, self.chunk_size)
    }
}

/// Suffix of `intended` still missing from `observed`, ignoring whitespace.
pub fn typed_missing_suffix(intended: &str, observed: &str) -> Option<String> {
    TypedTextState::new(intended, 0).missing_suffix(observed)
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Chunked submission with diff-and-resubmit repair of dropped characters.
pub struct TextReconciler<'a, D: ?Sized> {
    device: &'a D,
    timing: &'a Timing,
}

impl<'a, D: Device + ?Sized> TextReconciler<'a, D> {
    pub fn new(device: &'a D, timing: &'a Timing) -> Self {
        TextReconciler { device, timing }
    }

    pub fn type_in_chunks(&self, text: &str) -> Result<()> {
        let chunks = split_into_input_chunks(text, self.timing.chunk_size);
        let multi = chunks.len() > 1;
        for chunk in chunks.iter().filter(|c| !c.is_empty()) {
            self.device
                .type_text(chunk)
                .map_err(|e| e.recode("IDB_UI_FAILED", "text input failed"))?;
            if multi {
                pause(self.timing.chunk_delay);
            }
        }
        Ok(())
    }

    /// Submit `text`, then read the field back and resubmit whatever the
    /// injector dropped. `focused` is the verified focus target, if any.
    pub fn submit(&self, text: &str, focused: Option<&Element>) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let mut state = TypedTextState::new(text, self.timing.chunk_size);
        self.type_in_chunks(text)?;

        let target = match focused {
            Some(elem) => Some(elem.clone()),
            None => self
                .device
                .capture_elements()
                .ok()
                .and_then(|s| s.focused_text_input().cloned()),
        };
        let Some(mut target) = target else {
            debug!("no focused text input to reconcile against");
            return Ok(());
        };
        if target.is_secure_text_input() {
            return Ok(());
        }

        for attempt in 1..=self.timing.reconcile_rounds {
            pause(self.timing.reconcile_settle);
            let snapshot = self.device.capture_elements()?;
            let matched = find_best_verification_target(&snapshot.elements, &target)
                .or_else(|| snapshot.focused_text_input())
                .cloned();
            let Some(matched) = matched else {
                let mut details = Map::new();
                details.insert("intended".into(), json!(text));
                details.insert("attempt".into(), json!(attempt));
                return Err(SimError::TypeVerifyFailed {
                    message: "typed text verification target not found".into(),
                    details,
                });
            };
            if matched.is_secure_text_input() {
                return Ok(());
            }

            let observed = matched.observed_text();
            state.record(&observed);
            let Some(missing) = state.missing_suffix(&observed) else {
                warn!(attempt, intended = text, observed = %observed, "typed text diverged");
                return Err(SimError::TypeIncomplete {
                    message: "typed text does not match target value prefix".into(),
                    intended: text.to_string(),
                    observed,
                    missing: None,
                    attempt: Some(attempt),
                    element_id: Some(matched.id.clone()),
                });
            };
            if missing.is_empty() {
                debug!(attempt, "typed text verified");
                return Ok(());
            }

            debug!(attempt, observed = %observed, missing = %missing, "resubmitting dropped text");
            self.type_in_chunks(&missing)?;
            target = matched;
        }

        match state.missing_suffix(&state.observed) {
            Some(missing) if !missing.is_empty() => Err(SimError::TypeIncomplete {
                message: "typed text remains incomplete after retries".into(),
                intended: text.to_string(),
                observed: state.observed.clone(),
                missing: Some(missing),
                attempt: None,
                element_id: None,
            }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Post-submission verification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeVerification {
    pub element_id: String,
    pub label: String,
    pub value: String,
}

impl From<&Element> for TypeVerification {
    fn from(e: &Element) -> Self {
        TypeVerification {
            element_id: e.id.clone(),
            label: e.label.clone(),
            value: e.value.clone(),
        }
    }
}

/// Lower-cased with all whitespace removed.
pub fn normalize_text_for_match(s: &str) -> String {
    s.split_whitespace().collect::<String>().to_lowercase()
}

pub fn element_has_typed_text(elem: &Element, typed_norm: &str) -> bool {
    !typed_norm.is_empty()
        && [&elem.value, &elem.label]
            .iter()
            .any(|c| normalize_text_for_match(c).contains(typed_norm))
}

/// Confirm the typed text is visible somewhere in a fresh snapshot,
/// preferring the focus target.
pub fn verify_typed_text<D: Device + ?Sized>(
    device: &D,
    typed: &str,
    focused: Option<&Element>,
) -> Result<TypeVerification> {
    let snapshot = device.capture_elements()?;
    let typed_norm = normalize_text_for_match(typed);

    if let Some(focused) = focused {
        if let Some(target) = find_best_verification_target(&snapshot.elements, focused) {
            if element_has_typed_text(target, &typed_norm) {
                return Ok(target.into());
            }
            let value = target.value.trim();
            if target.is_secure_text_input() && !value.is_empty() && value != focused.value.trim() {
                return Ok(target.into());
            }
        }
    }

    if let Some(elem) = snapshot
        .elements
        .iter()
        .find(|e| element_has_typed_text(e, &typed_norm))
    {
        return Ok(elem.into());
    }

    let mut details = Map::new();
    details.insert("typed".into(), json!(typed));
    details.insert("interactive".into(), json!(snapshot.visible_interactive_count()));
    Err(SimError::TypeVerifyFailed {
        message: "typed text could not be verified from latest ui tree".into(),
        details,
    })
}
