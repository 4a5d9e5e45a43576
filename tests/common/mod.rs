#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use simagent::device::{Injector, ScreenCapturer, SnapshotProvider};
use simagent::error::{Result, SimError};
use simagent::tree::element::{Element, FramePoint, FrameRect};
use simagent::tree::normalize::{NormalizeOptions, normalize};

// =========================================================================
// Raw snapshot builders
// =========================================================================

/// A raw accessibility node with its rect inlined.
pub fn node(id: &str, role: &str, label: &str, x: f64, y: f64, w: f64, h: f64) -> Value {
    json!({
        "id": id,
        "type": role,
        "AXLabel": label,
        "x": x,
        "y": y,
        "width": w,
        "height": h,
    })
}

pub fn with(mut node: Value, key: &str, value: Value) -> Value {
    if let Some(map) = node.as_object_mut() {
        map.insert(key.to_string(), value);
    }
    node
}

/// An already-normalized, enabled, fully visible element.
pub fn element(index: usize, id: &str, role: &str, label: &str, frame: (f64, f64, f64, f64)) -> Element {
    let rect = FrameRect {
        x: frame.0,
        y: frame.1,
        w: frame.2,
        h: frame.3,
    };
    Element {
        index,
        id: id.to_string(),
        role: role.to_string(),
        label: label.to_string(),
        enabled: true,
        visible: true,
        center: rect.center(),
        frame: rect,
        ..Default::default()
    }
}

/// Normalize nodes with every role kept.
pub fn elements_of(nodes: &[Value]) -> Vec<Element> {
    normalize(&Value::Array(nodes.to_vec()), &NormalizeOptions::default()).elements
}

// =========================================================================
// Scripted device
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Describe,
    Tap(FramePoint),
    Text(String),
    Swipe(FramePoint, FramePoint),
    Key(String),
    KeySequence(usize),
    Button(String),
    Screenshot(PathBuf),
}

/// A text field whose value changes as the device receives keystrokes.
#[derive(Debug, Clone)]
pub struct Field {
    pub id: String,
    pub role: String,
    pub value: String,
    pub focused: bool,
    pub frame: (f64, f64, f64, f64),
}

impl Field {
    pub fn new(id: &str) -> Self {
        Field {
            id: id.to_string(),
            role: "TextField".to_string(),
            value: String::new(),
            focused: true,
            frame: (20.0, 200.0, 300.0, 44.0),
        }
    }

    fn to_node(&self) -> Value {
        let (x, y, w, h) = self.frame;
        json!({
            "id": self.id,
            "type": self.role,
            "value": self.value,
            "focused": self.focused,
            "x": x,
            "y": y,
            "width": w,
            "height": h,
        })
    }
}

/// A simulator stand-in. Snapshots are built from `nodes` plus the
/// simulated `field`, unless `snapshots` holds scripted output.
#[derive(Default)]
pub struct FakeDevice {
    pub nodes: RefCell<Vec<Value>>,
    pub field: RefCell<Option<Field>>,
    /// Scripted `describe_ui` results, consumed front to back.
    pub snapshots: RefCell<VecDeque<Result<String>>>,
    /// What each `type_text` call actually lands in the field, consumed
    /// front to back; when empty the text lands unchanged.
    pub landed: RefCell<VecDeque<String>>,
    pub tap_error: RefCell<Option<SimError>>,
    pub key_sequence_error: RefCell<Option<SimError>>,
    pub calls: RefCell<Vec<Call>>,
}

impl FakeDevice {
    pub fn new(nodes: Vec<Value>) -> Self {
        FakeDevice {
            nodes: RefCell::new(nodes),
            ..Default::default()
        }
    }

    pub fn with_field(self, field: Field) -> Self {
        *self.field.borrow_mut() = Some(field);
        self
    }

    pub fn script_snapshot(&self, body: Result<String>) {
        self.snapshots.borrow_mut().push_back(body);
    }

    pub fn script_landed(&self, text: &str) {
        self.landed.borrow_mut().push_back(text.to_string());
    }

    pub fn fail_taps(&self, err: SimError) {
        *self.tap_error.borrow_mut() = Some(err);
    }

    pub fn field_value(&self) -> String {
        self.field
            .borrow()
            .as_ref()
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn taps(&self) -> Vec<FramePoint> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Tap(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn current_tree(&self) -> String {
        let mut nodes = self.nodes.borrow().clone();
        if let Some(field) = self.field.borrow().as_ref() {
            nodes.push(field.to_node());
        }
        Value::Array(nodes).to_string()
    }
}

impl SnapshotProvider for FakeDevice {
    fn describe_ui(&self) -> Result<String> {
        self.calls.borrow_mut().push(Call::Describe);
        if let Some(scripted) = self.snapshots.borrow_mut().pop_front() {
            return scripted;
        }
        Ok(self.current_tree())
    }
}

impl Injector for FakeDevice {
    fn tap(&self, point: FramePoint) -> Result<()> {
        self.calls.borrow_mut().push(Call::Tap(point));
        match self.tap_error.borrow().as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Text(text.to_string()));
        let landed = self
            .landed
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| text.to_string());
        if let Some(field) = self.field.borrow_mut().as_mut() {
            field.value.push_str(&landed);
        }
        Ok(())
    }

    fn swipe(&self, from: FramePoint, to: FramePoint) -> Result<()> {
        self.calls.borrow_mut().push(Call::Swipe(from, to));
        Ok(())
    }

    fn key(&self, code: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Key(code.to_string()));
        if let Some(field) = self.field.borrow_mut().as_mut() {
            field.value.pop();
        }
        Ok(())
    }

    fn key_sequence(&self, codes: &[&str]) -> Result<()> {
        self.calls.borrow_mut().push(Call::KeySequence(codes.len()));
        if let Some(err) = self.key_sequence_error.borrow().as_ref() {
            return Err(err.clone());
        }
        if let Some(field) = self.field.borrow_mut().as_mut() {
            let keep = field.value.chars().count().saturating_sub(codes.len());
            field.value = field.value.chars().take(keep).collect();
        }
        Ok(())
    }

    fn button(&self, name: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Button(name.to_string()));
        Ok(())
    }
}

impl ScreenCapturer for FakeDevice {
    fn screenshot(&self, path: &Path) -> Result<()> {
        self.calls.borrow_mut().push(Call::Screenshot(path.to_path_buf()));
        std::fs::write(path, b"not a real png").map_err(|e| SimError::io("screenshot", e))
    }
}

/// Transport failure as the command runner would report it.
pub fn transport_failure() -> SimError {
    SimError::CommandFailed {
        program: "idb".to_string(),
        stdout: String::new(),
        stderr: "connection reset".to_string(),
        exit_code: Some(1),
    }
}
