//! Declarative parameter schema for formulas.
//!
//! A formula declares its parameters as a list of [`ParamSpec`]s. Any UI
//! layer (the CLI `info` command included) renders a form from the schema and
//! turns user input into [`ParamValue`]s with [`ParamSpec::parse`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::nicify::nicify;
use crate::registry::error::{RegistryError, Result};

/// The kind of value a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Int,
    Float,
    String,
    Bool,
    /// `x, y, width, height`
    Rect,
    /// `left, right, top, bottom`
    RectOffset,
    Vector2,
    Vector3,
    Vector4,
    Color,
    /// Reference to an object by path or identifier.
    Object,
    /// One of the parameter's `options`.
    Enum,
    /// Set of layer indices (0..32).
    LayerMask,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Rect => "rect",
            Self::RectOffset => "rect_offset",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Color => "color",
            Self::Object => "object",
            Self::Enum => "enum",
            Self::LayerMask => "layer_mask",
        };
        write!(f, "{s}")
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Vector(Vec<f64>),
    Object(Option<String>),
    LayerMask(u32),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Vector(v) => {
                let parts: Vec<String> = v.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
            Self::Object(Some(v)) => write!(f, "{v}"),
            Self::Object(None) => write!(f, "none"),
            Self::LayerMask(mask) => {
                let layers: Vec<String> = (0..32)
                    .filter(|bit| mask & (1 << bit) != 0)
                    .map(|bit: u32| bit.to_string())
                    .collect();
                if layers.is_empty() {
                    write!(f, "nothing")
                } else {
                    write!(f, "layers {}", layers.join(","))
                }
            }
        }
    }
}

/// One declared parameter of a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    /// Allowed values for `enum` parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Default value in the same text form accepted by [`ParamSpec::parse`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParamSpec {
    /// Create a parameter with no options or explicit default.
    #[must_use]
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            options: Vec::new(),
            default: None,
        }
    }

    /// Label to show next to the field.
    #[must_use]
    pub fn label(&self) -> String {
        nicify(&self.name)
    }

    /// Initial value of the field.
    ///
    /// Uses the declared default when it parses, otherwise the kind's zero value.
    #[must_use]
    pub fn default_value(&self) -> ParamValue {
        self.default
            .as_deref()
            .and_then(|d| self.parse(d).ok())
            .unwrap_or_else(|| self.zero_value())
    }

    fn zero_value(&self) -> ParamValue {
        match self.kind {
            ParamKind::Int => ParamValue::Int(0),
            ParamKind::Float => ParamValue::Float(0.0),
            ParamKind::String => ParamValue::String(String::new()),
            ParamKind::Bool => ParamValue::Bool(false),
            ParamKind::Vector2 => ParamValue::Vector(vec![0.0; 2]),
            ParamKind::Vector3 => ParamValue::Vector(vec![0.0; 3]),
            ParamKind::Rect | ParamKind::RectOffset | ParamKind::Vector4 => {
                ParamValue::Vector(vec![0.0; 4])
            }
            ParamKind::Color => ParamValue::Vector(vec![1.0; 4]),
            ParamKind::Object => ParamValue::Object(None),
            ParamKind::Enum => ParamValue::String(self.options.first().cloned().unwrap_or_default()),
            ParamKind::LayerMask => ParamValue::LayerMask(0),
        }
    }

    /// Parse user input for this parameter.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidParam`] if the text does not fit the kind.
    pub fn parse(&self, input: &str) -> Result<ParamValue> {
        let text = input.trim();
        let value = match self.kind {
            ParamKind::Int => text.parse().ok().map(ParamValue::Int),
            ParamKind::Float => text.parse().ok().map(ParamValue::Float),
            ParamKind::String => Some(ParamValue::String(input.to_string())),
            ParamKind::Bool => parse_bool(text).map(ParamValue::Bool),
            ParamKind::Vector2 => parse_floats(text, 2).map(ParamValue::Vector),
            ParamKind::Vector3 => parse_floats(text, 3).map(ParamValue::Vector),
            ParamKind::Rect | ParamKind::RectOffset | ParamKind::Vector4 => {
                parse_floats(text, 4).map(ParamValue::Vector)
            }
            ParamKind::Color => parse_color(text).map(ParamValue::Vector),
            ParamKind::Object => Some(ParamValue::Object(
                (!text.is_empty() && !text.eq_ignore_ascii_case("none")).then(|| text.to_string()),
            )),
            ParamKind::Enum => self
                .options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(text))
                .map(|o| ParamValue::String(o.clone())),
            ParamKind::LayerMask => parse_layer_mask(text).map(ParamValue::LayerMask),
        };

        value.ok_or_else(|| RegistryError::InvalidParam {
            param: self.name.clone(),
            kind: self.kind.to_string(),
            value: input.to_string(),
        })
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_floats(text: &str, count: usize) -> Option<Vec<f64>> {
    let inner = text.trim_start_matches('(').trim_end_matches(')');
    let values: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (values.len() == count).then_some(values)
}

fn parse_color(text: &str) -> Option<Vec<f64>> {
    if let Some(hex) = text.strip_prefix('#') {
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return None;
        }
        let mut channels = Vec::with_capacity(4);
        for i in (0..hex.len()).step_by(2) {
            let byte = u8::from_str_radix(&hex[i..i + 2], 16).ok()?;
            channels.push(f64::from(byte) / 255.0);
        }
        if channels.len() == 3 {
            channels.push(1.0);
        }
        return Some(channels);
    }

    let mut channels = parse_floats(text, 4).or_else(|| {
        parse_floats(text, 3).map(|mut rgb| {
            rgb.push(1.0);
            rgb
        })
    })?;
    for c in &mut channels {
        *c = c.clamp(0.0, 1.0);
    }
    Some(channels)
}

fn parse_layer_mask(text: &str) -> Option<u32> {
    if text.is_empty() || text.eq_ignore_ascii_case("nothing") {
        return Some(0);
    }
    if text.eq_ignore_ascii_case("everything") {
        return Some(u32::MAX);
    }
    text.split(',').try_fold(0u32, |mask, part| {
        let bit: u32 = part.trim().parse().ok()?;
        (bit < 32).then(|| mask | (1 << bit))
    })
}
