//! Prometheus text exposition format (0.0.4).

use std::fmt::Write as _;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    /// Constant-value metric whose payload lives in its labels. Rendered as a
    /// `<name>_info` gauge with value 1.
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn unlabeled(value: f64) -> Self {
        Self {
            labels: Vec::new(),
            value,
        }
    }

    pub fn labeled<const N: usize>(labels: [(&str, &str); N], value: f64) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            value,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn gauge(name: impl AsRef<str>, help: impl Into<String>) -> Self {
        Self {
            name: sanitize_metric_name(name.as_ref()),
            help: help.into(),
            kind: MetricKind::Gauge,
            samples: Vec::new(),
        }
    }

    pub fn info(name: impl AsRef<str>, help: impl Into<String>, labels: [(&str, &str); 1]) -> Self {
        Self {
            name: sanitize_metric_name(name.as_ref()),
            help: help.into(),
            kind: MetricKind::Info,
            samples: vec![Sample::labeled(labels, 1.0)],
        }
    }

    pub fn with_sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Name of the series lines as they appear on the wire.
    pub fn series_name(&self) -> String {
        match self.kind {
            MetricKind::Gauge => self.name.clone(),
            MetricKind::Info => format!("{}_info", self.name),
        }
    }
}

pub fn render(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for family in families {
        let series = family.series_name();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "# HELP {series} {}", escape_help(&family.help));
        let _ = writeln!(out, "# TYPE {series} gauge");
        for sample in &family.samples {
            out.push_str(&series);
            if !sample.labels.is_empty() {
                out.push('{');
                for (idx, (name, value)) in sample.labels.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{name}=\"{}\"", escape_label_value(value));
                }
                out.push('}');
            }
            out.push(' ');
            out.push_str(&format_value(sample.value));
            out.push('\n');
        }
    }
    out
}

/// Maps arbitrary text onto `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, ch) in name.chars().enumerate() {
        let valid = ch.is_ascii_alphabetic()
            || ch == '_'
            || ch == ':'
            || (idx > 0 && ch.is_ascii_digit());
        out.push(if valid { ch } else { '_' });
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
