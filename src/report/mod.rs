//! Report construction for tool output.
//!
//! Every tool returns a plain-text report assembled from labelled segments.
//! The label vocabulary is closed: downstream consumers (model prompts, log
//! parsers) pattern-match the bracketed tokens, so adding one is a deliberate
//! API change, not a formatting tweak.
//!
//! Reports that state numeric facts end with a verification checkpoint: a
//! rigid `label: value` footer restating the numbers, so a reader can audit
//! a paraphrased summary against the source values. The builder validates
//! that any claimed total equals the sum of its components before the text
//! is ever produced.
//!
//! A single report never exceeds 8 KiB. Oversized reports are cut by
//! truncating the longest list section and flagging the cut with
//! `[INFO] Truncated`.

pub mod format;

use crate::error::{GatewayError, GatewayResult};

/// Hard upper bound on a rendered report, in bytes.
pub const MAX_REPORT_BYTES: usize = 8 * 1024;

/// Marker line that opens the verification checkpoint block.
const CHECKPOINT_MARKER: &str = "── Verification ──";

/// Closed status-label vocabulary. The `as_str` strings are exact and are
/// the only bracketed tokens reports may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Ok,
    Warn,
    Crit,
    Err,
    Info,
    Up,
    Dn,
    Ap,
    Sw,
    Gw,
    Dev,
    Stats,
    Trend,
    Data,
    Net,
    Vpn,
    Sec,
    Health,
    Async,
}

impl Label {
    /// The exact bracketed token for this label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Crit => "[CRIT]",
            Self::Err => "[ERR]",
            Self::Info => "[INFO]",
            Self::Up => "[UP]",
            Self::Dn => "[DN]",
            Self::Ap => "[AP]",
            Self::Sw => "[SW]",
            Self::Gw => "[GW]",
            Self::Dev => "[DEV]",
            Self::Stats => "[STATS]",
            Self::Trend => "[TREND]",
            Self::Data => "[DATA]",
            Self::Net => "[NET]",
            Self::Vpn => "[VPN]",
            Self::Sec => "[SEC]",
            Self::Health => "[HEALTH]",
            Self::Async => "[ASYNC]",
        }
    }

    /// Every label in the vocabulary, for vocabulary tests.
    #[must_use]
    pub fn all() -> &'static [Label] {
        &[
            Self::Ok,
            Self::Warn,
            Self::Crit,
            Self::Err,
            Self::Info,
            Self::Up,
            Self::Dn,
            Self::Ap,
            Self::Sw,
            Self::Gw,
            Self::Dev,
            Self::Stats,
            Self::Trend,
            Self::Data,
            Self::Net,
            Self::Vpn,
            Self::Sec,
            Self::Health,
            Self::Async,
        ]
    }
}

/// A finished, size-bounded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    text: String,
}

impl Report {
    /// Builds a one-segment report, the shape every dispatcher error takes.
    #[must_use]
    pub fn single(text: impl Into<String>) -> Self {
        let mut text: String = text.into();
        if text.len() > MAX_REPORT_BYTES {
            let mut cut = MAX_REPORT_BYTES;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Self { text }
    }

    /// The rendered report text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the report, returning the rendered text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug)]
enum Block {
    Line {
        label: Label,
        text: String,
    },
    List {
        label: Label,
        title: String,
        items: Vec<String>,
        hidden: usize,
    },
}

/// Assembles a report from labelled segments and checkpoint facts.
///
/// # Example
///
/// ```
/// use centra::report::{Label, ReportBuilder};
///
/// let mut builder = ReportBuilder::new();
/// builder.line(Label::Stats, "Devices: 3 total");
/// builder.list(Label::Dev, "Inventory", vec!["AP-501".into(), "SW-218".into(), "GW-4".into()]);
/// builder.fact("Total devices", "3");
/// let report = builder.finish().unwrap();
/// assert!(report.as_str().contains("── Verification ──"));
/// assert!(report.as_str().contains("Total devices: 3"));
/// ```
#[derive(Debug, Default)]
pub struct ReportBuilder {
    blocks: Vec<Block>,
    facts: Vec<(String, String)>,
}

impl ReportBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            facts: Vec::new(),
        }
    }

    /// Appends one labelled line.
    pub fn line(&mut self, label: Label, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Line {
            label,
            text: text.into(),
        });
        self
    }

    /// Appends a labelled list section: a title line followed by one
    /// indented line per item. List sections are what the size bound
    /// truncates when a report grows past 8 KiB.
    pub fn list(
        &mut self,
        label: Label,
        title: impl Into<String>,
        items: Vec<String>,
    ) -> &mut Self {
        self.blocks.push(Block::List {
            label,
            title: title.into(),
            items,
            hidden: 0,
        });
        self
    }

    /// Records a verification-checkpoint fact. Values are emitted verbatim,
    /// in insertion order.
    pub fn fact(&mut self, label: impl Into<String>, value: impl ToString) -> &mut Self {
        self.facts.push((label.into(), value.to_string()));
        self
    }

    /// Records a total fact after validating it against its components.
    ///
    /// The builder never computes totals on the handler's behalf; it only
    /// refuses to emit a report whose stated total and components disagree.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Report`] when `total != sum(components)`.
    pub fn fact_sum(
        &mut self,
        label: impl Into<String>,
        total: u64,
        components: &[u64],
    ) -> GatewayResult<&mut Self> {
        let label = label.into();
        let sum: u64 = components.iter().sum();
        if total != sum {
            return Err(GatewayError::report(format!(
                "checkpoint '{label}': total {total} != component sum {sum}"
            )));
        }
        self.facts.push((label, total.to_string()));
        Ok(self)
    }

    /// Renders the report, enforcing the size bound and appending the
    /// verification checkpoint when facts were recorded.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Report`] when the report cannot be brought
    /// under the size bound (checkpoint alone too large).
    pub fn finish(mut self) -> GatewayResult<Report> {
        let mut truncated = false;
        loop {
            let text = self.render(truncated);
            if text.len() <= MAX_REPORT_BYTES {
                return Ok(Report { text });
            }
            if !self.shrink_longest_list() {
                return Err(GatewayError::report(
                    "report exceeds size bound and has no list section left to truncate",
                ));
            }
            truncated = true;
        }
    }

    /// Renders all blocks plus the optional truncation flag and checkpoint.
    fn render(&self, truncated: bool) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::Line { label, text } => {
                    out.push_str(label.as_str());
                    out.push(' ');
                    out.push_str(text);
                    out.push('\n');
                }
                Block::List {
                    label,
                    title,
                    items,
                    hidden,
                } => {
                    out.push_str(label.as_str());
                    out.push(' ');
                    out.push_str(title);
                    out.push('\n');
                    for item in items {
                        out.push_str("  - ");
                        out.push_str(item);
                        out.push('\n');
                    }
                    if *hidden > 0 {
                        out.push_str(&format!("  … +{hidden} more\n"));
                    }
                }
            }
        }

        if truncated {
            out.push_str("[INFO] Truncated\n");
        }

        if !self.facts.is_empty() {
            out.push('\n');
            out.push_str(CHECKPOINT_MARKER);
            out.push('\n');
            for (label, value) in &self.facts {
                out.push_str(label);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
        }

        out
    }

    /// Drops the tail item of the list section with the most rendered
    /// content. Returns false when no list has items left to drop.
    fn shrink_longest_list(&mut self) -> bool {
        let longest = self
            .blocks
            .iter_mut()
            .filter_map(|block| match block {
                Block::List { items, hidden, .. } if !items.is_empty() => {
                    let rendered: usize = items.iter().map(|i| i.len() + 5).sum();
                    Some((rendered, items, hidden))
                }
                _ => None,
            })
            .max_by_key(|(rendered, _, _)| *rendered);

        match longest {
            Some((_, items, hidden)) => {
                items.pop();
                *hidden += 1;
                true
            }
            None => false,
        }
    }
}
