use once_cell::sync::Lazy;
use regex::Regex;

static PAREN_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").unwrap());

/// Carried-forward placement state for one extraction pass.
///
/// Rows rarely repeat where they live: a grey location row or an `Asset:` banner
/// applies to every row below it until the next one. Each pass owns its own
/// instance; spare-part tables may precede the tasks they reference, so the
/// passes never share one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub location1: String,
    pub location2: String,
    pub set_type_code: String,
    pub component_path: String,
    pub current_task_code: String,
    pub asset_code: String,
    pub asset_type: String,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// `1 Pre-Maintenance \ Checks (9000171371)` sets location1 to the text
    /// before the first backslash, location2 to the text after it, and the
    /// set-type code to the last parenthesized digit run.
    pub fn update_from_context_row(&mut self, line: &str) {
        let (loc1, loc2) = match line.split_once('\\') {
            Some((a, b)) => (a, b),
            None => (line, ""),
        };
        self.location1 = loc1.trim().to_string();
        self.location2 = loc2.trim().to_string();
        self.set_type_code = last_paren_digits(line).unwrap_or_default().to_string();
        self.component_path = line.trim().to_string();
    }

    /// `Asset: 9000171371 TP A3/F-040V` gives asset code `9000171371` and asset
    /// type `TP A3/F-040V`.
    pub fn update_from_asset_row(&mut self, line: &str) {
        let payload = line.split_once(':').map(|(_, p)| p).unwrap_or("");
        let mut tokens = payload.split_whitespace();
        self.asset_code = tokens.next().unwrap_or_default().to_string();
        self.asset_type = tokens.collect::<Vec<_>>().join(" ");
    }

    pub fn set_current_task(&mut self, code: &str) {
        self.current_task_code = code.to_string();
    }

    /// Forget placement and task linkage, keeping the asset banner.
    pub fn reset_placement(&mut self) {
        self.location1.clear();
        self.location2.clear();
        self.set_type_code.clear();
        self.component_path.clear();
        self.current_task_code.clear();
    }
}

/// Last `(digits)` group found anywhere in `text`.
pub fn last_paren_digits(text: &str) -> Option<&str> {
    PAREN_DIGITS
        .captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}
