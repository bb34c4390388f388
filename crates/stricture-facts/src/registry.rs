//! Pluggable catalogue of fallible calls, status guards and validators.
//!
//! Patterns match the callee as written in the IR (`fetch`, `axios.get`,
//! `requests.post`, `os.ReadFile`). Later registrations win over the built-in
//! defaults so callers can reclassify a callee.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Network call with an HTTP status to check.
    Http,
    /// File or OS operation.
    Io,
    /// Anything else that may fail (database driver, parser).
    Other,
}

#[derive(Debug, Clone)]
pub struct FallibleEntry {
    pub pattern: Regex,
    pub kind: CallKind,
    /// The client throws on non-2xx statuses itself (axios, ky).
    pub raises_on_status: bool,
}

#[derive(Debug, Clone)]
pub struct FallibleRegistry {
    entries: Vec<FallibleEntry>,
    /// Calls that validate a response status (`raise_for_status`).
    status_guards: Vec<Regex>,
    /// Calls that validate a value's range or format (`validate`, `schema.parse`).
    validators: Vec<Regex>,
}

const DEFAULT_FALLIBLE: &[(&str, CallKind, bool)] = &[
    (r"^(window\.|globalThis\.)?fetch$", CallKind::Http, false),
    (r"^(axios|ky|got)(\.(get|post|put|patch|delete|head|request))?$", CallKind::Http, true),
    (r"^(requests|httpx|session|aiohttp\.ClientSession)\.(get|post|put|patch|delete|head|request)$", CallKind::Http, false),
    (r"^http\.(Get|Post|Head|PostForm|NewRequest|NewRequestWithContext)$", CallKind::Http, false),
    (r"^(\w+\.)?(client|httpClient|http_client|apiClient|api)\.(get|post|put|patch|delete|request|send|Do|Get|Post)$", CallKind::Http, false),
    (r"^(reqwest|ureq)(::\w+)*\.(get|post|put|patch|delete|send)$", CallKind::Http, false),
    (r"^fs(\.promises)?\.(readFile|writeFile|readFileSync|writeFileSync|appendFile|unlink|mkdir|readdir|stat|open)$", CallKind::Io, false),
    (r"^(os|ioutil)\.(Open|OpenFile|Create|ReadFile|WriteFile|ReadDir|Remove|MkdirAll)$", CallKind::Io, false),
    (r"^(open|Path\.read_text|Path\.write_text|shutil\.\w+)$", CallKind::Io, false),
    (r"^(std::)?fs::\w+$", CallKind::Io, false),
    (r"^(JSON\.parse|json\.loads|json\.Unmarshal|strconv\.Atoi|strconv\.Parse\w+)$", CallKind::Other, false),
];

const DEFAULT_STATUS_GUARDS: &[&str] = &[
    r"(^|\.)raise_for_status$",
    r"(^|\.)(ensureOk|ensure_ok|assertOk|checkStatus|check_status|expectStatus|error_for_status)$",
];

const DEFAULT_VALIDATORS: &[&str] = &[
    r"(^|\.)(validate|validateSync|is_valid|isValid|full_clean|model_validate|parse|safeParse|parse_obj)$",
    r"(^|\.)(validate\w+|is(Email|UUID|URL|Int|Numeric|In)|check\w*Range|assert\w*Range)$",
];

impl Default for FallibleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (pattern, kind, raises) in DEFAULT_FALLIBLE {
            registry.push(pattern, *kind, *raises);
        }
        for pattern in DEFAULT_STATUS_GUARDS {
            registry.status_guards.push(compile(pattern));
        }
        for pattern in DEFAULT_VALIDATORS {
            registry.validators.push(compile(pattern));
        }
        registry
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in callee pattern must compile")
}

impl FallibleRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            status_guards: Vec::new(),
            validators: Vec::new(),
        }
    }

    fn push(&mut self, pattern: &str, kind: CallKind, raises_on_status: bool) {
        self.entries.push(FallibleEntry {
            pattern: compile(pattern),
            kind,
            raises_on_status,
        });
    }

    /// Register a callee pattern.
    pub fn register(
        &mut self,
        pattern: &str,
        kind: CallKind,
        raises_on_status: bool,
    ) -> Result<&mut Self, regex::Error> {
        self.entries.push(FallibleEntry {
            pattern: Regex::new(pattern)?,
            kind,
            raises_on_status,
        });
        Ok(self)
    }

    pub fn register_status_guard(&mut self, pattern: &str) -> Result<&mut Self, regex::Error> {
        self.status_guards.push(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn register_validator(&mut self, pattern: &str) -> Result<&mut Self, regex::Error> {
        self.validators.push(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn classify(&self, callee: &str) -> Option<&FallibleEntry> {
        let callee = callee.trim();
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.pattern.is_match(callee))
    }

    pub fn is_status_guard(&self, callee: &str) -> bool {
        self.status_guards.iter().any(|re| re.is_match(callee.trim()))
    }

    pub fn is_validator(&self, callee: &str) -> bool {
        self.validators.iter().any(|re| re.is_match(callee.trim()))
    }
}
