//! The accumulating diagnostics type every graph operation returns.
//!
//! A [`Report`] carries an ordered list of entries, each with a stable short
//! code, a human overview, and a structured JSON data map. A report is
//! *successful* iff no entry's code starts with `'E'`; codes starting with
//! `'W'` are warnings and `'I'` informational. `EUKN` is reserved for
//! invariant violations that have no dedicated code.
//!
//! Context maps pushed onto the report decorate every entry added while they
//! are active, on either side of a merge; entries keep their own keys when
//! the context would collide.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One diagnostic entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Stable short code: `E22`, `W…`, `I…`, `EUKN`.
    pub errorcode: String,
    /// Generic description of the problem; instance specifics go in `data`.
    pub overview: String,
    /// Structured context for this instance.
    pub data: Value,
}

/// Identifier for a pushed context map, used to pop it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextId(u64);

/// Ordered diagnostics plus a success flag.
#[derive(Debug, Clone, Default)]
pub struct Report {
    entries: Vec<Entry>,
    success_lost: bool,
    contexts: BTreeMap<u64, Value>,
    next_context_id: u64,
}

impl Report {
    /// A fresh, successful report.
    pub fn new() -> Self {
        Report::default()
    }

    /// `true` iff no `E*` entry has been added.
    pub fn success(&self) -> bool {
        !self.success_lost
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Adds an entry. The code must start with `E`, `W`, or `I`; `data` must
    /// be a JSON object (or null, normalized to `{}`).
    pub fn add_entry(&mut self, code: &str, overview: &str, data: Value) {
        debug_assert!(
            matches!(code.as_bytes().first(), Some(b'E') | Some(b'W') | Some(b'I')),
            "error code must start with E, W, or I"
        );
        let mut data = if data.is_null() { json!({}) } else { data };
        debug_assert!(data.is_object(), "entry data must be a JSON object");

        merge_json_conservative(&mut data, &self.context_json());
        if code.starts_with('E') {
            self.success_lost = true;
        }
        self.entries.push(Entry {
            errorcode: code.to_string(),
            overview: overview.to_string(),
            data,
        });
    }

    /// Pushes a context map applied to every subsequent entry until popped.
    pub fn push_context(&mut self, data: Value) -> ContextId {
        debug_assert!(data.is_object(), "context must be a JSON object");
        let id = self.next_context_id;
        self.next_context_id += 1;
        self.contexts.insert(id, data);
        ContextId(id)
    }

    /// Pops a previously pushed context map.
    pub fn pop_context(&mut self, id: ContextId) {
        self.contexts.remove(&id.0);
    }

    /// Runs `f` with a context map pushed, popping it afterwards.
    pub fn scoped<T>(&mut self, data: Value, f: impl FnOnce(&mut Report) -> T) -> T {
        let id = self.push_context(data);
        let out = f(self);
        self.pop_context(id);
        out
    }

    /// The merged active context. Later-pushed contexts win on key collision.
    pub fn context_json(&self) -> Value {
        let mut merged = json!({});
        for ctx in self.contexts.values().rev() {
            merge_json_conservative(&mut merged, ctx);
        }
        merged
    }

    /// Lossless JSON form: an array of entries.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.entries).unwrap_or_else(|_| json!([]))
    }

    /// Pretty human-readable form.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.errorcode);
            out.push_str(": ");
            out.push_str(&entry.overview);
            out.push('\n');
            pretty_print_json(&entry.data, 1, &mut out);
        }
        out
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

impl AddAssign<Report> for Report {
    /// Appends `rhs`. Existing entries gain `rhs`'s context, incoming entries
    /// gain this report's context, and success is the conjunction.
    fn add_assign(&mut self, rhs: Report) {
        self.success_lost |= rhs.success_lost;

        let rhs_context = rhs.context_json();
        for entry in &mut self.entries {
            merge_json_conservative(&mut entry.data, &rhs_context);
        }

        let lhs_context = self.context_json();
        for mut entry in rhs.entries {
            merge_json_conservative(&mut entry.data, &lhs_context);
            self.entries.push(entry);
        }
    }
}

impl Add for Report {
    type Output = Report;

    fn add(mut self, rhs: Report) -> Report {
        self += rhs;
        self
    }
}

/// Merges `from` into `into`, keeping `into`'s value on key collision.
fn merge_json_conservative(into: &mut Value, from: &Value) {
    if let (Value::Object(into_map), Value::Object(from_map)) = (into, from) {
        for (key, value) in from_map {
            if !into_map.contains_key(key) {
                into_map.insert(key.clone(), value.clone());
            }
        }
    }
}

fn pretty_print_json(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Array(items) => {
            out.push_str(&pad);
            out.push_str("[\n");
            for item in items {
                pretty_print_json(item, indent + 1, out);
                out.push_str(",\n");
            }
            out.push_str(&pad);
            out.push(']');
        }
        Value::Object(map) => {
            for (key, val) in map {
                out.push_str(&pad);
                out.push_str(key);
                out.push('\n');
                pretty_print_json(val, indent + 1, out);
                out.push('\n');
            }
        }
        Value::String(s) => {
            out.push_str(&pad);
            out.push_str(s);
        }
        other => {
            out.push_str(&pad);
            out.push_str(&other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_report_is_successful() {
        let res = Report::new();
        assert!(res.success());
        assert!(res.entries().is_empty());
    }

    #[test]
    fn warning_keeps_success_error_loses_it() {
        let mut res = Report::new();
        res.add_entry("W33", "just a warning", json!({}));
        assert!(res.success());

        res.add_entry("E22", "an error", json!({}));
        assert!(!res.success());
        assert_eq!(res.entries().len(), 2);
    }

    #[test]
    fn context_decorates_entries_while_active() {
        let mut res = Report::new();
        assert_eq!(res.context_json(), json!({}));

        let id = res.push_context(json!({"Module": "lang"}));
        assert_eq!(res.context_json(), json!({"Module": "lang"}));
        res.add_entry("E22", "oops", json!({"Requested ID": 3}));
        res.pop_context(id);

        assert_eq!(res.context_json(), json!({}));
        assert_eq!(res.entries()[0].data["Module"], "lang");
        assert_eq!(res.entries()[0].data["Requested ID"], 3);

        // entries added after the pop are undecorated
        res.add_entry("E23", "again", json!({}));
        assert!(res.entries()[1].data.get("Module").is_none());
    }

    #[test]
    fn entry_keys_win_over_context_keys() {
        let mut res = Report::new();
        res.scoped(json!({"Module": "outer"}), |res| {
            res.add_entry("E22", "oops", json!({"Module": "mine"}));
        });
        assert_eq!(res.entries()[0].data["Module"], "mine");
    }

    #[test]
    fn merge_combines_success_and_contexts() {
        let mut lhs = Report::new();
        lhs.add_entry("W1", "left warning", json!({}));
        let lhs_ctx = lhs.push_context(json!({"side": "left"}));

        let mut rhs = Report::new();
        let rhs_ctx = rhs.push_context(json!({"other": "right"}));
        rhs.add_entry("E2", "right error", json!({}));
        rhs.pop_context(rhs_ctx);

        // rhs context is gone by merge time, but its entry already carries it
        lhs += rhs;
        lhs.pop_context(lhs_ctx);

        assert!(!lhs.success());
        assert_eq!(lhs.entries().len(), 2);
        // incoming entry was decorated with lhs's active context
        assert_eq!(lhs.entries()[1].data["side"], "left");
        assert_eq!(lhs.entries()[1].data["other"], "right");
    }

    #[test]
    fn scoped_contexts_nest() {
        let mut res = Report::new();
        res.scoped(json!({"a": 1}), |res| {
            res.scoped(json!({"b": 2}), |res| {
                res.add_entry("I1", "note", json!({}));
            });
        });
        assert_eq!(res.entries()[0].data["a"], 1);
        assert_eq!(res.entries()[0].data["b"], 2);
        assert!(res.success());
    }

    #[test]
    fn json_form_is_lossless() {
        let mut res = Report::new();
        res.add_entry("E24", "type mismatch", json!({"Left Hand Type": "lang:i32"}));
        let j = res.to_json();
        assert_eq!(j[0]["errorcode"], "E24");
        assert_eq!(j[0]["overview"], "type mismatch");
        assert_eq!(j[0]["data"]["Left Hand Type"], "lang:i32");
    }

    #[test]
    fn dump_mentions_code_and_overview() {
        let mut res = Report::new();
        res.add_entry("E22", "slot out of range", json!({"Requested ID": 4}));
        let text = res.dump();
        assert!(text.contains("E22: slot out of range"));
        assert!(text.contains("Requested ID"));
    }
}
