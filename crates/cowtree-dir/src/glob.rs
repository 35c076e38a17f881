//! Wildcard matching over a user's tree.
//!
//! The pattern is a full path whose user segment is literal and whose other
//! elements may hold shell wildcards: `*`, `?`, classes such as `[a-z]` and
//! `[^x]`, and `\` to escape the next character. Matching is breadth first,
//! one pattern element per tree level.

use std::iter::Peekable;
use std::str::Chars;

use ::glob::Pattern;

use crate::entry;
use crate::navigator::Navigator;
use crate::path;
use crate::roots::RootTable;
use crate::types::{DirEntry, DirError};

const OP: &str = "Glob";

/// Upper bound on the preallocated candidate sets, whatever the configured hint.
const MAX_CAPACITY_HINT: usize = 1024;

/// Compile every element of `parsed` as a wildcard pattern.
fn compile(pattern: &str, parsed: &path::Parsed) -> Result<Vec<Pattern>, DirError> {
    parsed
        .elems()
        .iter()
        .map(|elem| {
            translate(elem)
                .and_then(|t| Pattern::new(&t).map_err(|e| e.msg.to_string()))
                .map_err(|reason| DirError::MalformedPattern {
                    op: OP,
                    pattern: pattern.to_string(),
                    reason: format!("element {elem:?}: {reason}"),
                })
        })
        .collect()
}

/// One member of a bracket class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Member {
    Char(char),
    Range(char, char),
}

impl Member {
    fn lo(self) -> char {
        match self {
            Member::Char(c) | Member::Range(c, _) => c,
        }
    }

    fn hi(self) -> char {
        match self {
            Member::Char(c) | Member::Range(_, c) => c,
        }
    }
}

/// Rewrites one element into `glob::Pattern` syntax.
///
/// Input classes negate with `^` and members may be escaped with `\`; `!` has
/// no special meaning. Runs of `*` are one wildcard.
fn translate(elem: &str) -> Result<String, String> {
    let mut out = String::with_capacity(elem.len() + 2);
    let mut chars = elem.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.next_if_eq(&'*').is_some() {}
                out.push('*');
            }
            '\\' => {
                let lit = chars.next().ok_or("trailing backslash")?;
                push_literal(&mut out, lit);
            }
            '[' => translate_class(&mut chars, &mut out)?,
            c => out.push(c),
        }
    }
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if matches!(c, '*' | '?' | '[' | ']') {
        out.push('[');
        out.push(c);
        out.push(']');
    } else {
        out.push(c);
    }
}

fn class_char(chars: &mut Peekable<Chars<'_>>) -> Result<char, String> {
    match chars.next() {
        Some('\\') => chars.next().ok_or_else(|| "trailing backslash".to_string()),
        Some(c @ ('-' | ']')) => Err(format!("unescaped {c:?} in class")),
        Some(c) => Ok(c),
        None => Err("unterminated class".to_string()),
    }
}

/// Translates a class whose opening `[` was already consumed.
fn translate_class(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), String> {
    let negated = chars.next_if_eq(&'^').is_some();
    let mut members: Vec<Member> = Vec::new();
    loop {
        if !members.is_empty() && chars.next_if_eq(&']').is_some() {
            break;
        }
        let lo = class_char(chars)?;
        let member = if chars.next_if_eq(&'-').is_some() {
            let hi = class_char(chars)?;
            Member::Range(lo, hi)
        } else {
            Member::Char(lo)
        };
        if let Member::Range(lo, hi) = member {
            if [lo, hi].iter().any(|c| matches!(c, ']' | '-')) {
                return Err(format!("unsupported range bound in {lo}-{hi}"));
            }
        }
        if !members.contains(&member) {
            members.push(member);
        }
    }

    if !negated {
        if let [Member::Char(c)] = members[..] {
            push_literal(out, c);
            return Ok(());
        }
    }

    // `glob` reads `]` as a member only in first place, `-` only at either end,
    // and `!` in first place as negation.
    members.sort_by_key(|m| match m.lo() {
        ']' => 0,
        '!' => 2,
        '-' => 3,
        _ => 1,
    });
    if !negated && members[0].lo() == '!' {
        if members.last() == Some(&Member::Char('-')) {
            members.rotate_right(1);
        } else {
            // Every member starts at `!`: the class is `!` through the highest bound.
            let hi = members.iter().map(|m| m.hi()).max().unwrap_or('!');
            match hi {
                '!' => {
                    out.push('!');
                    return Ok(());
                }
                hi if hi < '!' => return Err("class matches nothing".to_string()),
                hi => members = vec![Member::Range('"', hi), Member::Char('!')],
            }
        }
    }

    out.push('[');
    if negated {
        out.push('!');
    }
    for m in members {
        match m {
            Member::Char(c) => out.push(c),
            Member::Range(lo, hi) => {
                out.push(lo);
                out.push('-');
                out.push(hi);
            }
        }
    }
    out.push(']');
    Ok(())
}

/// Returns every entry of the tree matching `pattern`, sorted by name.
///
/// Directory entries in the result, the root included, carry a trailing `/`.
pub fn glob(
    nav: &Navigator<'_>,
    roots: &RootTable,
    pattern: &str,
    capacity: usize,
) -> Result<Vec<DirEntry>, DirError> {
    let parsed = path::parse(pattern).map_err(|source| DirError::MalformedPath {
        op: OP,
        path: pattern.to_string(),
        source,
    })?;
    let matchers = compile(pattern, &parsed)?;
    let root_key = roots
        .get(parsed.user())
        .cloned()
        .ok_or_else(|| DirError::NoSuchUser {
            op: OP,
            user: parsed.user().clone(),
        })?;

    let capacity = capacity.min(MAX_CAPACITY_HINT);
    let mut this: Vec<DirEntry> = Vec::with_capacity(capacity);
    let mut next: Vec<DirEntry> = Vec::with_capacity(capacity);
    next.push(nav.root_entry(&parsed, root_key));

    for matcher in &matchers {
        std::mem::swap(&mut this, &mut next);
        next.clear();
        for dir in this.iter().filter(|e| e.is_dir()) {
            let payload = nav
                .fetch_dir(OP, &dir.location.key, &dir.name)
                .map_err(|e| DirError::internal(OP, &dir.name, format!("invalid key: {e}")))?;
            for record in entry::records(&payload, &dir.name) {
                let child = record?.entry;
                let leaf = path::parse(&child.name)
                    .ok()
                    .and_then(|p| p.last_elem().map(str::to_string))
                    .ok_or_else(|| {
                        DirError::internal(OP, &dir.name, format!("bad entry name {:?}", child.name))
                    })?;
                if matcher.matches(&leaf) {
                    next.push(child);
                }
            }
        }
        tracing::debug!(pattern, element = matcher.as_str(), candidates = next.len(), "glob level");
    }

    for e in next.iter_mut() {
        if e.is_dir() && !e.name.ends_with('/') {
            e.name.push('/');
        }
    }
    next.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(next)
}
