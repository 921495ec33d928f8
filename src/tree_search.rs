//! Depth-first search for review collections inside a decoded data blob.
//!
//! The blob's shape changes between page variants, so instead of following a
//! fixed path we walk the whole tree and report every value stored under the
//! collection key. Matches are produced lazily, in source order, and the walk
//! uses an explicit stack so arbitrarily deep input cannot overflow.

use serde_json::Value;

pub const REVIEWS_KEY: &str = "reviews";

/// A search for `key` over an immutable tree. Cheap to copy; every call to
/// [`TreeSearch::matches`] starts a fresh walk.
#[derive(Debug, Clone, Copy)]
pub struct TreeSearch<'a> {
    root: &'a Value,
    key: &'a str,
}

impl<'a> TreeSearch<'a> {
    pub fn new(root: &'a Value, key: &'a str) -> Self {
        Self { root, key }
    }

    pub fn reviews(root: &'a Value) -> Self {
        Self::new(root, REVIEWS_KEY)
    }

    pub fn matches(&self) -> Matches<'a> {
        let mut stack = Vec::new();
        push_children(&mut stack, self.root);
        Matches {
            key: self.key,
            stack,
        }
    }
}

impl<'a> IntoIterator for TreeSearch<'a> {
    type Item = &'a Value;
    type IntoIter = Matches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches()
    }
}

enum Frame<'a> {
    Object(serde_json::map::Iter<'a>),
    Array(std::slice::Iter<'a, Value>),
}

fn push_children<'a>(stack: &mut Vec<Frame<'a>>, value: &'a Value) {
    match value {
        Value::Object(map) => stack.push(Frame::Object(map.iter())),
        Value::Array(items) => stack.push(Frame::Array(items.iter())),
        _ => {}
    }
}

pub struct Matches<'a> {
    key: &'a str,
    stack: Vec<Frame<'a>>,
}

impl<'a> Iterator for Matches<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.last_mut() {
            match frame {
                Frame::Object(entries) => match entries.next() {
                    Some((k, v)) if k == self.key => return Some(v),
                    Some((_, v)) => push_children(&mut self.stack, v),
                    None => {
                        self.stack.pop();
                    }
                },
                Frame::Array(items) => match items.next() {
                    Some(v) => push_children(&mut self.stack, v),
                    None => {
                        self.stack.pop();
                    }
                },
            }
        }
        None
    }
}
