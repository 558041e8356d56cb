//! The history tree: every observed history up to the maximum length, with
//! next-symbol occurrence counts.
//!
//! Histories live in an arena addressed by [`HistoryId`]. A history of length
//! `k` is reached from the root by walking its symbols from the most recent to
//! the oldest, so the parent of a node is its proper suffix (the same history
//! with its oldest symbol dropped) and a node's children extend it one symbol
//! further into the past.
//!
//! ```text
//!            root ("")
//!           /         \
//!        "0"           "1"
//!       /   \         /   \
//!    "00"   "10"   "01"   "11"
//! ```

use crate::alphabet::Symbol;
use crate::error::{Error, Result};

/// Arena index of a history node.
pub type HistoryId = usize;

/// The empty history. Its counts are the raw symbol frequencies.
pub const ROOT: HistoryId = 0;

/// A single stored history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryNode {
    symbols: Vec<Symbol>,
    parent: Option<HistoryId>,
    children: Vec<Option<HistoryId>>,
    counts: Vec<u64>,
    total: u64,
    occurrences: u64,
}

impl HistoryNode {
    fn new(symbols: Vec<Symbol>, parent: Option<HistoryId>, alphabet_size: usize) -> Self {
        Self {
            symbols,
            parent,
            children: vec![None; alphabet_size],
            counts: vec![0; alphabet_size],
            total: 0,
            occurrences: 0,
        }
    }

    /// The history's symbols, oldest first.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// History length.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// `true` for the root.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The suffix one symbol shorter. `None` only for the root.
    pub fn parent(&self) -> Option<HistoryId> {
        self.parent
    }

    /// Number of times each symbol followed this history.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of [`counts`](Self::counts).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of windows ending in this history, including those at the very
    /// end of a sequence that have no next symbol.
    pub fn occurrences(&self) -> u64 {
        self.occurrences
    }

    fn record(&mut self, next: Option<Symbol>) {
        self.occurrences += 1;
        if let Some(symbol) = next {
            self.counts[symbol] += 1;
            self.total += 1;
        }
    }
}

/// Stores all observed histories of length `0..=max_length`.
#[derive(Debug, Clone)]
pub struct HistoryTree {
    nodes: Vec<HistoryNode>,
    levels: Vec<Vec<HistoryId>>,
    alphabet_size: usize,
    max_length: usize,
    max_histories: usize,
    sequences: usize,
}

impl HistoryTree {
    /// Creates an empty tree.
    pub fn new(alphabet_size: usize, max_length: usize, max_histories: usize) -> Self {
        let mut levels = vec![Vec::new(); max_length + 1];
        levels[0].push(ROOT);
        Self {
            nodes: vec![HistoryNode::new(Vec::new(), None, alphabet_size)],
            levels,
            alphabet_size,
            max_length,
            max_histories,
            sequences: 0,
        }
    }

    /// Counts every history in `sequence`.
    ///
    /// For each position, the histories of length `1..=max_length` ending just
    /// before it are credited with the symbol at that position. Histories ending
    /// at the last position are recorded as occurrences without a next symbol.
    /// Nothing spans into another sequence.
    pub fn insert(&mut self, sequence: &[Symbol]) -> Result<()> {
        if let Some(&bad) = sequence.iter().find(|&&s| s >= self.alphabet_size) {
            return Err(Error::Internal(format!(
                "symbol index {} outside alphabet of size {}",
                bad, self.alphabet_size
            )));
        }

        for end in 0..=sequence.len() {
            let next = sequence.get(end).copied();
            if next.is_some() {
                self.nodes[ROOT].record(next);
            }
            let mut node = ROOT;
            for k in 1..=self.max_length.min(end) {
                node = self.child_or_insert(node, sequence[end - k])?;
                self.nodes[node].record(next);
            }
        }

        self.sequences += 1;
        Ok(())
    }

    fn child_or_insert(&mut self, node: HistoryId, symbol: Symbol) -> Result<HistoryId> {
        if let Some(child) = self.nodes[node].children[symbol] {
            return Ok(child);
        }
        if self.nodes.len() >= self.max_histories {
            return Err(Error::ResourceExhausted(format!(
                "history tree reached {} distinct histories",
                self.max_histories
            )));
        }

        let mut symbols = Vec::with_capacity(self.nodes[node].len() + 1);
        symbols.push(symbol);
        symbols.extend_from_slice(self.nodes[node].symbols());

        let id = self.nodes.len();
        let length = symbols.len();
        self.nodes
            .push(HistoryNode::new(symbols, Some(node), self.alphabet_size));
        self.nodes[node].children[symbol] = Some(id);
        self.levels[length].push(id);
        Ok(id)
    }

    /// The node for `id`.
    pub fn node(&self, id: HistoryId) -> Option<&HistoryNode> {
        self.nodes.get(id)
    }

    /// The root (empty history).
    pub fn root(&self) -> &HistoryNode {
        &self.nodes[ROOT]
    }

    /// Looks up a history by content, oldest symbol first.
    pub fn find(&self, symbols: &[Symbol]) -> Option<HistoryId> {
        if symbols.len() > self.max_length {
            return None;
        }
        let mut node = ROOT;
        for &symbol in symbols.iter().rev() {
            node = (*self.nodes[node].children.get(symbol)?)?;
        }
        Some(node)
    }

    /// The history reached by appending `symbol` to `id` and dropping the
    /// oldest symbol, i.e. where `id` moves after emitting `symbol`.
    pub fn shift(&self, id: HistoryId, symbol: Symbol) -> Option<HistoryId> {
        let node = self.nodes.get(id)?;
        let mut next = Vec::with_capacity(node.len());
        next.extend_from_slice(node.symbols().get(1..).unwrap_or_default());
        next.push(symbol);
        self.find(&next)
    }

    /// All histories of length `k` in canonical (lexicographic) order.
    pub fn histories(&self, k: usize) -> Vec<HistoryId> {
        let mut ids = self.levels.get(k).cloned().unwrap_or_default();
        ids.sort_by(|a, b| self.nodes[*a].symbols.cmp(&self.nodes[*b].symbols));
        ids
    }

    /// Number of stored histories, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when nothing but the root is stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Alphabet size the tree was built for.
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// Longest stored history length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of sequences inserted so far.
    pub fn sequence_count(&self) -> usize {
        self.sequences
    }

    /// Total number of symbols inserted across all sequences.
    pub fn symbol_count(&self) -> u64 {
        self.nodes[ROOT].total
    }
}
