//! Book compilation: chapters of one opening merged into a single move tree.
//!
//! The tree is an arena of [`MoveTreeNode`]s addressed by [`NodeId`]; the
//! root (id 0) is the standard starting position. Children are keyed by
//! [`CanonicalMove`], so two chapters reaching the same move share a node.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use shakmaty::{Chess, Position};
use tracing::{info, warn};

use crate::chapter::{AnnotatedLine, AnnotatedMove, ChapterRef, MoveIntent};
use crate::error::{ChapterError, ConflictingRepertoireError, MalformedMoveError};
use crate::normalize::{position_key, resolve, CanonicalMove};
use crate::side::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One position reached by a specific move from its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTreeNode {
    /// `None` only at the root.
    pub mv: Option<CanonicalMove>,
    /// SAN as first recorded.
    pub san: Option<String>,
    pub ply_index: u32,
    pub side_to_move_before: Option<Side>,
    pub children: BTreeMap<CanonicalMove, NodeId>,
    /// Indices into [`Book::chapters`] of every chapter passing through here.
    pub source_refs: BTreeSet<usize>,
    pub intent: Option<MoveIntent>,
    /// Position key after the move.
    pub position: String,
    pub parent: Option<NodeId>,
}

impl MoveTreeNode {
    fn root() -> Self {
        MoveTreeNode {
            mv: None,
            san: None,
            ply_index: 0,
            side_to_move_before: None,
            children: BTreeMap::new(),
            source_refs: BTreeSet::new(),
            intent: None,
            position: position_key(&Chess::default()),
            parent: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A compiled repertoire for one opening. Immutable once compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    opening_name: String,
    side: Option<Side>,
    chapters: Vec<ChapterRef>,
    nodes: Vec<MoveTreeNode>,
    leaf_counts: Vec<usize>,
    /// First node reaching each position key.
    positions: HashMap<String, NodeId>,
}

impl Book {
    fn new(opening_name: &str) -> Self {
        let root = MoveTreeNode::root();
        let mut positions = HashMap::new();
        positions.insert(root.position.clone(), NodeId::ROOT);
        Book {
            opening_name: opening_name.to_string(),
            side: None,
            chapters: Vec::new(),
            nodes: vec![root],
            leaf_counts: Vec::new(),
            positions,
        }
    }

    pub fn opening_name(&self) -> &str {
        &self.opening_name
    }

    /// Repertoire color, when the chapters declare one.
    pub fn side(&self) -> Option<Side> {
        self.side
    }

    /// Accepted chapters in declaration order.
    pub fn chapters(&self) -> &[ChapterRef] {
        &self.chapters
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &MoveTreeNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no chapter contributed a move.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_leaf()
    }

    pub fn child(&self, id: NodeId, mv: &CanonicalMove) -> Option<NodeId> {
        self.node(id).children.get(mv).copied()
    }

    /// Number of lines running through a node: the leaves of its subtree.
    pub fn variation_count_at(&self, id: NodeId) -> usize {
        if id == NodeId::ROOT && self.is_empty() {
            return 0;
        }
        self.leaf_counts.get(id.0).copied().unwrap_or(1)
    }

    /// The first node reaching `position` by any move order.
    pub fn transposition(&self, position: &str) -> Option<NodeId> {
        self.positions.get(position).copied()
    }

    /// Earliest-declared chapter contributing a node.
    pub fn best_chapter(&self, id: NodeId) -> Option<&ChapterRef> {
        let first = *self.node(id).source_refs.iter().next()?;
        self.chapters.get(first)
    }

    /// Follow `moves` from the root while the tree has them.
    /// Returns the deepest node reached and how many moves were matched.
    pub fn follow<'a, I>(&self, moves: I) -> (NodeId, usize)
    where
        I: IntoIterator<Item = &'a CanonicalMove>,
    {
        let mut node = NodeId::ROOT;
        let mut depth = 0;
        for mv in moves {
            match self.child(node, mv) {
                Some(next) => {
                    node = next;
                    depth += 1;
                }
                None => break,
            }
        }
        (node, depth)
    }

    /// Moves from the root to `id`.
    pub fn path_to(&self, id: NodeId) -> Vec<CanonicalMove> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.map(|c| self.node(c)) {
            if let Some(mv) = node.mv {
                path.push(mv);
            }
            current = node.parent;
        }
        path.reverse();
        path
    }
}

/// A move of a chapter, resolved but not yet merged.
#[derive(Debug, Clone)]
struct StagedMove {
    key: CanonicalMove,
    san: String,
    intent: Option<MoveIntent>,
    side: Side,
    position_before: String,
    position_after: String,
}

/// Incrementally merges chapters into one book.
pub struct BookCompiler {
    book: Book,
    /// Intent recorded for a (position, move) pair, and the chapter that set it.
    intents: HashMap<(String, CanonicalMove), (MoveIntent, usize)>,
}

impl BookCompiler {
    pub fn new(opening_name: &str) -> Self {
        BookCompiler {
            book: Book::new(opening_name),
            intents: HashMap::new(),
        }
    }

    /// Merge one chapter. A rejected chapter leaves the book untouched.
    pub fn add_chapter(&mut self, line: &AnnotatedLine) -> Result<(), ChapterError> {
        let mut paths = Vec::new();
        stage_line(&line.moves, &[], &Chess::default(), &mut paths).map_err(|source| {
            ChapterError::Malformed {
                chapter: line.chapter.clone(),
                source,
            }
        })?;

        let new_intents = self.validate(line, &paths)?;

        // Commit.
        let chapter_index = self.book.chapters.len();
        self.book.chapters.push(line.chapter.clone());
        if self.book.side.is_none() {
            self.book.side = line.side;
        } else if line.side.is_some() && line.side != self.book.side {
            warn!(
                opening = %self.book.opening_name,
                chapter = %line.chapter,
                "Chapter orientation disagrees with the book, keeping the first"
            );
        }
        for ((position, key), intent) in new_intents {
            self.intents.insert((position, key), (intent, chapter_index));
        }
        self.book.nodes[0].source_refs.insert(chapter_index);
        for path in &paths {
            self.merge_path(path, chapter_index);
        }
        Ok(())
    }

    /// Intent conflicts with the book so far, or within the chapter itself.
    fn validate(
        &self,
        line: &AnnotatedLine,
        paths: &[Vec<StagedMove>],
    ) -> Result<HashMap<(String, CanonicalMove), MoveIntent>, ChapterError> {
        let mut local: HashMap<(String, CanonicalMove), MoveIntent> = HashMap::new();

        for staged in paths.iter().flatten() {
            let Some(intent) = staged.intent else { continue };
            let pair = (staged.position_before.clone(), staged.key);

            let conflict = |conflicting_chapter: ChapterRef, conflicting_intent: MoveIntent| {
                ConflictingRepertoireError {
                    chapter: line.chapter.clone(),
                    conflicting_chapter,
                    fen: staged.position_before.clone(),
                    san: staged.san.clone(),
                    intent,
                    conflicting_intent,
                }
            };

            if let Some(&(existing, chapter_index)) = self.intents.get(&pair) {
                if existing != intent {
                    let other = self.book.chapters[chapter_index].clone();
                    return Err(conflict(other, existing).into());
                }
            }
            match local.get(&pair) {
                Some(&existing) if existing != intent => {
                    return Err(conflict(line.chapter.clone(), existing).into());
                }
                Some(_) => {}
                None => {
                    local.insert(pair, intent);
                }
            }
        }
        Ok(local)
    }

    fn merge_path(&mut self, path: &[StagedMove], chapter_index: usize) {
        let mut node = NodeId::ROOT;
        for (depth, staged) in path.iter().enumerate() {
            node = match self.book.child(node, &staged.key) {
                Some(existing) => {
                    let entry = &mut self.book.nodes[existing.0];
                    entry.source_refs.insert(chapter_index);
                    if entry.intent.is_none() {
                        entry.intent = staged.intent;
                    }
                    existing
                }
                None => {
                    let id = NodeId(self.book.nodes.len());
                    self.book.nodes.push(MoveTreeNode {
                        mv: Some(staged.key),
                        san: Some(staged.san.clone()),
                        ply_index: depth as u32 + 1,
                        side_to_move_before: Some(staged.side),
                        children: BTreeMap::new(),
                        source_refs: BTreeSet::from([chapter_index]),
                        intent: staged.intent,
                        position: staged.position_after.clone(),
                        parent: Some(node),
                    });
                    self.book.nodes[node.0].children.insert(staged.key, id);
                    self.book.positions.entry(staged.position_after.clone()).or_insert(id);
                    id
                }
            };
        }
    }

    pub fn finish(mut self) -> Book {
        // Children always come after their parent in the arena.
        let mut leaf_counts = vec![0usize; self.book.nodes.len()];
        for i in (0..self.book.nodes.len()).rev() {
            let node = &self.book.nodes[i];
            leaf_counts[i] = if node.is_leaf() {
                1
            } else {
                node.children.values().map(|c| leaf_counts[c.0]).sum()
            };
        }
        self.book.leaf_counts = leaf_counts;

        info!(
            opening = %self.book.opening_name,
            chapters = self.book.chapters.len(),
            nodes = self.book.nodes.len(),
            lines = self.book.variation_count_at(NodeId::ROOT),
            "Compiled book"
        );
        self.book
    }
}

/// Flatten a line and its RAVs into root-to-leaf paths, mainline first.
fn stage_line(
    moves: &[AnnotatedMove],
    prefix: &[StagedMove],
    start: &Chess,
    out: &mut Vec<Vec<StagedMove>>,
) -> Result<(), MalformedMoveError> {
    let mut path = prefix.to_vec();
    let mut pos = start.clone();
    let mut nested = Vec::new();

    for mv in moves {
        for variation in &mv.variations {
            stage_line(variation, &path, &pos, &mut nested)?;
        }

        let resolved = resolve(&mv.text, &pos)?;
        let position_before = position_key(&pos);
        let side = Side::from(pos.turn());
        pos.play_unchecked(resolved.mv);

        path.push(StagedMove {
            key: resolved.key,
            san: resolved.san,
            intent: mv.intent,
            side,
            position_before,
            position_after: position_key(&pos),
        });
    }

    if path.len() > prefix.len() {
        out.push(path);
    }
    out.append(&mut nested);
    Ok(())
}

/// Result of compiling one opening's chapters.
#[derive(Debug)]
pub struct Compilation {
    pub book: Book,
    pub rejected: Vec<ChapterError>,
}

/// Compile chapters into one book, skipping (and reporting) bad chapters.
pub fn compile<'a, I>(opening_name: &str, chapters: I) -> Compilation
where
    I: IntoIterator<Item = &'a AnnotatedLine>,
{
    let mut compiler = BookCompiler::new(opening_name);
    let mut rejected = Vec::new();

    for line in chapters {
        if let Err(e) = compiler.add_chapter(line) {
            warn!(opening = opening_name, chapter = %line.chapter, error = %e, "Skipping chapter");
            rejected.push(e);
        }
    }

    Compilation {
        book: compiler.finish(),
        rejected,
    }
}

/// One book per opening name.
#[derive(Debug)]
pub struct RepertoireCompilation {
    pub books: Vec<Book>,
    pub rejected: Vec<ChapterError>,
}

/// Group chapters by opening name (case-insensitive, first spelling kept,
/// first-appearance order) and compile each group.
pub fn compile_repertoire(chapters: &[AnnotatedLine]) -> RepertoireCompilation {
    let mut groups: Vec<(String, Vec<&AnnotatedLine>)> = Vec::new();
    for line in chapters {
        let key = line.opening_name.to_lowercase();
        match groups.iter_mut().find(|(name, _)| name.to_lowercase() == key) {
            Some((_, members)) => members.push(line),
            None => groups.push((line.opening_name.clone(), vec![line])),
        }
    }

    let mut books = Vec::with_capacity(groups.len());
    let mut rejected = Vec::new();
    for (name, members) in groups {
        let compilation = compile(&name, members);
        books.push(compilation.book);
        rejected.extend(compilation.rejected);
    }

    RepertoireCompilation { books, rejected }
}
