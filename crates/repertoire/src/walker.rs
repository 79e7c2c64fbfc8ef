//! Game-vs-book walk.
//!
//! Replays a game ply by ply against one book and stops at the first
//! divergence. Written as an explicit state machine: each step either
//! descends one node or settles on a terminal result.

use tracing::debug;

use crate::book::{Book, NodeId};
use crate::game::PlayedGame;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Continue from a node reaching the same position by another move order.
    pub follow_transpositions: bool,
}

/// Where a walk ended. `node` is the last book node the game reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    /// The game ran out of moves, or the book ran out of moves, first.
    NoDeviation { plies_matched: u32, node: NodeId },
    /// The user played a move the book does not have at `ply`.
    UserDeviation { ply: u32, node: NodeId },
    /// The opponent played a move the book does not have at `ply`.
    OpponentLeftBook { ply: u32, node: NodeId },
}

impl WalkResult {
    pub fn node(&self) -> NodeId {
        match *self {
            WalkResult::NoDeviation { node, .. }
            | WalkResult::UserDeviation { node, .. }
            | WalkResult::OpponentLeftBook { node, .. } => node,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walk {
    pub result: WalkResult,
    /// Some ply was matched through a transposition.
    pub transposed: bool,
}

enum State {
    /// At `node` after `ply` plies of the game.
    Walking { node: NodeId, ply: u32 },
    Done(WalkResult),
}

/// Walk `game` against `book` from the root.
pub fn walk(book: &Book, game: &PlayedGame, options: WalkOptions) -> Walk {
    let mut transposed = false;
    let mut state = State::Walking {
        node: book.root(),
        ply: 0,
    };

    let result = loop {
        state = match state {
            State::Done(result) => break result,
            State::Walking { node, ply } => match game.moves.get(ply as usize) {
                None => State::Done(WalkResult::NoDeviation { plies_matched: ply, node }),
                // The book ends here: a finished line, not a divergence.
                Some(_) if book.node(node).is_leaf() => {
                    State::Done(WalkResult::NoDeviation { plies_matched: ply, node })
                }
                Some(played) => {
                    if let Some(child) = book.child(node, &played.key) {
                        State::Walking { node: child, ply: ply + 1 }
                    } else if let Some(target) = transposition(book, options, &played.position_after) {
                        transposed = true;
                        State::Walking { node: target, ply: ply + 1 }
                    } else if game.is_user_move(played.ply) {
                        State::Done(WalkResult::UserDeviation { ply: played.ply, node })
                    } else {
                        State::Done(WalkResult::OpponentLeftBook { ply: played.ply, node })
                    }
                }
            },
        };
    };

    debug!(game_id = %game.id, opening = book.opening_name(), result = ?result, transposed, "Walked game");
    Walk { result, transposed }
}

fn transposition(book: &Book, options: WalkOptions, position: &str) -> Option<NodeId> {
    if !options.follow_transpositions {
        return None;
    }
    book.transposition(position)
}
